//! @acp:module "Set Command"
//! @acp:summary "Change one configuration parameter"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::{bail, Result};
use console::style;

use super::Session;
use crate::config::Config;
use crate::resolve::DependencyResolver;

/// Options for the set command
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub descriptor: PathBuf,
    /// Module name or configuration file path
    pub target: String,
    pub name: String,
    pub value: String,
}

/// Execute the set command
pub fn execute_set(options: SetOptions, config: &Config) -> Result<()> {
    let mut session = Session::open(config, &options.descriptor)?;

    // Accept a module name as shorthand for its configuration file
    let configuration = match session.catalog.module_configuration(&options.target) {
        Some(conf) => conf.path.clone(),
        None if session.catalog.configuration(&options.target).is_some() => options.target.clone(),
        None => bail!("No configuration file for {}", options.target),
    };

    let env = session.project.tag_environment();
    let param = session.catalog.parameter(&configuration, &options.name)?;
    let support = session.catalog.parameter_support(param, &env);
    if !support.supported {
        println!(
            "{} {} is not supported on {}",
            style("!").yellow(),
            options.name,
            session.project.cpu.name
        );
    }

    let mut resolver = DependencyResolver::new(&mut session.catalog);
    let change = resolver.set_parameter(&configuration, &options.name, &options.value)?;
    if !change.changed() {
        println!("{} {} already {}", style("✓").green(), change.name, change.new_value);
        return Ok(());
    }

    println!(
        "{} {} {} → {}",
        style("✓").green(),
        style(&change.name).bold(),
        style(&change.old_value).dim(),
        change.new_value
    );
    for module in &change.enabled {
        println!("  {} {}", style("+").cyan(), module);
    }
    if !change.released.is_empty() {
        println!(
            "\n{} No longer required: {}",
            style("!").yellow(),
            change.released.join(", ")
        );
        println!(
            "  Run {} to remove them",
            style(format!("modforge disable {}", change.released.join(" "))).cyan()
        );
    }

    session.save()?;
    Ok(())
}
