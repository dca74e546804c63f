//! @acp:module "Enable Command"
//! @acp:summary "Select and unselect modules"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Implements `modforge enable` and `modforge disable`. Disabling can leave
//! parameters and pulled-in modules behind; both are confirmed with the user
//! (or accepted with `--yes`) before anything else changes.

use std::path::PathBuf;

use anyhow::Result;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};

use super::Session;
use crate::config::Config;
use crate::resolve::DependencyResolver;

/// Options for the enable command
#[derive(Debug, Clone, Default)]
pub struct EnableOptions {
    pub descriptor: PathBuf,
    pub modules: Vec<String>,
}

/// Execute the enable command
pub fn execute_enable(options: EnableOptions, config: &Config) -> Result<()> {
    let mut session = Session::open(config, &options.descriptor)?;
    let mut resolver = DependencyResolver::new(&mut session.catalog);

    for name in &options.modules {
        let outcome = resolver.select(name)?;
        println!("{} Enabled {}", style("✓").green(), style(&outcome.module).bold());
        for dep in &outcome.auto_enabled {
            println!("  {} {}", style("+").cyan(), dep);
        }
    }

    session.save()?;
    Ok(())
}

/// Options for the disable command
#[derive(Debug, Clone, Default)]
pub struct DisableOptions {
    pub descriptor: PathBuf,
    pub modules: Vec<String>,
    /// Accept every follow-up without prompting
    pub yes: bool,
}

/// Execute the disable command
pub fn execute_disable(options: DisableOptions, config: &Config) -> Result<()> {
    let mut session = Session::open(config, &options.descriptor)?;
    let mut resolver = DependencyResolver::new(&mut session.catalog);

    for name in &options.modules {
        if !resolver.catalog().is_enabled(name) {
            resolver.catalog().require_module(name)?;
            println!("{} {} is not enabled", style("!").yellow(), name);
            continue;
        }

        let outcome = resolver.unselect(name)?;
        println!("{} Disabled {}", style("✓").green(), style(&outcome.module).bold());
        for dependent in &outcome.disabled {
            println!("  {} {}", style("-").red(), dependent);
        }

        let mut unused = outcome.orphans.clone();
        if !outcome.unsatisfied_params.is_empty() {
            println!("\nThese settings still require a disabled module:");
            for param in &outcome.unsatisfied_params {
                println!("  {} (module {})", param, param.module);
            }
            if confirm("Turn them off?", options.yes)? {
                for param in &outcome.unsatisfied_params {
                    let change = resolver.zero_parameter(param)?;
                    println!("  {} {} = {}", style("✓").green(), param, change.new_value);
                    for released in change.released {
                        if !unused.contains(&released) {
                            unused.push(released);
                        }
                    }
                }
            }
        }

        if !unused.is_empty() {
            println!("\nNo longer required by any enabled module:");
            for orphan in &unused {
                println!("  {}", orphan);
            }
            if confirm("Disable them as well?", options.yes)? {
                for released in resolver.release(&unused)? {
                    println!("  {} {}", style("-").red(), released.module);
                    for dependent in released.disabled {
                        println!("  {} {}", style("-").red(), dependent);
                    }
                }
            }
        }
    }

    session.save()?;
    Ok(())
}

fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(true)
        .interact()?)
}
