//! @acp:module "Modules Command"
//! @acp:summary "List modules and show one module's details"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::Result;
use console::style;
use serde::Serialize;

use super::Session;
use crate::catalog::ParamType;
use crate::config::Config;

/// Options for the modules command
#[derive(Debug, Clone, Default)]
pub struct ModulesOptions {
    pub descriptor: PathBuf,
    /// Only modules in this category
    pub category: Option<String>,
    /// Only enabled modules
    pub enabled: bool,
    pub json: bool,
}

/// One row of the module listing
#[derive(Debug, Clone, Serialize)]
pub struct ModuleRow {
    pub name: String,
    pub category: String,
    pub enabled: bool,
    pub explicit: bool,
    pub supported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_error: Option<String>,
    pub description: String,
}

/// Execute the modules command
pub fn execute_modules(options: ModulesOptions, config: &Config) -> Result<()> {
    let session = Session::open(config, &options.descriptor)?;
    let env = session.project.tag_environment();

    let rows: Vec<ModuleRow> = session
        .catalog
        .modules()
        .filter(|m| options.category.as_ref().map_or(true, |c| &m.category == c))
        .filter(|m| !options.enabled || m.enabled)
        .map(|m| {
            let support = session.catalog.module_support(&m.name, &env);
            ModuleRow {
                name: m.name.clone(),
                category: m.category.clone(),
                enabled: m.enabled,
                explicit: session.catalog.is_explicit(&m.name),
                supported: support.supported,
                support_error: support.error.map(|e| e.to_string()),
                description: m.description.clone(),
            }
        })
        .collect();

    if options.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut category = String::new();
    for row in &rows {
        if row.category != category {
            category = row.category.clone();
            println!("{}", style(&category).bold());
        }
        let mark = match (row.enabled, row.explicit) {
            (true, true) => style("✓").green(),
            (true, false) => style("+").cyan(),
            (false, _) => style(" ").dim(),
        };
        let name = if row.supported {
            style(row.name.clone())
        } else {
            style(format!("{} (unsupported)", row.name)).dim()
        };
        println!("  {} {:<24} {}", mark, name, style(&row.description).dim());
        if let Some(err) = &row.support_error {
            println!("      {} {}", style("!").yellow(), err);
        }
    }
    println!(
        "\n{} enabled, {} total ({} = selected, {} = pulled in)",
        rows.iter().filter(|r| r.enabled).count(),
        rows.len(),
        style("✓").green(),
        style("+").cyan()
    );
    Ok(())
}

/// Options for the show command
#[derive(Debug, Clone, Default)]
pub struct ShowOptions {
    pub descriptor: PathBuf,
    pub module: String,
}

/// Execute the show command
pub fn execute_show(options: ShowOptions, config: &Config) -> Result<()> {
    let session = Session::open(config, &options.descriptor)?;
    let catalog = &session.catalog;
    let module = catalog.require_module(&options.module)?;

    println!("{} {}", style(&module.name).bold(), style(&module.description).dim());
    println!("  category:     {}", module.category);
    println!("  defined in:   {}", module.defined_in.display());
    println!(
        "  state:        {}",
        if module.enabled { "enabled" } else { "disabled" }
    );
    if let Some(supports) = &module.supports {
        println!("  supports:     {}", supports);
    }
    if let Some(harvard) = module.harvard {
        println!("  harvard:      {}", harvard);
    }
    let deps = catalog.effective_dependencies(&module.name);
    if !deps.is_empty() {
        println!("  depends on:   {}", deps.join(", "));
    }
    let dependents = catalog.hard_dependents(&module.name);
    if !dependents.is_empty() {
        println!("  required by:  {}", dependents.join(", "));
    }
    for (key, value) in &module.constants {
        println!("  {} = {}", key, value);
    }

    let Some(conf) = catalog.module_configuration(&module.name) else {
        return Ok(());
    };
    println!("\n{} {}", style("Configuration").bold(), conf.path);
    for param in conf.iter() {
        println!(
            "  {:<32} {:<12} {}",
            param.name,
            param.rendered_value(),
            style(param.kind.as_str()).dim()
        );
        if !param.brief.is_empty() {
            println!("      {}", param.brief);
        }
        match param.kind {
            ParamType::Integer if param.min.is_some() || param.max.is_some() => {
                let bound = |b: Option<i64>| b.map(|v| v.to_string()).unwrap_or_default();
                println!("      range [{}, {}]", bound(param.min), bound(param.max));
            }
            ParamType::Enum => {
                if let Some(list) = param.value_list.as_deref().and_then(|l| catalog.list(l)) {
                    println!("      one of: {}", list.values.join(", "));
                }
            }
            ParamType::Boolean if !param.conditional_deps.is_empty() => {
                println!("      when set, requires: {}", param.conditional_deps.join(", "));
            }
            _ => {}
        }
    }
    Ok(())
}
