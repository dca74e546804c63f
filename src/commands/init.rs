//! @acp:module "Init Command"
//! @acp:summary "Create a new project descriptor"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Implements `modforge init`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use console::style;

use crate::catalog::CatalogLoader;
use crate::config::Config;
use crate::project::{CpuInfo, ProjectDescriptor, Toolchain};

/// Options for the init command
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Descriptor file to create
    pub descriptor: PathBuf,
    pub name: String,
    pub source_root: PathBuf,
    pub output_dir: PathBuf,
    pub cpu: String,
    /// CPU architecture tags
    pub tags: Vec<String>,
    /// Toolchain identifier of the CPU
    pub cpu_toolchain: String,
    /// Compiler driver path
    pub toolchain: Option<PathBuf>,
    pub clock_frequency: String,
    /// Full tag universe for `supports` expressions
    pub known_tags: Vec<String>,
    /// Write a schema version 1 descriptor
    pub legacy: bool,
    /// Overwrite an existing descriptor
    pub force: bool,
}

/// Execute the init command
pub fn execute_init(options: InitOptions, config: &Config) -> Result<()> {
    if options.descriptor.exists() && !options.force {
        bail!(
            "{} already exists. Use --force to overwrite.",
            options.descriptor.display()
        );
    }

    let cpu = CpuInfo {
        name: options.cpu.clone(),
        tags: options.tags.clone(),
        toolchain: options.cpu_toolchain.clone(),
        ..Default::default()
    };
    let mut project = ProjectDescriptor::new(
        &options.name,
        absolute(&options.source_root)?,
        absolute(&options.output_dir)?,
        cpu,
    );
    if options.legacy {
        project.version = 1;
    }
    project.clock_frequency = options.clock_frequency.clone();
    project.known_tags = options.known_tags.clone();
    for tag in project.cpu.file_tags() {
        if !project.known_tags.contains(&tag) {
            project.known_tags.push(tag);
        }
    }
    if let Some(path) = &options.toolchain {
        project.toolchain = Toolchain {
            path: path.clone(),
            id: options.cpu_toolchain.clone(),
        };
    }
    project.validate()?;

    // Scan once so definition errors surface now rather than on first edit
    let catalog = CatalogLoader::new(config)
        .with_tags(&project.cpu.file_tags())
        .load(&project.source_root)
        .with_context(|| format!("Failed to scan {}", project.source_root.display()))?;

    project.save(&options.descriptor)?;
    println!(
        "{} Created {} (schema v{}, {} template family)",
        style("✓").green(),
        options.descriptor.display(),
        project.version,
        project.template_family()
    );
    println!(
        "  {} modules found under {}",
        catalog.modules().count(),
        project.source_root.display()
    );

    println!("\n{}", style("Next steps:").bold());
    println!("  1. Run {} to see available modules", style("modforge modules").cyan());
    println!("  2. Enable modules with {}", style("modforge enable <module>").cyan());
    println!("  3. Run {} to write the build files", style("modforge generate").cyan());

    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}
