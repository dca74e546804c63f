//! @acp:module "Commands"
//! @acp:summary "CLI command implementations"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Each command is in its own submodule. Commands that work on an existing
//! project share [`Session`], which loads the descriptor, scans the source
//! tree and restores the saved selection.

pub mod enable;
pub mod generate;
pub mod init;
pub mod modules;
pub mod set;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::catalog::{Catalog, CatalogLoader};
use crate::config::Config;
use crate::project::ProjectDescriptor;

pub use enable::{execute_disable, execute_enable, DisableOptions, EnableOptions};
pub use generate::{execute_generate, GenerateOptions};
pub use init::{execute_init, InitOptions};
pub use modules::{execute_modules, execute_show, ModulesOptions, ShowOptions};
pub use set::{execute_set, SetOptions};

/// @acp:summary "Loaded project plus its catalog"
pub struct Session {
    pub config: Config,
    pub descriptor_path: PathBuf,
    pub project: ProjectDescriptor,
    pub catalog: Catalog,
}

impl Session {
    /// Open a descriptor, scan its source tree and restore the saved state
    pub fn open(config: &Config, descriptor_path: &Path) -> Result<Self> {
        let project = ProjectDescriptor::open(descriptor_path)
            .with_context(|| format!("Failed to open project {}", descriptor_path.display()))?;

        let spinner = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(spinner_style);
        }
        spinner.set_message(format!("Scanning {}", project.source_root.display()));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let loaded = CatalogLoader::new(config)
            .with_tags(&project.cpu.file_tags())
            .load(&project.source_root);
        spinner.finish_and_clear();
        let mut catalog = loaded.with_context(|| {
            format!("Failed to scan {}", project.source_root.display())
        })?;

        let config_dir = config.config_dir(&project.project_dir());
        project
            .merge_generated(&mut catalog, &config_dir)
            .context("Failed to read generated configuration files")?;
        for missing in project.apply_to(&mut catalog) {
            eprintln!(
                "{} Saved entry {} no longer exists in the source tree",
                style("!").yellow(),
                missing
            );
        }

        Ok(Self {
            config: config.clone(),
            descriptor_path: descriptor_path.to_path_buf(),
            project,
            catalog,
        })
    }

    /// Record the catalog state in the descriptor and write it
    pub fn save(&mut self) -> Result<()> {
        self.project.capture_from(&self.catalog);
        self.project
            .save(&self.descriptor_path)
            .with_context(|| format!("Failed to write {}", self.descriptor_path.display()))?;
        Ok(())
    }
}
