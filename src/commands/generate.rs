//! @acp:module "Generate Command"
//! @acp:summary "Write configuration headers and build scripts"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use similar::TextDiff;

use super::Session;
use crate::config::Config;
use crate::generate::{ArtifactGenerator, TemplateSet};

/// Options for the generate command
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub descriptor: PathBuf,
    /// Show what would change without writing
    pub dry_run: bool,
}

/// Execute the generate command
pub fn execute_generate(options: GenerateOptions, config: &Config) -> Result<()> {
    let mut session = Session::open(config, &options.descriptor)?;
    let project = &session.project;

    let templates = TemplateSet::load(
        project.template_family(),
        &project.name,
        config.template_dir.as_deref(),
    )
    .context("Failed to load build templates")?;
    let generator =
        ArtifactGenerator::new(project, templates).with_config_dir(&config.output.config_dir);

    if options.dry_run {
        let mut changed = 0;
        for file in generator.render(&session.catalog) {
            let path = project.output_dir.join(&file.path);
            let current = std::fs::read_to_string(&path).unwrap_or_default();
            if file.user_owned && path.exists() {
                continue;
            }
            if current == file.contents {
                continue;
            }
            changed += 1;
            let name = file.path.display().to_string();
            let diff = TextDiff::from_lines(&current, &file.contents);
            print!(
                "{}",
                diff.unified_diff()
                    .context_radius(3)
                    .header(&format!("a/{}", name), &format!("b/{}", name))
            );
        }
        println!(
            "\n{} {} files would change (dry run)",
            style("→").cyan(),
            changed
        );
        return Ok(());
    }

    let written = generator.generate(&session.catalog)?;
    println!(
        "{} Generated {} files in {}",
        style("✓").green(),
        written.len(),
        project.output_dir.display()
    );
    for path in &written {
        let shown = path.strip_prefix(&project.output_dir).unwrap_or(path);
        println!("  {}", shown.display());
    }

    session.save()?;
    Ok(())
}
