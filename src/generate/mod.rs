//! @acp:module "Artifact Generator"
//! @acp:summary "Render configuration headers and build scripts from a resolved catalog"
//! @acp:domain cli
//! @acp:layer service
//!
//! Generation works on a snapshot of the catalog: autoenabled parameters are
//! forced to mirror their module before any file is rendered, and the live
//! catalog is never touched. Rendering is pure; `write_artifacts` performs
//! the only I/O and replaces each file atomically.

pub mod sources;
pub mod templates;
pub mod tokens;

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

pub use sources::{collect_sources, SourceLists};
pub use templates::{Template, TemplateFamily, TemplateSet};
pub use tokens::{format_list, TokenTable};

use crate::catalog::Catalog;
use crate::error::{ForgeError, Result};
use crate::project::ProjectDescriptor;
use crate::resolve::DependencyResolver;

/// @acp:summary "One generated file, not yet written"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    /// Path relative to the project output directory
    pub path: PathBuf,
    pub contents: String,
    /// Keep an existing copy instead of overwriting it
    pub user_owned: bool,
}

/// @acp:summary "Produces every project artifact for one descriptor"
pub struct ArtifactGenerator<'a> {
    project: &'a ProjectDescriptor,
    templates: TemplateSet,
    /// Configuration header directory, relative to the project directory
    config_dir: PathBuf,
}

impl<'a> ArtifactGenerator<'a> {
    pub fn new(project: &'a ProjectDescriptor, templates: TemplateSet) -> Self {
        Self {
            project,
            templates,
            config_dir: PathBuf::from("cfg"),
        }
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Output path of a configuration header, relative to the output directory
    pub fn configuration_output(&self, configuration: &str) -> PathBuf {
        let base = Path::new(configuration)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(configuration));
        Path::new(&self.project.name).join(&self.config_dir).join(base)
    }

    /// @acp:summary "Render all artifacts without writing anything"
    pub fn render(&self, catalog: &Catalog) -> Vec<RenderedFile> {
        let mut snapshot = catalog.clone();
        let forced = DependencyResolver::new(&mut snapshot).sync_autoenabled();
        debug!("Forced {} autoenabled parameters", forced);

        let mut files = Vec::new();
        let referenced: BTreeSet<String> = snapshot
            .enabled_modules()
            .filter_map(|m| m.configuration.clone())
            .collect();
        for path in referenced {
            let Some(conf) = snapshot.configuration(&path) else {
                continue;
            };
            files.push(RenderedFile {
                path: self.configuration_output(&path),
                contents: conf.render(),
                user_owned: false,
            });
        }

        let sources = collect_sources(&mut snapshot, self.project);
        let tokens = TokenTable::build(&snapshot, self.project, &sources, self.templates.family());
        for template in self.templates.iter() {
            files.push(RenderedFile {
                path: template.output.clone(),
                contents: tokens.substitute(&template.text),
                user_owned: template.user_owned,
            });
        }
        files
    }

    /// Render and write into the project's output directory
    pub fn generate(&self, catalog: &Catalog) -> Result<Vec<PathBuf>> {
        let files = self.render(catalog);
        let written = write_artifacts(&self.project.output_dir, &files)?;
        info!(
            "Generated {} files for {} in {}",
            written.len(),
            self.project.name,
            self.project.output_dir.display()
        );
        Ok(written)
    }
}

/// Write rendered files under `root`, each through a temporary file in its
/// destination directory. User-owned files that already exist are skipped.
pub fn write_artifacts(root: &Path, files: &[RenderedFile]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for file in files {
        let path = root.join(&file.path);
        if file.user_owned && path.exists() {
            debug!("Keeping user file {}", path.display());
            continue;
        }
        let generation = |source: std::io::Error| ForgeError::Generation {
            path: path.clone(),
            source,
        };

        let parent = path.parent().unwrap_or(root);
        std::fs::create_dir_all(parent).map_err(generation)?;
        let mut temp = NamedTempFile::new_in(parent).map_err(generation)?;
        temp.write_all(file.contents.as_bytes()).map_err(generation)?;
        temp.persist(&path).map_err(|e| generation(e.error))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rendered(path: &str, contents: &str, user_owned: bool) -> RenderedFile {
        RenderedFile {
            path: PathBuf::from(path),
            contents: contents.to_string(),
            user_owned,
        }
    }

    #[test]
    fn test_write_artifacts_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let written = write_artifacts(
            dir.path(),
            &[rendered("demo/cfg/cfg_proc.h", "#define X 1\n", false)],
        )
        .unwrap();
        assert_eq!(written, vec![dir.path().join("demo/cfg/cfg_proc.h")]);
        assert_eq!(
            std::fs::read_to_string(&written[0]).unwrap(),
            "#define X 1\n"
        );
    }

    #[test]
    fn test_user_owned_files_are_kept() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("demo")).unwrap();
        std::fs::write(dir.path().join("demo/demo_user.mk"), "mine\n").unwrap();

        let written = write_artifacts(
            dir.path(),
            &[
                rendered("demo/demo_user.mk", "generated\n", true),
                rendered("Makefile", "all:\n", false),
            ],
        )
        .unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("demo/demo_user.mk")).unwrap(),
            "mine\n"
        );
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blocker"), "").unwrap();
        let err = write_artifacts(dir.path(), &[rendered("blocker/Makefile", "", false)])
            .unwrap_err();
        assert!(matches!(err, ForgeError::Generation { .. }));
    }
}
