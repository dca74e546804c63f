//! @acp:module "Catalog Loader"
//! @acp:summary "Scan a source root and build the module catalog"
//! @acp:domain cli
//! @acp:layer service
//!
//! Files matching the include globs are read and parsed in parallel with
//! rayon, then merged sequentially in path order so that the resulting
//! catalog does not depend on thread scheduling.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::scan::FileIndex;
use super::types::{ConfigurationFile, Module, NamedValueList};
use super::Catalog;
use crate::config::Config;
use crate::error::{ForgeError, Result};
use crate::parse::{doc_blocks, parse_configuration, parse_module_block, parse_value_lists, ModuleDefinition};

/// Directives found in one scanned file
#[derive(Debug, Default)]
struct FileDefinitions {
    path: PathBuf,
    module: Option<ModuleDefinition>,
    lists: BTreeMap<String, Vec<String>>,
}

/// @acp:summary "Builds a Catalog from a source tree"
pub struct CatalogLoader {
    include: Vec<String>,
    exclude: Vec<String>,
    /// CPU tags whose `*_<tag>.h` headers are scanned for value lists
    tags: Vec<String>,
}

impl CatalogLoader {
    pub fn new(config: &Config) -> Self {
        Self {
            include: config.include.clone(),
            exclude: config.exclude.clone(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[String]) -> Self {
        self.tags = tags.to_vec();
        self
    }

    /// @acp:summary "Scan `source_root` and parse every definition"
    pub fn load(&self, source_root: &Path) -> Result<Catalog> {
        if !source_root.is_dir() {
            return Err(ForgeError::MissingSourceRoot(source_root.to_path_buf()));
        }

        let mut files = FileIndex::new(source_root, &self.exclude);
        let candidates: BTreeSet<PathBuf> = self
            .include
            .iter()
            .flat_map(|pattern| files.find(pattern))
            .collect();
        info!(
            "Scanning {} files under {}",
            candidates.len(),
            source_root.display()
        );

        let candidates: Vec<PathBuf> = candidates.into_iter().collect();
        let parsed: Vec<Result<FileDefinitions>> = candidates
            .par_iter()
            .map(|rel| {
                let text = fs::read_to_string(source_root.join(rel))?;
                self.parse_file(rel, &text)
            })
            .collect();

        let mut modules = Vec::new();
        let mut lists: BTreeMap<String, NamedValueList> = BTreeMap::new();
        for definitions in parsed {
            let definitions = definitions?;
            if let Some(def) = definitions.module {
                modules.push(module_from_definition(def, &definitions.path));
            }
            for (name, values) in definitions.lists {
                if lists.contains_key(&name) {
                    debug!("Value list {} redefined in {}", name, definitions.path.display());
                }
                lists.insert(name.clone(), NamedValueList { name, values });
            }
        }

        let configurations = load_configurations(source_root, &modules)?;
        info!(
            "Found {} modules, {} configuration files, {} value lists",
            modules.len(),
            configurations.len(),
            lists.len()
        );

        Ok(Catalog::new(
            files,
            modules,
            configurations,
            lists.into_values().collect(),
        ))
    }

    fn is_tag_header(&self, rel: &Path) -> bool {
        let Some(stem) = rel
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".h"))
        else {
            return false;
        };
        self.tags
            .iter()
            .any(|tag| stem.ends_with(&format!("_{}", tag)))
    }

    fn parse_file(&self, rel: &Path, text: &str) -> Result<FileDefinitions> {
        let mut definitions = FileDefinitions {
            path: rel.to_path_buf(),
            ..Default::default()
        };
        let blocks = doc_blocks(text);
        let Some(first) = blocks.first() else {
            return Ok(definitions);
        };

        let block = parse_module_block(first).map_err(|e| ForgeError::module_definition(rel, e))?;
        let declares_module = block.module.is_some();
        definitions.module = block.module;

        if self.is_tag_header(rel) {
            let scanned = if declares_module { &blocks[1..] } else { &blocks[..] };
            definitions.lists =
                parse_value_lists(scanned).map_err(|e| ForgeError::enum_definition(rel, e))?;
        } else if declares_module && block.has_directives {
            // Configuration headers also open with directives; their later
            // blocks hold parameter metadata, not value lists
            definitions.lists =
                parse_value_lists(&blocks[1..]).map_err(|e| ForgeError::enum_definition(rel, e))?;
        }
        Ok(definitions)
    }
}

/// Turn a parsed declaration into a catalog module
fn module_from_definition(def: ModuleDefinition, path: &Path) -> Module {
    let mut depends = def.depends;
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        if stem != def.name && !depends.iter().any(|d| d == stem) {
            depends.push(stem.to_string());
        }
    }
    let category = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Module {
        name: def.name,
        depends,
        configuration: def.configuration,
        category,
        hw: def.hw,
        enabled: false,
        constants: def.constants,
        description: def.description,
        supports: def.supports,
        harvard: def.harvard,
        defined_in: path.to_path_buf(),
    }
}

/// Parse every configuration file referenced by a module
fn load_configurations(source_root: &Path, modules: &[Module]) -> Result<Vec<ConfigurationFile>> {
    let paths: BTreeSet<&str> = modules
        .iter()
        .filter_map(|m| m.configuration.as_deref())
        .collect();

    let parsed: Vec<Result<Option<ConfigurationFile>>> = paths
        .par_iter()
        .map(|path| {
            let full = source_root.join(path);
            if !full.is_file() {
                warn!("Configuration file {} not found", full.display());
                return Ok(None);
            }
            let text = fs::read_to_string(&full)?;
            parse_configuration(path, &text)
                .map(Some)
                .map_err(|e| ForgeError::configuration_definition(*path, e))
        })
        .collect();

    parsed
        .into_iter()
        .filter_map(|r| r.transpose())
        .collect()
}
