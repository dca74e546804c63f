//! @acp:module "Module Catalog"
//! @acp:summary "In-memory graph of modules, configuration files and value lists"
//! @acp:domain cli
//! @acp:layer service
//!
//! The catalog owns everything discovered in a source tree. Enablement and
//! parameter values are mutated only through the resolver; reverse indexes
//! for hard and conditional dependencies are computed once at construction.

pub mod loader;
pub mod scan;
pub mod supports;
pub mod types;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub use loader::CatalogLoader;
pub use scan::FileIndex;
pub use supports::{evaluate_supports, SupportStatus, TagEnvironment};
pub use types::{
    ConfigurationFile, HarvardMode, Module, NamedValueList, ParamRef, ParamType, Parameter,
};

use crate::error::{ForgeError, Result};
use crate::parse::parse_configuration;

/// @acp:summary "Modules, configurations and lists of one source tree"
#[derive(Debug, Clone)]
pub struct Catalog {
    source_root: PathBuf,
    pub(crate) modules: BTreeMap<String, Module>,
    pub(crate) configurations: BTreeMap<String, ConfigurationFile>,
    lists: BTreeMap<String, NamedValueList>,
    /// Bare (non-module) dependency name -> number of enabled modules pulling it in
    pub(crate) file_refs: BTreeMap<String, usize>,
    /// Enabled module -> bare dependencies it contributed to `file_refs`
    pub(crate) contributions: BTreeMap<String, Vec<String>>,
    /// Modules the user asked for, as opposed to ones pulled in
    pub(crate) explicit: BTreeSet<String>,
    /// Dependency -> modules listing it as a hard dependency
    dependents: HashMap<String, Vec<String>>,
    /// Dependency -> boolean parameters gating it
    conditional: HashMap<String, Vec<ParamRef>>,
    files: FileIndex,
}

impl Catalog {
    /// Build a catalog from already parsed parts; every module starts disabled
    pub fn new(
        files: FileIndex,
        modules: Vec<Module>,
        configurations: Vec<ConfigurationFile>,
        lists: Vec<NamedValueList>,
    ) -> Self {
        let mut catalog = Self {
            source_root: files.root().to_path_buf(),
            modules: BTreeMap::new(),
            configurations: configurations
                .into_iter()
                .map(|c| (c.path.clone(), c))
                .collect(),
            lists: lists.into_iter().map(|l| (l.name.clone(), l)).collect(),
            file_refs: BTreeMap::new(),
            contributions: BTreeMap::new(),
            explicit: BTreeSet::new(),
            dependents: HashMap::new(),
            conditional: HashMap::new(),
            files,
        };
        for mut module in modules {
            if catalog.modules.contains_key(&module.name) {
                warn!(
                    "Module {} redefined in {}, keeping the first definition",
                    module.name,
                    module.defined_in.display()
                );
                continue;
            }
            module.enabled = false;
            catalog.modules.insert(module.name.clone(), module);
        }
        catalog.reindex();
        catalog
    }

    /// Rebuild the reverse dependency indexes
    fn reindex(&mut self) {
        self.dependents.clear();
        self.conditional.clear();

        for module in self.modules.values() {
            for dep in &module.depends {
                let entry = self.dependents.entry(dep.clone()).or_default();
                if !entry.contains(&module.name) {
                    entry.push(module.name.clone());
                }
            }
            let Some(conf_path) = &module.configuration else {
                continue;
            };
            let Some(conf) = self.configurations.get(conf_path) else {
                continue;
            };
            for param in conf.iter().filter(|p| p.kind == ParamType::Boolean) {
                for dep in &param.conditional_deps {
                    self.conditional.entry(dep.clone()).or_default().push(ParamRef {
                        module: module.name.clone(),
                        configuration: conf_path.clone(),
                        name: param.name.clone(),
                    });
                }
            }
        }
        debug!(
            "Indexed {} dependency targets, {} conditional targets",
            self.dependents.len(),
            self.conditional.len()
        );
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn files(&mut self) -> &mut FileIndex {
        &mut self.files
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn require_module(&self, name: &str) -> Result<&Module> {
        self.modules
            .get(name)
            .ok_or_else(|| ForgeError::UnknownModule(name.to_string()))
    }

    pub fn is_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// All modules in name order
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn enabled_modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values().filter(|m| m.enabled)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.modules.get(name).is_some_and(|m| m.enabled)
    }

    /// Enabled because the user asked for it rather than as a dependency
    pub fn is_explicit(&self, name: &str) -> bool {
        self.explicit.contains(name)
    }

    pub fn configuration(&self, path: &str) -> Option<&ConfigurationFile> {
        self.configurations.get(path)
    }

    pub fn configurations(&self) -> impl Iterator<Item = &ConfigurationFile> {
        self.configurations.values()
    }

    /// Configuration file bound to a module, if it has one and it was found
    pub fn module_configuration(&self, module: &str) -> Option<&ConfigurationFile> {
        self.modules
            .get(module)
            .and_then(|m| m.configuration.as_deref())
            .and_then(|path| self.configurations.get(path))
    }

    pub fn parameter(&self, configuration: &str, name: &str) -> Result<&Parameter> {
        self.configurations
            .get(configuration)
            .ok_or_else(|| ForgeError::UnknownConfiguration(configuration.to_string()))?
            .get(name)
            .ok_or_else(|| ForgeError::UnknownParameter {
                configuration: configuration.to_string(),
                name: name.to_string(),
            })
    }

    pub fn list(&self, name: &str) -> Option<&NamedValueList> {
        self.lists.get(name)
    }

    pub fn lists(&self) -> impl Iterator<Item = &NamedValueList> {
        self.lists.values()
    }

    /// Current reference count of a bare dependency file
    pub fn file_ref_count(&self, name: &str) -> usize {
        self.file_refs.get(name).copied().unwrap_or(0)
    }

    pub fn file_refs(&self) -> &BTreeMap<String, usize> {
        &self.file_refs
    }

    /// Modules listing `name` as a hard dependency
    pub fn hard_dependents(&self, name: &str) -> &[String] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Boolean parameters declaring `name` as a conditional dependency
    pub fn conditional_gates(&self, name: &str) -> &[ParamRef] {
        self.conditional.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Dependencies currently in effect for a module: hard deps, then the
    /// conditional deps of its true boolean parameters in source order
    pub fn effective_dependencies(&self, name: &str) -> Vec<String> {
        let Some(module) = self.modules.get(name) else {
            return Vec::new();
        };
        let mut deps = module.depends.clone();
        if let Some(conf) = self.module_configuration(name) {
            for param in conf.iter() {
                for dep in param.active_conditional_deps() {
                    if !deps.contains(dep) {
                        deps.push(dep.clone());
                    }
                }
            }
        }
        deps
    }

    /// Capability gate for a module
    pub fn module_support(&self, name: &str, env: &TagEnvironment) -> SupportStatus {
        match self.modules.get(name) {
            Some(module) => SupportStatus::evaluate(module.supports.as_deref(), env),
            None => SupportStatus::supported(),
        }
    }

    /// Capability gate for a parameter
    pub fn parameter_support(&self, param: &Parameter, env: &TagEnvironment) -> SupportStatus {
        SupportStatus::evaluate(param.supports.as_deref(), env)
    }

    /// Override parsed defaults with values from a previously generated copy
    /// of a configuration file. Returns the number of parameters taken over.
    pub fn apply_user_configuration(&mut self, configuration: &str, text: &str) -> Result<usize> {
        let user = parse_configuration(configuration, text)
            .map_err(|e| ForgeError::configuration_definition(configuration, e))?;
        let conf = self
            .configurations
            .get_mut(configuration)
            .ok_or_else(|| ForgeError::UnknownConfiguration(configuration.to_string()))?;
        let merged = conf.merge_values(&user);
        debug!("Merged {} values into {}", merged, configuration);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str, depends: &[&str]) -> Module {
        Module {
            name: name.to_string(),
            depends: depends.iter().map(|s| s.to_string()).collect(),
            configuration: None,
            category: "kern".to_string(),
            hw: Vec::new(),
            enabled: false,
            constants: BTreeMap::new(),
            description: String::new(),
            supports: None,
            harvard: None,
            defined_in: PathBuf::from(format!("kern/{}.h", name)),
        }
    }

    fn catalog() -> Catalog {
        let conf = parse_configuration(
            "cfg/cfg_net.h",
            "/**\n * Use signals.\n * $WIZ$ type = \"boolean\"; conditional_deps = (\"signal\",)\n */\n#define CONFIG_NET_SIG 1\n",
        )
        .unwrap();
        let mut net = module("net", &["kernel", "util.c"]);
        net.configuration = Some("cfg/cfg_net.h".to_string());
        net.supports = Some("avr".to_string());
        Catalog::new(
            FileIndex::new("/nonexistent", &[]),
            vec![net, module("kernel", &[]), module("signal", &["kernel"])],
            vec![conf],
            Vec::new(),
        )
    }

    #[test]
    fn test_reverse_indexes() {
        let catalog = catalog();
        assert_eq!(catalog.hard_dependents("kernel"), &["net".to_string(), "signal".to_string()]);
        assert_eq!(catalog.hard_dependents("util.c"), &["net".to_string()]);
        assert!(catalog.hard_dependents("net").is_empty());

        let gates = catalog.conditional_gates("signal");
        assert_eq!(gates.len(), 1);
        assert_eq!(gates[0].to_string(), "cfg/cfg_net.h:CONFIG_NET_SIG");
    }

    #[test]
    fn test_effective_dependencies_include_active_conditionals() {
        let catalog = catalog();
        assert_eq!(
            catalog.effective_dependencies("net"),
            vec!["kernel".to_string(), "util.c".to_string(), "signal".to_string()]
        );
    }

    #[test]
    fn test_module_support_fallback() {
        let catalog = catalog();
        let env = TagEnvironment::new(["arm"]);
        let status = catalog.module_support("net", &env);
        assert!(status.supported);
        assert!(status.error.is_some());

        let env = TagEnvironment::new(["avr"]);
        assert!(!catalog.module_support("net", &env).supported);
    }

    #[test]
    fn test_apply_user_configuration() {
        let mut catalog = catalog();
        let merged = catalog
            .apply_user_configuration(
                "cfg/cfg_net.h",
                "/// Use signals\n#define CONFIG_NET_SIG 0\n/// Gone\n#define CONFIG_OLD 3\n",
            )
            .unwrap();
        assert_eq!(merged, 1);
        assert_eq!(catalog.parameter("cfg/cfg_net.h", "CONFIG_NET_SIG").unwrap().value, "0");
    }

    #[test]
    fn test_unknown_configuration_is_named() {
        let mut catalog = catalog();
        let err = catalog
            .apply_user_configuration("cfg/cfg_gone.h", "/// Gone\n#define CONFIG_GONE 1\n")
            .unwrap_err();
        assert!(matches!(&err, ForgeError::UnknownConfiguration(path) if path == "cfg/cfg_gone.h"));
        assert_eq!(err.to_string(), "unknown configuration file: cfg/cfg_gone.h");

        let err = catalog.parameter("cfg/cfg_gone.h", "CONFIG_GONE").unwrap_err();
        assert!(matches!(err, ForgeError::UnknownConfiguration(_)));
    }
}
