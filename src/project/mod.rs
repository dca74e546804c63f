//! @acp:module "Project Descriptor"
//! @acp:summary "Persisted project state: CPU, toolchain, enabled modules and parameter values"
//! @acp:domain cli
//! @acp:layer model

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{Catalog, ParamType, TagEnvironment};
use crate::error::{ForgeError, Result};
use crate::generate::TemplateFamily;
use crate::resolve::DependencyResolver;

/// Default descriptor file name inside a project directory
pub const DESCRIPTOR_FILE: &str = "project.modforge.json";

/// Schema version written by this release
pub const CURRENT_VERSION: u32 = 2;

/// Descriptors without a version predate versioning
fn default_version() -> u32 {
    1
}

/// Extra per-CPU sources, paths relative to the source root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSources {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub c: Vec<String>,
    /// C sources placed in program memory
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pgm_c: Vec<String>,
    /// Preprocessed assembly
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cppa: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cxx: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub asm: Vec<String>,
}

/// @acp:summary "Target CPU description"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuInfo {
    pub name: String,
    /// Architecture tags, e.g. `avr`, `harvard`
    #[serde(default)]
    pub tags: Vec<String>,
    /// Toolchain identifier, e.g. `avr` or `arm-none-eabi`
    #[serde(default)]
    pub toolchain: String,
    /// `MK_*` build variables
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub build_parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub sources: CpuSources,
}

impl CpuInfo {
    pub fn is_harvard(&self) -> bool {
        self.tags.iter().any(|t| t == "harvard")
    }

    /// Suffixes tried when looking for CPU-specific variants of a file
    pub fn file_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for tag in self
            .tags
            .iter()
            .chain(std::iter::once(&self.name))
            .chain(std::iter::once(&self.toolchain))
        {
            if !tag.is_empty() && !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }
}

/// @acp:summary "Compiler driver used for the project"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    pub path: PathBuf,
    #[serde(default)]
    pub id: String,
}

impl Toolchain {
    /// Path text before and after the `gcc` part of the driver name
    pub fn prefix_suffix(&self) -> (String, String) {
        let path = self.path.to_string_lossy().replace('\\', "/");
        match path.rsplit_once("gcc") {
            Some((prefix, suffix)) => (prefix.to_string(), suffix.to_string()),
            None => {
                warn!("Toolchain {} has no 'gcc' in its name", path);
                (String::new(), String::new())
            }
        }
    }
}

/// @acp:summary "Serialized project record"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    #[serde(default = "default_version")]
    pub version: u32,
    pub name: String,
    pub source_root: PathBuf,
    /// Directory receiving the Makefile and the project subdirectory
    pub output_dir: PathBuf,
    pub cpu: CpuInfo,
    #[serde(default)]
    pub toolchain: Toolchain,
    /// CPU clock in Hz, written verbatim into the build files
    #[serde(default)]
    pub clock_frequency: String,
    /// Every tag a `supports` expression may mention
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub known_tags: Vec<String>,
    #[serde(default)]
    pub enabled_modules: Vec<String>,
    /// Subset of `enabled_modules` the user chose directly
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub explicit_modules: Vec<String>,
    /// configuration path -> parameter name -> value text
    #[serde(default)]
    pub parameters: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl ProjectDescriptor {
    pub fn new(name: &str, source_root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, cpu: CpuInfo) -> Self {
        Self {
            version: CURRENT_VERSION,
            name: name.to_string(),
            source_root: source_root.into(),
            output_dir: output_dir.into(),
            cpu,
            toolchain: Toolchain::default(),
            clock_frequency: String::new(),
            known_tags: Vec::new(),
            enabled_modules: Vec::new(),
            explicit_modules: Vec::new(),
            parameters: BTreeMap::new(),
            saved_at: None,
        }
    }

    /// Parse a descriptor; relative paths are resolved against its directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut descriptor: Self = serde_json::from_str(&content)?;
        if let Some(base) = path.parent() {
            descriptor.resolve_paths(base);
        }
        Ok(descriptor)
    }

    /// Load and check that the source tree and toolchain still exist
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let descriptor = Self::load(path)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.source_root.is_relative() {
            self.source_root = base.join(&self.source_root);
        }
        if self.output_dir.is_relative() {
            self.output_dir = base.join(&self.output_dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.source_root.is_dir() {
            return Err(ForgeError::MissingSourceRoot(self.source_root.clone()));
        }
        if !self.toolchain.path.as_os_str().is_empty() && !self.toolchain.path.exists() {
            return Err(ForgeError::MissingToolchain(self.toolchain.path.clone()));
        }
        Ok(())
    }

    /// Write the descriptor; paths below its directory are stored relative
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.saved_at = Some(Utc::now());

        let mut stored = self.clone();
        if let Some(base) = path.parent().filter(|b| !b.as_os_str().is_empty()) {
            if let Ok(rel) = self.source_root.strip_prefix(base) {
                stored.source_root = rel.to_path_buf();
            }
            if let Ok(rel) = self.output_dir.strip_prefix(base) {
                stored.output_dir = rel.to_path_buf();
            }
        }
        let content = serde_json::to_string_pretty(&stored)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn template_family(&self) -> TemplateFamily {
        TemplateFamily::for_version(self.version)
    }

    /// Directory holding the project's own files (`<output>/<name>`)
    pub fn project_dir(&self) -> PathBuf {
        self.output_dir.join(&self.name)
    }

    pub fn tag_environment(&self) -> TagEnvironment {
        TagEnvironment::from_facts(
            &self.known_tags,
            &self.cpu.name,
            &self.cpu.tags,
            &self.cpu.toolchain,
        )
    }

    /// Take over values from previously generated configuration headers in `config_dir`
    pub fn merge_generated(&self, catalog: &mut Catalog, config_dir: &Path) -> Result<usize> {
        let paths: Vec<String> = catalog.configurations().map(|c| c.path.clone()).collect();
        let mut merged = 0;
        for path in paths {
            let Some(file_name) = Path::new(&path).file_name() else {
                continue;
            };
            let generated = config_dir.join(file_name);
            if generated.is_file() {
                let text = std::fs::read_to_string(&generated)?;
                merged += catalog.apply_user_configuration(&path, &text)?;
            }
        }
        debug!("Merged {} values from {}", merged, config_dir.display());
        Ok(merged)
    }

    /// Restore parameter values and module selection into a fresh catalog.
    /// Returns the names that no longer exist in the tree.
    pub fn apply_to(&self, catalog: &mut Catalog) -> Vec<String> {
        let mut missing = Vec::new();
        let mut resolver = DependencyResolver::new(catalog);

        for (configuration, values) in &self.parameters {
            for (name, value) in values {
                if let Err(e) = resolver.set_parameter(configuration, name, value) {
                    warn!("Skipping saved value for {}:{}: {}", configuration, name, e);
                    missing.push(format!("{}:{}", configuration, name));
                }
            }
        }

        let explicit: BTreeSet<&String> = if self.explicit_modules.is_empty() {
            self.enabled_modules.iter().collect()
        } else {
            self.explicit_modules.iter().collect()
        };
        for name in self.enabled_modules.iter().chain(&self.explicit_modules) {
            if resolver.catalog().is_enabled(name) && !explicit.contains(name) {
                continue;
            }
            if let Err(e) = resolver.select(name) {
                warn!("Saved module {} not found: {}", name, e);
                if !missing.contains(name) {
                    missing.push(name.clone());
                }
            }
        }
        catalog.explicit.retain(|name| explicit.contains(name));
        missing
    }

    /// Record the catalog's selection and editable values
    pub fn capture_from(&mut self, catalog: &Catalog) {
        self.enabled_modules = catalog.enabled_modules().map(|m| m.name.clone()).collect();
        self.explicit_modules = catalog
            .enabled_modules()
            .filter(|m| catalog.is_explicit(&m.name))
            .map(|m| m.name.clone())
            .collect();

        self.parameters.clear();
        for module in catalog.enabled_modules() {
            let Some(conf) = catalog.module_configuration(&module.name) else {
                continue;
            };
            let values = self.parameters.entry(conf.path.clone()).or_default();
            for param in conf.iter().filter(|p| p.kind != ParamType::Autoenabled) {
                values.insert(param.name.clone(), param.rendered_value());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn avr() -> CpuInfo {
        CpuInfo {
            name: "atmega64".to_string(),
            tags: vec!["avr".to_string(), "harvard".to_string()],
            toolchain: "avr".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_prefix_suffix() {
        let tc = Toolchain {
            path: PathBuf::from("/usr/bin/avr-gcc"),
            id: "avr".to_string(),
        };
        assert_eq!(tc.prefix_suffix(), ("/usr/bin/avr-".to_string(), String::new()));

        let tc = Toolchain {
            path: PathBuf::from("C:\\tools\\arm-none-eabi-gcc-4.3.2.exe"),
            id: "arm".to_string(),
        };
        assert_eq!(
            tc.prefix_suffix(),
            ("C:/tools/arm-none-eabi-".to_string(), "-4.3.2.exe".to_string())
        );
    }

    #[test]
    fn test_missing_version_is_legacy() {
        let json = r#"{ "name": "demo", "source_root": "/src", "output_dir": "/out", "cpu": { "name": "lm3s1968" } }"#;
        let descriptor: ProjectDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.version, 1);
        assert_eq!(descriptor.template_family(), TemplateFamily::Legacy);
    }

    #[test]
    fn test_open_reports_missing_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DESCRIPTOR_FILE);

        let mut descriptor = ProjectDescriptor::new("demo", "gone", "out", avr());
        descriptor.save(&path).unwrap();
        match ProjectDescriptor::open(&path).unwrap_err() {
            ForgeError::MissingSourceRoot(p) => assert_eq!(p, dir.path().join("gone")),
            other => panic!("unexpected error: {other}"),
        }

        std::fs::create_dir(dir.path().join("gone")).unwrap();
        descriptor.toolchain.path = dir.path().join("bin/avr-gcc");
        descriptor.save(&path).unwrap();
        assert!(matches!(
            ProjectDescriptor::open(&path).unwrap_err(),
            ForgeError::MissingToolchain(_)
        ));
    }

    #[test]
    fn test_tag_environment_and_file_tags() {
        let mut descriptor = ProjectDescriptor::new("demo", "/src", "/out", avr());
        descriptor.known_tags = vec!["arm".to_string(), "avr".to_string()];
        let env = descriptor.tag_environment();
        assert!(env.is_set("avr"));
        assert!(env.is_set("atmega64"));
        assert!(!env.is_set("arm"));
        assert!(descriptor.cpu.is_harvard());
        assert_eq!(descriptor.cpu.file_tags(), vec!["avr", "harvard", "atmega64"]);
    }
}
