//! @acp:module "Configuration"
//! @acp:summary "Tool configuration loading and defaults"
//! @acp:domain cli
//! @acp:layer config

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the tool configuration
pub const CONFIG_FILE: &str = ".modforge.config.json";

/// @acp:summary "Main modforge configuration structure"
/// @acp:lock normal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Files scanned for module and value-list directives (glob syntax)
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Files never scanned (glob syntax)
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Directory whose files override the built-in build templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,

    /// Output layout inside a project directory
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: default_exclude(),
            template_dir: None,
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// @acp:summary "Load config from a file"
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// @acp:summary "Save config to a file"
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory receiving generated configuration headers
    pub fn config_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.output.config_dir)
    }
}

/// @acp:summary "Where generated artifacts land"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Configuration headers subdirectory
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
        }
    }
}

fn default_include() -> Vec<String> {
    vec![
        "**/*.h".to_string(),
        "**/*.c".to_string(),
        "**/*.s".to_string(),
        "**/*.S".to_string(),
    ]
}

fn default_exclude() -> Vec<String> {
    vec![
        // Version control
        "**/.git/**".to_string(),
        "**/.svn/**".to_string(),
        // Build outputs
        "**/build/**".to_string(),
        "**/obj/**".to_string(),
    ]
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("cfg")
}
