//! @acp:module "Errors"
//! @acp:summary "Error types for parsing, catalog construction and generation"
//! @acp:domain cli
//! @acp:layer model

use std::path::PathBuf;

use thiserror::Error;

use crate::parse::DirectiveError;

/// @acp:summary "Library error type"
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed directive in the first comment block of a module file
    #[error("module definition error in {path} (line {line} of block): {text}")]
    ModuleDefinition {
        path: PathBuf,
        line: usize,
        text: String,
    },

    /// Malformed value-list directive
    #[error("enum definition error in {path} (line {line} of block): {text}")]
    EnumDefinition {
        path: PathBuf,
        line: usize,
        text: String,
    },

    /// Malformed parameter directive in a configuration file
    #[error("configuration parameter error in {path} (line {line} of block): {text}")]
    ConfigurationDefinition {
        path: PathBuf,
        line: usize,
        text: String,
    },

    /// A `supports` expression could not be evaluated against the tag environment
    #[error("cannot evaluate supports expression '{expression}': {reason}")]
    SupportedExpression { expression: String, reason: String },

    #[error("source root not found: {0}")]
    MissingSourceRoot(PathBuf),

    #[error("toolchain not found: {0}")]
    MissingToolchain(PathBuf),

    #[error("template not found: {0}")]
    MissingTemplate(PathBuf),

    #[error("cannot write {path}: {source}")]
    Generation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("unknown configuration file: {0}")]
    UnknownConfiguration(String),

    #[error("unknown parameter {name} in {configuration}")]
    UnknownParameter { configuration: String, name: String },

    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

impl ForgeError {
    pub fn module_definition(path: impl Into<PathBuf>, err: DirectiveError) -> Self {
        ForgeError::ModuleDefinition {
            path: path.into(),
            line: err.line,
            text: err.text,
        }
    }

    pub fn enum_definition(path: impl Into<PathBuf>, err: DirectiveError) -> Self {
        ForgeError::EnumDefinition {
            path: path.into(),
            line: err.line,
            text: err.text,
        }
    }

    pub fn configuration_definition(path: impl Into<PathBuf>, err: DirectiveError) -> Self {
        ForgeError::ConfigurationDefinition {
            path: path.into(),
            line: err.line,
            text: err.text,
        }
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;
