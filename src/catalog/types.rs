//! @acp:module "Catalog Types"
//! @acp:summary "Modules, configuration files, parameters and value lists"
//! @acp:domain cli
//! @acp:layer model

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::parse::Value;

/// Which memory a module's sources target on a harvard CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarvardMode {
    /// Compiled for both program and data memory
    Both,
    /// Program memory only
    #[serde(rename = "pgm")]
    Program,
    /// Data memory only
    Data,
}

impl HarvardMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvardMode::Both => "both",
            HarvardMode::Program => "pgm",
            HarvardMode::Data => "data",
        }
    }
}

impl FromStr for HarvardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "both" => Ok(HarvardMode::Both),
            "pgm" | "program" => Ok(HarvardMode::Program),
            "data" => Ok(HarvardMode::Data),
            _ => Err(format!("Unknown harvard mode: {}", s)),
        }
    }
}

impl fmt::Display for HarvardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// @acp:summary "Feature unit that can be enabled or disabled"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// Hard dependencies: module names or bare source file names
    pub depends: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    /// Directory containing the defining file
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hw: Vec<String>,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constants: BTreeMap<String, Value>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harvard: Option<HarvardMode>,
    /// Defining file, relative to the source root
    pub defined_in: PathBuf,
}

/// Effective parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Boolean,
    Enum,
    #[serde(rename = "int")]
    Integer,
    Autoenabled,
    /// No recognised type; edited and rendered as plain text
    #[default]
    #[serde(rename = "text")]
    FreeText,
}

impl ParamType {
    /// Map an explicit `type = "..."` directive
    pub fn from_directive(s: &str) -> Option<Self> {
        match s {
            "boolean" | "bool" => Some(ParamType::Boolean),
            "enum" => Some(ParamType::Enum),
            "int" | "integer" => Some(ParamType::Integer),
            "autoenabled" => Some(ParamType::Autoenabled),
            "text" | "string" => Some(ParamType::FreeText),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Boolean => "boolean",
            ParamType::Enum => "enum",
            ParamType::Integer => "int",
            ParamType::Autoenabled => "autoenabled",
            ParamType::FreeText => "text",
        }
    }
}

/// @acp:summary "Tunable #define in a configuration file"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Source-like value text with integer suffixes removed
    pub value: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default)]
    pub long: bool,
    #[serde(default)]
    pub unsigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_list: Option<String>,
    /// Modules forced on while this boolean is true; inert on other types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditional_deps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports: Option<String>,
    pub brief: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
    /// Byte range of the value text in the configuration source
    #[serde(skip)]
    pub span: Range<usize>,
}

impl Parameter {
    /// Boolean parameter currently holding a non-zero value
    pub fn is_set(&self) -> bool {
        self.kind == ParamType::Boolean && is_true_literal(&self.value)
    }

    /// Conditional dependencies that are active right now
    pub fn active_conditional_deps(&self) -> &[String] {
        if self.is_set() {
            &self.conditional_deps
        } else {
            &[]
        }
    }

    /// Value text as it must appear in the generated file
    pub fn rendered_value(&self) -> String {
        let mut value = self.value.clone();
        if self.kind == ParamType::Integer {
            if self.unsigned {
                value.push('U');
            }
            if self.long {
                value.push('L');
            }
        }
        value
    }
}

pub(crate) fn is_true_literal(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

/// @acp:summary "Parsed configuration file with ordered parameters"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationFile {
    /// Path relative to the source root
    pub path: String,
    /// Parameter names in source order
    pub order: Vec<String>,
    pub params: HashMap<String, Parameter>,
    /// Original text; regeneration splices new values into it
    #[serde(skip)]
    pub source: String,
}

impl ConfigurationFile {
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.get_mut(name)
    }

    /// Parameters in source order
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.order.iter().filter_map(|name| self.params.get(name))
    }

    /// Take values from a previously generated copy of this file
    pub fn merge_values(&mut self, user: &ConfigurationFile) -> usize {
        let mut merged = 0;
        for name in &self.order {
            if let (Some(ours), Some(theirs)) = (self.params.get_mut(name), user.params.get(name)) {
                ours.value = theirs.value.clone();
                if ours.kind == ParamType::Integer {
                    ours.long = theirs.long;
                    ours.unsigned = theirs.unsigned;
                }
                merged += 1;
            }
        }
        merged
    }

    /// Re-derive the file text with current values, everything else untouched
    pub fn render(&self) -> String {
        let mut spans: Vec<(&Range<usize>, String)> = self
            .iter()
            .map(|p| (&p.span, p.rendered_value()))
            .collect();
        spans.sort_by_key(|(span, _)| span.start);

        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for (span, value) in spans {
            if span.start < cursor || span.end > self.source.len() {
                continue;
            }
            out.push_str(&self.source[cursor..span.start]);
            out.push_str(&value);
            cursor = span.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }
}

/// @acp:summary "Named ordered set of tokens referenced by enum parameters"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValueList {
    pub name: String,
    pub values: Vec<String>,
}

impl NamedValueList {
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// Reference to a parameter and the module that binds its configuration file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamRef {
    pub module: String,
    pub configuration: String,
    pub name: String,
}

impl fmt::Display for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.configuration, self.name)
    }
}
