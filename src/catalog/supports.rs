//! @acp:module "Capability Gate"
//! @acp:summary "Evaluate module and parameter `supports` expressions against CPU facts"
//! @acp:domain cli
//! @acp:layer logic

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::error::{ForgeError, Result};
use crate::parse::{parse_expression, Environment, Value};

/// @acp:summary "Boolean facts describing the selected CPU"
/// Every known tag is present; only the CPU's own name, tags and toolchain id are true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagEnvironment {
    tags: BTreeMap<String, bool>,
}

impl TagEnvironment {
    /// All `known` tags, each false
    pub fn new<I, S>(known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: known.into_iter().map(|t| (t.into(), false)).collect(),
        }
    }

    /// Known tags plus the facts of one CPU set to true
    pub fn from_facts(known: &[String], cpu_name: &str, cpu_tags: &[String], toolchain_id: &str) -> Self {
        let mut env = Self::new(known.iter().cloned());
        env.set(cpu_name, true);
        for tag in cpu_tags {
            env.set(tag, true);
        }
        if !toolchain_id.is_empty() {
            env.set(toolchain_id, true);
        }
        env
    }

    pub fn set(&mut self, tag: &str, value: bool) {
        self.tags.insert(tag.to_string(), value);
    }

    pub fn is_set(&self, tag: &str) -> bool {
        self.tags.get(tag).copied().unwrap_or(false)
    }

    pub fn tags(&self) -> &BTreeMap<String, bool> {
        &self.tags
    }
}

impl Environment for TagEnvironment {
    fn lookup(&self, ident: &str) -> Option<Value> {
        self.tags.lookup(ident)
    }
}

/// Evaluate a `supports` expression; any failure is a SupportedExpression error
pub fn evaluate_supports(expression: &str, env: &TagEnvironment) -> Result<bool> {
    let to_error = |reason: String| ForgeError::SupportedExpression {
        expression: expression.to_string(),
        reason,
    };
    let parsed = parse_expression(expression).map_err(|e| to_error(e.to_string()))?;
    let value = parsed.eval(env).map_err(|e| to_error(e.to_string()))?;
    Ok(value.truthy())
}

/// Outcome of the capability gate
#[derive(Debug)]
pub struct SupportStatus {
    pub supported: bool,
    /// Evaluation failure; `supported` is then true
    pub error: Option<ForgeError>,
}

impl SupportStatus {
    pub fn supported() -> Self {
        Self {
            supported: true,
            error: None,
        }
    }

    /// Evaluate an optional expression, falling back to supported on error
    pub fn evaluate(expression: Option<&str>, env: &TagEnvironment) -> Self {
        let Some(expression) = expression.filter(|e| !e.trim().is_empty()) else {
            return Self::supported();
        };
        match evaluate_supports(expression, env) {
            Ok(supported) => Self {
                supported,
                error: None,
            },
            Err(e) => {
                warn!("{}; treating as supported", e);
                Self {
                    supported: true,
                    error: Some(e),
                }
            }
        }
    }
}
