//! @acp:module "Directive Parser"
//! @acp:summary "Evaluate $WIZ$ directives into module, value-list and parameter records"
//! @acp:domain cli
//! @acp:layer parser

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::expr::{evaluate_assignments, Value};
use crate::catalog::HarvardMode;

/// Marker introducing a directive assignment list
pub const MARKER: &str = "$WIZ$";

/// Marker introducing a module's short description
pub const BRIEF_MARKER: &str = "\\brief";

/// @acp:summary "Malformed directive assignment"
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {text} ({reason})")]
pub struct DirectiveError {
    /// 0-based line index within the comment block
    pub line: usize,
    /// Offending text, starting at the marker
    pub text: String,
    pub reason: String,
}

impl DirectiveError {
    fn new(line: usize, text: &str, err: impl fmt::Display) -> Self {
        Self {
            line,
            text: text.trim().to_string(),
            reason: err.to_string(),
        }
    }
}

/// @acp:summary "Module declared in the first doc block of a file"
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub name: String,
    pub depends: Vec<String>,
    pub configuration: Option<String>,
    pub hw: Vec<String>,
    pub supports: Option<String>,
    pub harvard: Option<HarvardMode>,
    pub description: String,
    /// Every other key assigned in the block
    pub constants: BTreeMap<String, Value>,
}

impl ModuleDefinition {
    /// Render back into directive lines, one key per line
    pub fn to_directive_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.description.is_empty() {
            lines.push(format!("{} {}", BRIEF_MARKER, self.description));
        }
        let mut push = |key: &str, value: Value| {
            lines.push(format!("{} {} = {}", MARKER, key, value));
        };
        push("module_name", Value::Str(self.name.clone()));
        if !self.depends.is_empty() {
            push("module_depends", string_tuple(&self.depends));
        }
        if let Some(conf) = &self.configuration {
            push("module_configuration", Value::Str(conf.clone()));
        }
        if !self.hw.is_empty() {
            push("module_hw", string_tuple(&self.hw));
        }
        if let Some(supports) = &self.supports {
            push("module_supports", Value::Str(supports.clone()));
        }
        if let Some(harvard) = self.harvard {
            push("module_harvard", Value::Str(harvard.as_str().to_string()));
        }
        for (key, value) in &self.constants {
            push(key, value.clone());
        }
        lines
    }
}

fn string_tuple(items: &[String]) -> Value {
    Value::Tuple(items.iter().cloned().map(Value::Str).collect())
}

/// Result of parsing a file's first doc block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleBlock {
    pub module: Option<ModuleDefinition>,
    /// The block carried directives, so later blocks may declare value lists
    pub has_directives: bool,
}

/// @acp:summary "Per-parameter directive metadata"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDirectives {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_list: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditional_deps: Vec<String>,
    #[serde(default)]
    pub long: bool,
    #[serde(default)]
    pub unsigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports: Option<String>,
    /// Keys this parser does not interpret
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

/// Documentation of one configuration parameter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterComment {
    pub brief: String,
    pub description: String,
    pub directives: ParameterDirectives,
}

/// Split a line at the directive marker: (text before, assignment list after)
pub fn split_directive(line: &str) -> Option<(&str, &str)> {
    line.find(MARKER)
        .map(|idx| (&line[..idx], line[idx + MARKER.len()..].trim()))
}

fn evaluate_line(index: usize, line: &str) -> Result<Vec<(String, Value)>, DirectiveError> {
    let (_, assignments) = split_directive(line).unwrap_or(("", line));
    evaluate_assignments(assignments).map_err(|e| {
        let marker_at = line.find(MARKER).unwrap_or(0);
        DirectiveError::new(index, &line[marker_at..], e)
    })
}

fn expect_str(index: usize, line: &str, key: &str, value: Value) -> Result<String, DirectiveError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(DirectiveError::new(
            index,
            line,
            format!("{} must be a string, got {}", key, other),
        )),
    }
}

fn expect_list(
    index: usize,
    line: &str,
    key: &str,
    value: Value,
) -> Result<Vec<String>, DirectiveError> {
    value.to_string_list().ok_or_else(|| {
        DirectiveError::new(
            index,
            line,
            format!("{} must be a string or a tuple of strings", key),
        )
    })
}

/// Parse the first doc block of a file into an optional module declaration
pub fn parse_module_block(block: &[String]) -> Result<ModuleBlock, DirectiveError> {
    let mut has_directives = false;
    let mut assigned: Vec<(usize, String, Value)> = Vec::new();
    let mut description = String::new();

    for (index, line) in block.iter().enumerate() {
        if split_directive(line).is_some() {
            has_directives = true;
            for (key, value) in evaluate_line(index, line)? {
                assigned.push((index, key, value));
            }
        } else if let Some(pos) = line.find(BRIEF_MARKER) {
            description = line[pos + BRIEF_MARKER.len()..].trim().to_string();
        }
    }

    if !assigned.iter().any(|(_, key, _)| key == "module_name") {
        return Ok(ModuleBlock {
            module: None,
            has_directives,
        });
    }

    let mut module = ModuleDefinition {
        description,
        ..Default::default()
    };
    for (index, key, value) in assigned {
        let line = block[index].as_str();
        match key.as_str() {
            "module_name" => module.name = expect_str(index, line, &key, value)?,
            "module_depends" => module.depends = expect_list(index, line, &key, value)?,
            "module_configuration" => {
                let conf = expect_str(index, line, &key, value)?;
                module.configuration = (!conf.is_empty()).then_some(conf);
            }
            "module_hw" => module.hw = expect_list(index, line, &key, value)?,
            "module_supports" => module.supports = Some(expect_str(index, line, &key, value)?),
            "module_harvard" => {
                let mode = expect_str(index, line, &key, value)?;
                module.harvard = Some(
                    mode.parse()
                        .map_err(|e: String| DirectiveError::new(index, line, e))?,
                );
            }
            _ => {
                module.constants.insert(key, value);
            }
        }
    }

    Ok(ModuleBlock {
        module: Some(module),
        has_directives,
    })
}

/// Collect `name = ("A", "B")` value lists from doc blocks
pub fn parse_value_lists(
    blocks: &[Vec<String>],
) -> Result<BTreeMap<String, Vec<String>>, DirectiveError> {
    let mut lists = BTreeMap::new();
    for block in blocks {
        for (index, line) in block.iter().enumerate() {
            if split_directive(line).is_none() {
                continue;
            }
            for (key, value) in evaluate_line(index, line)? {
                let items = expect_list(index, line, &key, value)?;
                lists.insert(key, items);
            }
        }
    }
    Ok(lists)
}

/// Parse the comment documenting one `#define`
pub fn parse_parameter_comment(comment: &[String]) -> Result<ParameterComment, DirectiveError> {
    let mut brief = String::new();
    let mut description = String::new();
    let mut directives = ParameterDirectives::default();

    for (index, line) in comment.iter().enumerate() {
        let text = match split_directive(line) {
            Some((before, _)) => before,
            None => line.as_str(),
        };
        if brief.is_empty() {
            brief = text.trim().to_string();
        } else if !text.trim().is_empty() {
            if !description.is_empty() {
                description.push(' ');
            }
            description.push_str(text.trim());
        }

        if split_directive(line).is_none() {
            continue;
        }
        for (key, value) in evaluate_line(index, line)? {
            match key.as_str() {
                "type" => directives.kind = Some(expect_str(index, line, &key, value)?),
                "min" => directives.min = Some(expect_int(index, line, &key, &value)?),
                "max" => directives.max = Some(expect_int(index, line, &key, &value)?),
                "value_list" => directives.value_list = Some(expect_str(index, line, &key, value)?),
                // Anything that is not a string or tuple degrades to "no dependencies"
                "conditional_deps" => {
                    directives.conditional_deps = value.to_string_list().unwrap_or_default()
                }
                "long" => directives.long = value.truthy(),
                "unsigned" => directives.unsigned = value.truthy(),
                "supports" => directives.supports = Some(expect_str(index, line, &key, value)?),
                _ => {
                    directives.extra.insert(key, value);
                }
            }
        }
    }

    Ok(ParameterComment {
        brief,
        description,
        directives,
    })
}

fn expect_int(index: usize, line: &str, key: &str, value: &Value) -> Result<i64, DirectiveError> {
    value.as_int().ok_or_else(|| {
        DirectiveError::new(index, line, format!("{} must be an integer, got {}", key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_module_block() {
        let block = lines(&[
            "\\brief Serial driver",
            "",
            "$WIZ$ module_name = \"ser\"",
            "$WIZ$ module_depends = \"timer\"",
            "$WIZ$ module_configuration = \"bertos/cfg/cfg_ser.h\"",
            "$WIZ$ module_hw = \"bertos/hw/hw_ser.c\", \"bertos/hw/hw_ser.h\"",
            "$WIZ$ module_supports = \"not atmega103\"; module_harvard = \"both\"",
            "$WIZ$ ser_default_speed = 115200",
        ]);
        let parsed = parse_module_block(&block).unwrap();
        assert!(parsed.has_directives);

        let module = parsed.module.unwrap();
        assert_eq!(module.name, "ser");
        assert_eq!(module.depends, vec!["timer".to_string()]);
        assert_eq!(module.configuration.as_deref(), Some("bertos/cfg/cfg_ser.h"));
        assert_eq!(module.hw.len(), 2);
        assert_eq!(module.supports.as_deref(), Some("not atmega103"));
        assert_eq!(module.harvard, Some(HarvardMode::Both));
        assert_eq!(module.description, "Serial driver");
        assert_eq!(
            module.constants.get("ser_default_speed"),
            Some(&Value::Int(115200))
        );
    }

    #[test]
    fn test_block_without_module_name() {
        let block = lines(&["$WIZ$ ports = \"A\", \"B\""]);
        let parsed = parse_module_block(&block).unwrap();
        assert!(parsed.module.is_none());
        assert!(parsed.has_directives);

        let parsed = parse_module_block(&lines(&["Just a comment"])).unwrap();
        assert!(!parsed.has_directives);
    }

    #[test]
    fn test_parse_error_carries_line() {
        let block = lines(&["\\brief X", "$WIZ$ module_name = \"x\"", "$WIZ$ module_depends = (\"a\""]);
        let err = parse_module_block(&block).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.text, "$WIZ$ module_depends = (\"a\"");
    }

    #[test]
    fn test_directive_lines_round_trip_any_key_order() {
        let block = lines(&[
            "$WIZ$ module_harvard = \"pgm\"",
            "$WIZ$ extra_flag = True",
            "$WIZ$ module_depends = (\"b\", \"a\")",
            "$WIZ$ module_name = \"m\"",
        ]);
        let first = parse_module_block(&block).unwrap().module.unwrap();
        let second = parse_module_block(&first.to_directive_lines())
            .unwrap()
            .module
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_value_lists_promote_single_string() {
        let blocks = vec![
            lines(&["$WIZ$ ser_ports = \"SER_UART0\", \"SER_UART1\""]),
            lines(&["Not a directive", "$WIZ$ kbd_mode = \"KBD_POLL\""]),
        ];
        let lists = parse_value_lists(&blocks).unwrap();
        assert_eq!(lists["ser_ports"], vec!["SER_UART0", "SER_UART1"]);
        assert_eq!(lists["kbd_mode"], vec!["KBD_POLL"]);
    }

    #[test]
    fn test_parameter_comment() {
        let comment = lines(&[
            "Maximum number of processes.",
            "Extended text $WIZ$ type = \"int\"; min = 0; max = 255",
            "continues here.",
        ]);
        let parsed = parse_parameter_comment(&comment).unwrap();
        assert_eq!(parsed.brief, "Maximum number of processes.");
        assert_eq!(parsed.description, "Extended text continues here.");
        assert_eq!(parsed.directives.kind.as_deref(), Some("int"));
        assert_eq!(parsed.directives.min, Some(0));
        assert_eq!(parsed.directives.max, Some(255));
    }

    #[test]
    fn test_conditional_deps_single_string() {
        let comment = lines(&["Use foo $WIZ$ type = \"boolean\"; conditional_deps = \"bar\""]);
        let parsed = parse_parameter_comment(&comment).unwrap();
        assert_eq!(parsed.directives.conditional_deps, vec!["bar".to_string()]);
    }
}
