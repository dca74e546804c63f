//! @acp:module "Configuration File Parser"
//! @acp:summary "Build the ordered parameter table of a configuration header"
//! @acp:domain cli
//! @acp:layer parser

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::comment::define_blocks;
use super::directive::{parse_parameter_comment, DirectiveError};
use crate::catalog::{ConfigurationFile, ParamType, Parameter};

/// Bare non-negative literal with optional U/L suffixes
static INTEGER_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+U?L?$").unwrap());

/// @acp:summary "Parse a configuration file into its parameter table"
/// Every documented `#define` becomes a parameter, in source order.
pub fn parse_configuration(path: &str, text: &str) -> Result<ConfigurationFile, DirectiveError> {
    let mut order = Vec::new();
    let mut params = HashMap::new();

    for block in define_blocks(text) {
        if params.contains_key(&block.name) {
            debug!("{}: duplicate define {} ignored", path, block.name);
            continue;
        }
        let comment = parse_parameter_comment(&block.comment)?;
        let directives = comment.directives;

        let explicit = directives.kind.as_deref().and_then(|k| {
            let kind = ParamType::from_directive(k);
            if kind.is_none() {
                warn!("{}: unknown type '{}' for {}, inferring", path, k, block.name);
            }
            kind
        });
        let kind = explicit.unwrap_or_else(|| {
            infer_type(
                &block.value,
                directives.value_list.is_some(),
                directives.min.is_some() || directives.max.is_some(),
            )
        });

        let mut value = block.value.clone();
        let mut long = directives.long;
        let mut unsigned = directives.unsigned;
        if kind == ParamType::Integer {
            let (stripped, has_unsigned, has_long) = strip_integer_suffix(&value);
            value = stripped;
            unsigned |= has_unsigned;
            long |= has_long;
        }

        order.push(block.name.clone());
        params.insert(
            block.name.clone(),
            Parameter {
                name: block.name,
                value,
                kind,
                min: directives.min,
                max: directives.max,
                long,
                unsigned,
                value_list: directives.value_list,
                conditional_deps: directives.conditional_deps,
                supports: directives.supports,
                brief: comment.brief,
                description: comment.description,
                extra: directives.extra,
                span: block.value_span,
            },
        );
    }

    Ok(ConfigurationFile {
        path: path.to_string(),
        order,
        params,
        source: text.to_string(),
    })
}

/// Value-list beats integer shape; anything unrecognised stays free text
pub fn infer_type(value: &str, has_value_list: bool, has_bounds: bool) -> ParamType {
    if has_value_list {
        ParamType::Enum
    } else if has_bounds || INTEGER_LITERAL.is_match(value.trim()) {
        ParamType::Integer
    } else {
        ParamType::FreeText
    }
}

/// Remove trailing `U`/`L` suffixes: (digits, unsigned, long)
pub fn strip_integer_suffix(value: &str) -> (String, bool, bool) {
    let mut rest = value.trim_end();
    let mut unsigned = false;
    let mut long = false;
    loop {
        if rest.len() > 1 && rest.ends_with('L') {
            long = true;
            rest = &rest[..rest.len() - 1];
        } else if rest.len() > 1 && rest.ends_with('U') {
            unsigned = true;
            rest = &rest[..rest.len() - 1];
        } else {
            break;
        }
    }
    // Identifiers such as FOO_LEVEL are not literals with a suffix
    if !rest.chars().last().is_some_and(|c| c.is_ascii_hexdigit()) || !looks_numeric(rest) {
        return (value.to_string(), false, false);
    }
    (rest.to_string(), unsigned, long)
}

fn looks_numeric(s: &str) -> bool {
    let s = s.trim_start_matches(['-', '(']);
    s.starts_with(|c: char| c.is_ascii_digit())
}
