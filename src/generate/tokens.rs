//! @acp:module "Template Tokens"
//! @acp:summary "Build the `$token` table and substitute it into template text"
//! @acp:domain cli
//! @acp:layer logic

use std::collections::BTreeMap;

use tracing::warn;

use super::sources::SourceLists;
use super::templates::TemplateFamily;
use crate::catalog::Catalog;
use crate::parse::Value;
use crate::project::ProjectDescriptor;

/// Upper bound on substitution passes; values never reintroduce tokens
const MAX_PASSES: usize = 8;

/// @acp:summary "Named placeholders and their rendered values"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTable {
    tokens: BTreeMap<String, String>,
}

impl TokenTable {
    pub fn build(
        catalog: &Catalog,
        project: &ProjectDescriptor,
        sources: &SourceLists,
        family: TemplateFamily,
    ) -> Self {
        let pname = project.name.as_str();
        let (prefix, suffix) = project.toolchain.prefix_suffix();
        let mut table = Self::default();

        table.insert("$pname", pname);
        table.insert("$cpuclockfreq", &project.clock_frequency);
        table.insert("$cpuname", &project.cpu.name);
        table.insert("$cpuparameters", &cpu_parameters(pname, &project.cpu.build_parameters));
        table.insert("$prefix", &prefix);
        table.insert("$suffix", &suffix);
        table.insert("$main", &format!("{}/main.c", pname));
        table.insert("$cppasrc", &format_list(sources.cppasrc.iter()));
        table.insert("$cxxsrc", &format_list(sources.cxxsrc.iter()));
        table.insert("$asrc", &format_list(sources.asrc.iter()));

        if family.has_extended_tokens() {
            table.insert("$csrc", &format_list(sources.csrc.iter()));
            table.insert("$pcsrc", &format_list(sources.pcsrc.iter()));
            table.insert("$constants", &module_constants(pname, catalog));
        } else {
            let mut merged = sources.clone();
            merged.merge_program_memory();
            table.insert("$csrc", &format_list(merged.csrc.iter()));
        }
        table
    }

    pub fn insert(&mut self, token: &str, value: &str) {
        self.tokens.insert(token.to_string(), value.to_string());
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }

    /// Replace tokens, longest first, until none is left
    pub fn substitute(&self, text: &str) -> String {
        let mut ordered: Vec<(&String, &String)> = self.tokens.iter().collect();
        ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

        let mut out = text.to_string();
        for _ in 0..MAX_PASSES {
            let mut replaced = false;
            for (token, value) in &ordered {
                if out.contains(token.as_str()) {
                    out = out.replace(token.as_str(), value);
                    replaced = true;
                }
            }
            if !replaced {
                return out;
            }
        }
        warn!("Token substitution did not settle after {} passes", MAX_PASSES);
        out
    }
}

/// Sorted, one per line, each line continued with a backslash
pub fn format_list<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let mut items: Vec<&String> = items.collect();
    if items.is_empty() {
        return String::new();
    }
    items.sort();
    items.dedup();
    let joined: Vec<&str> = items.iter().map(|s| s.as_str()).collect();
    format!("{} \\", joined.join(" \\\n\t"))
}

/// `MK_*` build variables renamed after the project
fn cpu_parameters(pname: &str, params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix("MK_")
                .map(|rest| format!("{}_{} = {}", pname, rest, value))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Constants of enabled modules, sorted by key
fn module_constants(pname: &str, catalog: &Catalog) -> String {
    let mut constants: BTreeMap<&str, String> = BTreeMap::new();
    for module in catalog.enabled_modules() {
        for (key, value) in &module.constants {
            constants.insert(key.as_str(), constant_text(value));
        }
    }
    constants
        .into_iter()
        .map(|(key, value)| format!("{}_{} = {}", pname, key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn constant_text(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Bool(b) => u8::from(*b).to_string(),
        Value::Tuple(items) => items
            .iter()
            .map(constant_text)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_list() {
        let items = vec!["b.c".to_string(), "a.c".to_string()];
        assert_eq!(format_list(items.iter()), "a.c \\\n\tb.c \\");
        assert_eq!(format_list(std::iter::empty()), "");
    }

    #[test]
    fn test_longest_token_first() {
        let mut table = TokenTable::default();
        table.insert("$cpu", "WRONG");
        table.insert("$cpuparameters", "demo_FOO = 1");
        table.insert("$pname", "demo");
        let text = "$cpuparameters\n$pname_CPU = x\n";
        assert_eq!(table.substitute(text), "demo_FOO = 1\ndemo_CPU = x\n");
    }

    #[test]
    fn test_substitution_is_idempotent() {
        let mut table = TokenTable::default();
        table.insert("$pname", "demo");
        table.insert("$csrc", "bertos/kern/proc.c \\");
        let once = table.substitute("$pname_CSRC = \\\n\t$csrc\nX = $($pname_CSRC)\n");
        assert_eq!(table.substitute(&once), once);
    }

    #[test]
    fn test_cpu_parameters() {
        let mut params = BTreeMap::new();
        params.insert("MK_MCU".to_string(), "atmega64".to_string());
        params.insert("CORE_CPU".to_string(), "ignored".to_string());
        assert_eq!(cpu_parameters("demo", &params), "demo_MCU = atmega64");
    }
}
