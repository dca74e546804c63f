//! @acp:module "Dependency Resolver"
//! @acp:summary "Keep module enablement consistent across select, unselect and parameter edits"
//! @acp:domain cli
//! @acp:layer logic
//!
//! Hard dependencies are applied immediately in both directions. Effects that
//! need a decision from the user are only reported: boolean parameters whose
//! conditional dependency was removed, and pulled-in modules that nothing
//! requires any more.
//!
//! Reported sequences are depth-first in dependency-list order; hard
//! dependencies come before conditional ones, conditional ones follow
//! parameter source order.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, ParamRef, ParamType};
use crate::error::{ForgeError, Result};
use crate::parse::strip_integer_suffix;

/// @acp:summary "Side effects of selecting a module"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectOutcome {
    pub module: String,
    /// Modules enabled as a consequence, excluding `module`
    pub auto_enabled: Vec<String>,
}

/// @acp:summary "Side effects of unselecting a module"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnselectOutcome {
    pub module: String,
    /// Enabled modules that hard-depended on a removed module; already disabled
    pub disabled: Vec<String>,
    /// True boolean parameters gating a removed module; left untouched
    pub unsatisfied_params: Vec<ParamRef>,
    /// Pulled-in modules nothing requires any more; left enabled
    pub orphans: Vec<String>,
}

/// @acp:summary "Result of editing one parameter"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParamChange {
    pub configuration: String,
    pub name: String,
    pub old_value: String,
    pub new_value: String,
    /// Modules enabled because a conditional dependency became active
    pub enabled: Vec<String>,
    /// Modules a deactivated conditional dependency no longer requires; left enabled
    pub released: Vec<String>,
}

impl ParamChange {
    pub fn changed(&self) -> bool {
        self.old_value != self.new_value
    }
}

/// @acp:summary "Mutates a catalog while keeping the module graph consistent"
pub struct DependencyResolver<'a> {
    catalog: &'a mut Catalog,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(catalog: &'a mut Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    /// @acp:summary "Enable a module and everything it needs"
    pub fn select(&mut self, name: &str) -> Result<SelectOutcome> {
        self.catalog.require_module(name)?;
        self.catalog.explicit.insert(name.to_string());

        let mut visited = BTreeSet::new();
        let mut auto_enabled = Vec::new();
        self.enable(name, &mut visited, &mut auto_enabled);

        if !auto_enabled.is_empty() {
            info!("Selecting {} also enabled: {}", name, auto_enabled.join(", "));
        }
        Ok(SelectOutcome {
            module: name.to_string(),
            auto_enabled,
        })
    }

    fn enable(&mut self, name: &str, visited: &mut BTreeSet<String>, affected: &mut Vec<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }
        if let Some(module) = self.catalog.modules.get_mut(name) {
            module.enabled = true;
        }
        self.refresh_contribution(name);

        for dep in self.catalog.effective_dependencies(name) {
            if self.catalog.is_module(&dep) && !self.catalog.is_enabled(&dep) {
                debug!("{} requires {}", name, dep);
                affected.push(dep.clone());
                self.enable(&dep, visited, affected);
            }
        }
    }

    /// Replace a module's bare-file contribution with its current dependencies
    fn refresh_contribution(&mut self, name: &str) {
        let files: Vec<String> = if self.catalog.is_enabled(name) {
            self.catalog
                .effective_dependencies(name)
                .into_iter()
                .filter(|dep| !self.catalog.is_module(dep))
                .collect()
        } else {
            Vec::new()
        };

        let previous = if files.is_empty() {
            self.catalog.contributions.remove(name)
        } else {
            self.catalog.contributions.insert(name.to_string(), files.clone())
        };
        for file in previous.unwrap_or_default() {
            if let Some(count) = self.catalog.file_refs.get_mut(&file) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.catalog.file_refs.remove(&file);
                }
            }
        }
        for file in files {
            *self.catalog.file_refs.entry(file).or_insert(0) += 1;
        }
    }

    /// @acp:summary "Disable a module and every enabled module hard-depending on it"
    pub fn unselect(&mut self, name: &str) -> Result<UnselectOutcome> {
        self.catalog.require_module(name)?;

        // Dependencies of the removed closure, measured before anything changes
        let mut visited = BTreeSet::new();
        let mut disabled = Vec::new();
        let mut candidates = Vec::new();
        self.disable(name, &mut visited, &mut disabled, &mut candidates);

        let mut unsatisfied_params = Vec::new();
        for removed in &visited {
            for gate in self.catalog.conditional_gates(removed) {
                let set = self.catalog.is_enabled(&gate.module)
                    && self
                        .catalog
                        .parameter(&gate.configuration, &gate.name)
                        .is_ok_and(|p| p.is_set());
                if set && !unsatisfied_params.contains(gate) {
                    unsatisfied_params.push(gate.clone());
                }
            }
        }
        unsatisfied_params.sort();

        let orphans = self.orphans_of(candidates);
        if !disabled.is_empty() {
            info!("Unselecting {} also disabled: {}", name, disabled.join(", "));
        }
        Ok(UnselectOutcome {
            module: name.to_string(),
            disabled,
            unsatisfied_params,
            orphans,
        })
    }

    fn disable(
        &mut self,
        name: &str,
        visited: &mut BTreeSet<String>,
        affected: &mut Vec<String>,
        candidates: &mut Vec<String>,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }
        for dep in self.catalog.effective_dependencies(name) {
            if self.catalog.is_module(&dep) && !candidates.contains(&dep) {
                candidates.push(dep);
            }
        }
        if let Some(module) = self.catalog.modules.get_mut(name) {
            module.enabled = false;
        }
        self.catalog.explicit.remove(name);
        self.refresh_contribution(name);

        for dependent in self.catalog.hard_dependents(name).to_vec() {
            if self.catalog.is_enabled(&dependent) {
                debug!("{} loses its dependency {}", dependent, name);
                affected.push(dependent.clone());
                self.disable(&dependent, visited, affected, candidates);
            }
        }
    }

    /// Enabled, non-explicit modules among `candidates` (and their own
    /// dependencies) that no remaining enabled module requires
    fn orphans_of(&self, mut candidates: Vec<String>) -> Vec<String> {
        let mut orphans: Vec<String> = Vec::new();
        let mut released = BTreeSet::new();
        loop {
            let mut changed = false;
            let mut index = 0;
            while index < candidates.len() {
                let name = candidates[index].clone();
                index += 1;
                if released.contains(&name)
                    || !self.catalog.is_enabled(&name)
                    || self.catalog.is_explicit(&name)
                    || self.is_required(&name, &released)
                {
                    continue;
                }
                released.insert(name.clone());
                orphans.push(name.clone());
                for dep in self.catalog.effective_dependencies(&name) {
                    if self.catalog.is_module(&dep) && !candidates.contains(&dep) {
                        candidates.push(dep);
                    }
                }
                changed = true;
            }
            if !changed {
                break;
            }
        }
        orphans
    }

    /// Some enabled module outside `ignoring` needs `name` right now
    fn is_required(&self, name: &str, ignoring: &BTreeSet<String>) -> bool {
        let live = |module: &String| self.catalog.is_enabled(module) && !ignoring.contains(module);
        self.catalog.hard_dependents(name).iter().any(live)
            || self.catalog.conditional_gates(name).iter().any(|gate| {
                live(&gate.module)
                    && self
                        .catalog
                        .parameter(&gate.configuration, &gate.name)
                        .is_ok_and(|p| p.is_set())
            })
    }

    /// Disable each module in turn; used to accept orphan proposals
    pub fn release(&mut self, names: &[String]) -> Result<Vec<UnselectOutcome>> {
        let mut outcomes = Vec::new();
        for name in names {
            // An earlier cascade may already have taken it out
            if self.catalog.is_enabled(name) {
                outcomes.push(self.unselect(name)?);
            }
        }
        Ok(outcomes)
    }

    /// @acp:summary "Validate and store a parameter value, re-evaluating conditional dependencies"
    pub fn set_parameter(&mut self, configuration: &str, name: &str, value: &str) -> Result<ParamChange> {
        let param = self.catalog.parameter(configuration, name)?.clone();
        let invalid = |reason: String| ForgeError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            reason,
        };

        let mut long = param.long;
        let mut unsigned = param.unsigned;
        let new_value = match param.kind {
            ParamType::Autoenabled => {
                return Err(invalid("follows the module's enabled state".to_string()))
            }
            ParamType::Boolean => normalize_bool(value)
                .ok_or_else(|| invalid("expected 0, 1, true or false".to_string()))?,
            ParamType::Integer => {
                let (digits, has_unsigned, has_long) = strip_integer_suffix(value.trim());
                let number = parse_int(&digits).ok_or_else(|| invalid("not an integer".to_string()))?;
                if let Some(min) = param.min.filter(|min| number < *min) {
                    return Err(invalid(format!("below minimum {}", min)));
                }
                if let Some(max) = param.max.filter(|max| number > *max) {
                    return Err(invalid(format!("above maximum {}", max)));
                }
                long |= has_long;
                unsigned |= has_unsigned;
                digits
            }
            ParamType::Enum => {
                let value = value.trim().to_string();
                match param.value_list.as_deref().and_then(|l| self.catalog.list(l)) {
                    Some(list) if !list.contains(&value) => {
                        return Err(invalid(format!("not one of {}", list.values.join(", "))))
                    }
                    Some(_) => {}
                    None => warn!("{}: value list {:?} not found", name, param.value_list),
                }
                value
            }
            ParamType::FreeText => value.trim().to_string(),
        };

        if let Some(stored) = self
            .catalog
            .configurations
            .get_mut(configuration)
            .and_then(|c| c.get_mut(name))
        {
            stored.value = new_value.clone();
            stored.long = long;
            stored.unsigned = unsigned;
        }

        let mut change = ParamChange {
            configuration: configuration.to_string(),
            name: name.to_string(),
            old_value: param.value.clone(),
            new_value: new_value.clone(),
            ..Default::default()
        };
        if param.kind != ParamType::Boolean || param.conditional_deps.is_empty() {
            return Ok(change);
        }

        let was_set = param.is_set();
        let now_set = crate::catalog::types::is_true_literal(&new_value);
        let owners: Vec<String> = self
            .catalog
            .enabled_modules()
            .filter(|m| m.configuration.as_deref() == Some(configuration))
            .map(|m| m.name.clone())
            .collect();
        if owners.is_empty() || was_set == now_set {
            return Ok(change);
        }

        for owner in &owners {
            self.refresh_contribution(owner);
        }
        if now_set {
            let mut visited: BTreeSet<String> = owners.iter().cloned().collect();
            for dep in &param.conditional_deps {
                if self.catalog.is_module(dep) && !self.catalog.is_enabled(dep) {
                    change.enabled.push(dep.clone());
                    self.enable(dep, &mut visited, &mut change.enabled);
                }
            }
        } else {
            let none = BTreeSet::new();
            change.released = param
                .conditional_deps
                .iter()
                .filter(|dep| {
                    self.catalog.is_enabled(dep)
                        && !self.catalog.is_explicit(dep)
                        && !self.is_required(dep, &none)
                })
                .cloned()
                .collect();
        }
        Ok(change)
    }

    /// Set a boolean parameter to false, e.g. after unselect reported it
    pub fn zero_parameter(&mut self, param: &ParamRef) -> Result<ParamChange> {
        self.set_parameter(&param.configuration, &param.name, "0")
    }

    /// Force every autoenabled parameter to mirror its module's state
    pub fn sync_autoenabled(&mut self) -> usize {
        let states: Vec<(String, bool)> = self
            .catalog
            .modules()
            .filter_map(|m| m.configuration.clone().map(|c| (c, m.enabled)))
            .collect();
        let mut updated = 0;
        for (configuration, enabled) in states {
            let Some(conf) = self.catalog.configurations.get_mut(&configuration) else {
                continue;
            };
            let value = if enabled { "1" } else { "0" };
            for param in conf.params.values_mut() {
                if param.kind == ParamType::Autoenabled && param.value != value {
                    param.value = value.to_string();
                    updated += 1;
                }
            }
        }
        updated
    }
}

fn normalize_bool(value: &str) -> Option<String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some("1".to_string()),
        "0" | "false" | "no" | "off" => Some("0".to_string()),
        _ => None,
    }
}

/// Decimal or `0x` hexadecimal, optionally negative
fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}
