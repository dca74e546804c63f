//! @acp:module "Build Templates"
//! @acp:summary "Template families and the template files each one renders"
//! @acp:domain cli
//! @acp:layer service

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

const CURRENT_MAKEFILE: &str = include_str!("../../templates/current/makefile.tmpl");
const CURRENT_WIZ_MK: &str = include_str!("../../templates/current/wiz.mk.tmpl");
const CURRENT_USER_MK: &str = include_str!("../../templates/current/user.mk.tmpl");
const LEGACY_MAKEFILE: &str = include_str!("../../templates/legacy/makefile.tmpl");
const LEGACY_PROJECT_MK: &str = include_str!("../../templates/legacy/project.mk.tmpl");
const LEGACY_USER_MK: &str = include_str!("../../templates/legacy/user.mk.tmpl");

/// Generation strategy, chosen once from the descriptor's schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFamily {
    /// Schema version 1 and older: single project makefile, reduced tokens
    Legacy,
    /// Schema version 2 onwards
    Current,
}

impl TemplateFamily {
    pub fn for_version(version: u32) -> Self {
        if version <= 1 {
            TemplateFamily::Legacy
        } else {
            TemplateFamily::Current
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateFamily::Legacy => "legacy",
            TemplateFamily::Current => "current",
        }
    }

    /// Program-memory sources and module constants have their own tokens
    pub fn has_extended_tokens(&self) -> bool {
        matches!(self, TemplateFamily::Current)
    }

    /// (template file name, output path for `project`, built-in text, user owned)
    fn entries(&self, project: &str) -> Vec<(&'static str, PathBuf, &'static str, bool)> {
        let in_project = |file: String| Path::new(project).join(file);
        match self {
            TemplateFamily::Current => vec![
                ("makefile.tmpl", PathBuf::from("Makefile"), CURRENT_MAKEFILE, false),
                (
                    "wiz.mk.tmpl",
                    in_project(format!("{}_wiz.mk", project)),
                    CURRENT_WIZ_MK,
                    false,
                ),
                (
                    "user.mk.tmpl",
                    in_project(format!("{}_user.mk", project)),
                    CURRENT_USER_MK,
                    true,
                ),
            ],
            TemplateFamily::Legacy => vec![
                ("makefile.tmpl", PathBuf::from("Makefile"), LEGACY_MAKEFILE, false),
                (
                    "project.mk.tmpl",
                    in_project(format!("{}.mk", project)),
                    LEGACY_PROJECT_MK,
                    false,
                ),
                (
                    "user.mk.tmpl",
                    in_project(format!("{}_user.mk", project)),
                    LEGACY_USER_MK,
                    true,
                ),
            ],
        }
    }
}

impl FromStr for TemplateFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "legacy" => Ok(TemplateFamily::Legacy),
            "current" => Ok(TemplateFamily::Current),
            _ => Err(format!("Unknown template family: {}", s)),
        }
    }
}

impl fmt::Display for TemplateFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One build script template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    /// Output path relative to the project directory
    pub output: PathBuf,
    pub text: String,
    /// Written when missing, never overwritten
    pub user_owned: bool,
}

/// @acp:summary "Templates of one family, built in or read from a directory"
#[derive(Debug, Clone)]
pub struct TemplateSet {
    family: TemplateFamily,
    templates: Vec<Template>,
}

impl TemplateSet {
    pub fn builtin(family: TemplateFamily, project: &str) -> Self {
        let templates = family
            .entries(project)
            .into_iter()
            .map(|(name, output, text, user_owned)| Template {
                name: name.to_string(),
                output,
                text: text.to_string(),
                user_owned,
            })
            .collect();
        Self { family, templates }
    }

    /// Read every template of the family from `dir`; each must exist
    pub fn from_dir(family: TemplateFamily, project: &str, dir: &Path) -> Result<Self> {
        let mut templates = Vec::new();
        for (name, output, _, user_owned) in family.entries(project) {
            let path = dir.join(family.as_str()).join(name);
            let path = if path.is_file() { path } else { dir.join(name) };
            if !path.is_file() {
                return Err(ForgeError::MissingTemplate(path));
            }
            templates.push(Template {
                name: name.to_string(),
                output,
                text: std::fs::read_to_string(&path)?,
                user_owned,
            });
        }
        Ok(Self { family, templates })
    }

    /// Built-in templates unless a template directory is configured
    pub fn load(family: TemplateFamily, project: &str, dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::from_dir(family, project, dir),
            None => Ok(Self::builtin(family, project)),
        }
    }

    pub fn family(&self) -> TemplateFamily {
        self.family
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }
}
