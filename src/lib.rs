#![forbid(unsafe_code)]

//! @acp:module "modforge Library"
//! @acp:summary "Module-aware configurator for embedded C source trees"
//! @acp:domain cli
//! @acp:layer api
//! @acp:stability stable
//!
//! # modforge
//!
//! Scans a source tree whose headers describe modules and their tunables in
//! `$WIZ$` comments, keeps module selection consistent with the dependency
//! graph, and writes per-project configuration headers and makefiles.
//!
//! ## Features
//!
//! - **Directive Parsing**: Module, parameter and value-list directives with a small expression grammar
//! - **Dependency Resolution**: Hard and conditional dependencies, cascading disables, orphan reports
//! - **Byte-faithful Headers**: Only parameter values change in regenerated configuration files
//! - **Template Families**: Legacy and current makefile layouts chosen by descriptor version
//!
//! ## Example
//!
//! ```rust,no_run
//! use modforge::{ArtifactGenerator, CatalogLoader, Config, DependencyResolver, ProjectDescriptor, TemplateSet};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let project = ProjectDescriptor::open("project.modforge.json")?;
//!     let mut catalog = CatalogLoader::new(&config).load(&project.source_root)?;
//!
//!     // Pull in the kernel and everything it needs
//!     DependencyResolver::new(&mut catalog).select("kernel")?;
//!
//!     let templates = TemplateSet::load(project.template_family(), &project.name, None)?;
//!     ArtifactGenerator::new(&project, templates).generate(&catalog)?;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod generate;
pub mod parse;
pub mod project;
pub mod resolve;

// Re-exports
pub use catalog::{
    Catalog, CatalogLoader, ConfigurationFile, FileIndex, HarvardMode, Module, NamedValueList,
    ParamRef, ParamType, Parameter, SupportStatus, TagEnvironment,
};
pub use config::Config;
pub use error::{ForgeError, Result};
pub use generate::{ArtifactGenerator, RenderedFile, SourceLists, TemplateFamily, TemplateSet};
pub use parse::{parse_configuration, parse_module_block, Expr, Value};
pub use project::{CpuInfo, ProjectDescriptor, Toolchain};
pub use resolve::{DependencyResolver, ParamChange, SelectOutcome, UnselectOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
