//! @acp:module "Parser"
//! @acp:summary "Comment extraction, $WIZ$ directives and configuration headers"
//! @acp:domain cli
//! @acp:layer service
//!
//! Everything the configurator knows about a source tree comes out of
//! comments. Module files declare themselves in their first `/** */` block,
//! later blocks may declare value lists, and configuration headers document
//! each tunable `#define` with a comment holding a brief, a description and
//! optional directives.
//!
//! Directive values use a restricted literal grammar (see [`expr`]); nothing
//! here executes code found in the scanned tree.

pub mod comment;
pub mod define;
pub mod directive;
pub mod expr;

pub use comment::{define_blocks, doc_blocks, DefineBlock};
pub use define::{infer_type, parse_configuration, strip_integer_suffix};
pub use directive::{
    parse_module_block, parse_parameter_comment, parse_value_lists, split_directive,
    DirectiveError, ModuleBlock, ModuleDefinition, ParameterComment, ParameterDirectives,
    BRIEF_MARKER, MARKER,
};
pub use expr::{
    evaluate_assignments, parse_assignments, parse_expression, EmptyEnvironment, Environment,
    Expr, ExprError, Value,
};
