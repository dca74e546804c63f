//! @acp:module "Comment Extraction"
//! @acp:summary "Isolate documentation comments and documented #define statements"
//! @acp:domain cli
//! @acp:layer parser
//!
//! Two extraction modes:
//! - `doc_blocks` returns every `/** … */` block as stripped lines (module and
//!   value-list directives live there).
//! - `define_blocks` pairs each `#define NAME VALUE` with the doc comment that
//!   documents it: a `/** … */` block or `///` line right before it, or a
//!   trailing `///<` comment.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// `/** ... */` blocks
static DOC_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*\*\s*([^*]*\*+(?:[^/*][^*]*\*+)*)/").unwrap());

/// Doc block immediately followed by a define
static BLOCK_DEFINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?mR)/\*\*\s*([^*]*\*+(?:[^/*][^*]*\*+)*)/\s*#define[ \t]+(\w+)[ \t]+([^\n]*?)[ \t]*(?://[^\n]*)?$",
    )
    .unwrap()
});

/// `///` line directly above a define
static LINE_DEFINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?mR)^[ \t]*///[ \t]*([^<\n][^\n]*?)[ \t]*\r?\n[ \t]*#define[ \t]+(\w+)[ \t]+([^\n]*?)[ \t]*(?://[^\n]*)?$",
    )
    .unwrap()
});

/// Define with a trailing `///<` comment
static TRAILING_DEFINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mR)^[ \t]*#define[ \t]+(\w+)[ \t]+([^\n]*?)[ \t]*///<[ \t]*([^\n]*?)[ \t]*$")
        .unwrap()
});

/// A define paired with its documentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineBlock {
    /// Stripped comment lines
    pub comment: Vec<String>,
    pub name: String,
    /// Value text, excluding any trailing line comment
    pub value: String,
    /// Byte range of `value` in the source text
    pub value_span: Range<usize>,
    /// Byte offset where the documented block starts
    pub start: usize,
}

/// Extract every `/** */` block, each as its list of stripped lines
pub fn doc_blocks(text: &str) -> Vec<Vec<String>> {
    DOC_BLOCK
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|body| strip_block(body.as_str()))
        .collect()
}

/// Extract documented defines in source order
pub fn define_blocks(text: &str) -> Vec<DefineBlock> {
    let mut blocks = Vec::new();

    for cap in BLOCK_DEFINE.captures_iter(text) {
        let (Some(whole), Some(body), Some(name), Some(value)) =
            (cap.get(0), cap.get(1), cap.get(2), cap.get(3))
        else {
            continue;
        };
        blocks.push(DefineBlock {
            comment: strip_block(body.as_str()),
            name: name.as_str().to_string(),
            value: value.as_str().to_string(),
            value_span: value.range(),
            start: whole.start(),
        });
    }

    for cap in LINE_DEFINE.captures_iter(text) {
        let (Some(whole), Some(comment), Some(name), Some(value)) =
            (cap.get(0), cap.get(1), cap.get(2), cap.get(3))
        else {
            continue;
        };
        blocks.push(DefineBlock {
            comment: vec![comment.as_str().trim().to_string()],
            name: name.as_str().to_string(),
            value: value.as_str().to_string(),
            value_span: value.range(),
            start: whole.start(),
        });
    }

    for cap in TRAILING_DEFINE.captures_iter(text) {
        let (Some(whole), Some(name), Some(value), Some(comment)) =
            (cap.get(0), cap.get(1), cap.get(2), cap.get(3))
        else {
            continue;
        };
        blocks.push(DefineBlock {
            comment: vec![comment.as_str().trim().to_string()],
            name: name.as_str().to_string(),
            value: value.as_str().to_string(),
            value_span: value.range(),
            start: whole.start(),
        });
    }

    // A define documented in more than one style is kept once, first style wins
    blocks.sort_by_key(|b| b.value_span.start);
    blocks.dedup_by_key(|b| b.value_span.start);
    blocks.sort_by_key(|b| b.start);
    blocks
}

/// Remove comment leaders from a block body (the text between `/**` and `/`)
fn strip_block(body: &str) -> Vec<String> {
    let mut lines: Vec<String> = body
        .trim_end_matches('*')
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim().to_string())
        .collect();

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}
