//! Per-language symbol and dependency extraction.
//!
//! Each language module walks a tree-sitter concrete-syntax tree for one
//! file and emits `(symbols, edges)` facts. Walkers are pure: same input,
//! same output; no filesystem access; no global state. A failed or partial
//! parse yields whatever facts were extractable, never an error.
//!
//! Shared conventions across walkers:
//! - emitted locations use 1-based lines and 0-based columns;
//! - canonical IDs are built from the 0-based start row of the defining node;
//! - `parent` is the NAME of the lexically enclosing symbol, resolved to an
//!   ID by the extractor;
//! - import edges carry `from = filepath` and `to = raw specifier`.

pub mod c;
pub mod cpp;
pub mod detect;
pub mod go;
pub mod java;
pub mod pool;
pub mod python;
pub mod rust;
pub mod typescript;

pub use detect::Language;

use serde::{Deserialize, Serialize};

use crate::model::Span;

/// Kind of symbol extracted from source code.
///
/// Language-agnostic kinds mapped from per-language syntax: a Rust struct,
/// Python class, and Java class all record as `Class`; a Rust trait and Java
/// interface as `Interface`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Interface,
    Type,
    Enum,
    Function,
    Method,
    Constructor,
    Variable,
    Constant,
    Property,
    Module,
    Namespace,
}

impl SymbolKind {
    /// Normalized string key used in store index sets and CLI/JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Enum => "enum",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Property => "property",
            SymbolKind::Module => "module",
            SymbolKind::Namespace => "namespace",
        }
    }

    /// Parse a normalized key back into a kind (case-insensitive).
    pub fn parse(s: &str) -> Option<SymbolKind> {
        match s.to_ascii_lowercase().as_str() {
            "class" | "struct" => Some(SymbolKind::Class),
            "interface" | "trait" => Some(SymbolKind::Interface),
            "type" => Some(SymbolKind::Type),
            "enum" => Some(SymbolKind::Enum),
            "function" | "fn" => Some(SymbolKind::Function),
            "method" => Some(SymbolKind::Method),
            "constructor" => Some(SymbolKind::Constructor),
            "variable" | "var" => Some(SymbolKind::Variable),
            "constant" | "const" => Some(SymbolKind::Constant),
            "property" | "field" => Some(SymbolKind::Property),
            "module" | "mod" => Some(SymbolKind::Module),
            "namespace" | "ns" => Some(SymbolKind::Namespace),
            _ => None,
        }
    }
}

/// Kind of dependency edge between two symbols (or a file and a specifier,
/// for `Imports`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Imports,
    Extends,
    Implements,
    Calls,
    Uses,
    Instantiates,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Imports => "imports",
            EdgeKind::Extends => "extends",
            EdgeKind::Implements => "implements",
            EdgeKind::Calls => "calls",
            EdgeKind::Uses => "uses",
            EdgeKind::Instantiates => "instantiates",
        }
    }

    pub fn parse(s: &str) -> Option<EdgeKind> {
        match s.to_ascii_lowercase().as_str() {
            "imports" => Some(EdgeKind::Imports),
            "extends" => Some(EdgeKind::Extends),
            "implements" => Some(EdgeKind::Implements),
            "calls" => Some(EdgeKind::Calls),
            "uses" => Some(EdgeKind::Uses),
            "instantiates" => Some(EdgeKind::Instantiates),
            _ => None,
        }
    }

    /// Traversal priority for path search: structural edges before textual
    /// ones. Lower sorts first.
    pub fn priority(&self) -> u8 {
        match self {
            EdgeKind::Imports => 0,
            EdgeKind::Extends => 1,
            EdgeKind::Implements => 2,
            EdgeKind::Instantiates => 3,
            EdgeKind::Calls => 4,
            EdgeKind::Uses => 5,
        }
    }
}

/// A symbol fact as emitted by a language walker.
///
/// Pure data. The extractor assigns the canonical ID and resolves `parent`
/// from a name to an ID.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// 0-based start row of the defining node; feeds the canonical ID.
    pub start_row: usize,
    pub location: Span,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    /// Name of the lexically enclosing symbol, if any.
    pub parent: Option<String>,
    pub exported: bool,
}

/// A dependency fact as emitted by a language walker.
///
/// For `Imports`, `from` is the filepath and `to` the raw specifier; for all
/// other kinds the endpoints are bare symbol names local to the file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub location: Option<Span>,
}

/// Everything a walker extracted from one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileFacts {
    pub symbols: Vec<RawSymbol>,
    pub edges: Vec<RawEdge>,
}

/// Route a file to its walker and extract facts.
///
/// Never fails: a grammar error or unparsable file yields empty facts.
pub fn parse_source(language: Language, filepath: &str, source: &[u8]) -> FileFacts {
    match language {
        Language::TypeScript | Language::JavaScript => {
            typescript::extract(filepath, source, language)
        }
        Language::Python => python::extract(filepath, source),
        Language::Go => go::extract(filepath, source),
        Language::Rust => rust::extract(filepath, source),
        Language::Java => java::extract(filepath, source),
        Language::C => c::extract(filepath, source),
        Language::Cpp => cpp::extract(filepath, source),
    }
}

// ---------------------------------------------------------------------------
// Shared walker helpers
// ---------------------------------------------------------------------------

/// Bounds-checked byte slice. Malformed trees can report ranges past the
/// buffer end; never panic on them.
pub(crate) fn safe_slice(source: &[u8], start: usize, end: usize) -> Option<&[u8]> {
    if start > end || end > source.len() {
        return None;
    }
    Some(&source[start..end])
}

/// UTF-8 text of a node, or `None` when the range is invalid.
pub(crate) fn node_text<'a>(node: &tree_sitter::Node, source: &'a [u8]) -> Option<&'a str> {
    let bytes = safe_slice(source, node.start_byte(), node.end_byte())?;
    std::str::from_utf8(bytes).ok()
}

/// Source span of a node: 1-based lines, 0-based columns.
pub(crate) fn span_of(node: &tree_sitter::Node) -> Span {
    Span::new(
        node.start_position().row + 1,
        node.start_position().column,
        node.end_position().row + 1,
        node.end_position().column,
    )
}

/// Maximum rendered signature length, in characters.
const SIGNATURE_CAP: usize = 200;

/// Deterministic one-line signature: the first source line of the node,
/// trimmed and capped.
///
/// For multi-line declarations this is the header (`class B extends A {`,
/// `fn parse(input: &str) -> Result<Ast> {`); for one-line declarations it is
/// the whole declaration. The resolver matches structural keywords and
/// referenced names against this text.
pub(crate) fn first_line_signature(node: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    let text = node_text(node, source)?;
    let line = text.lines().next()?.trim();
    if line.is_empty() {
        return None;
    }
    let count = line.chars().count();
    let mut sig: String = line.chars().take(SIGNATURE_CAP).collect();
    if count > SIGNATURE_CAP {
        sig.push('…');
    }
    Some(sig)
}

/// Collect the contiguous run of comment siblings directly above a node,
/// in source order.
pub(crate) fn comments_above(node: &tree_sitter::Node, source: &[u8]) -> Vec<String> {
    let mut collected = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut current = node.prev_sibling();

    while let Some(sibling) = current {
        if !matches!(sibling.kind(), "comment" | "line_comment" | "block_comment") {
            break;
        }
        // A gap of more than one blank line breaks the doc block.
        if sibling.end_position().row + 1 < expected_row {
            break;
        }
        if let Some(text) = node_text(&sibling, source) {
            collected.push(text.to_string());
        }
        expected_row = sibling.start_position().row;
        current = sibling.prev_sibling();
    }

    collected.reverse();
    collected
}

/// Strip comment markers (`//`, `///`, `/*`, `/**`, `*/`, leading `*`
/// gutters, `#`) from a raw comment block and normalize whitespace.
pub(crate) fn clean_comment_text(raw: &str) -> String {
    let mut lines = Vec::new();
    for line in raw.lines() {
        let mut s = line.trim();
        for prefix in ["/**", "/*", "///", "//!", "//", "#"] {
            if let Some(rest) = s.strip_prefix(prefix) {
                s = rest;
                break;
            }
        }
        if let Some(rest) = s.strip_suffix("*/") {
            s = rest;
        }
        let s = s.trim_start_matches('*').trim();
        lines.push(s.to_string());
    }
    let joined = lines.join("\n");
    joined.trim().to_string()
}

/// First child whose kind is in `kinds`, rendered as text. The usual way a
/// declaration names itself.
pub(crate) fn name_from_children(
    node: &tree_sitter::Node,
    source: &[u8],
    kinds: &[&str],
) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if kinds.contains(&child.kind()) {
            return node_text(&child, source).map(|s| s.to_string());
        }
    }
    None
}

/// Text of the child in a named grammar field, if present.
pub(crate) fn field_text(node: &tree_sitter::Node, source: &[u8], field: &str) -> Option<String> {
    let child = node.child_by_field_name(field)?;
    node_text(&child, source).map(|s| s.to_string())
}

/// Strip quotes or angle brackets from an import specifier.
pub(crate) fn strip_specifier(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`' || c == '<' || c == '>')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_keys_roundtrip() {
        for kind in [
            SymbolKind::Class,
            SymbolKind::Interface,
            SymbolKind::Type,
            SymbolKind::Enum,
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::Constructor,
            SymbolKind::Variable,
            SymbolKind::Constant,
            SymbolKind::Property,
            SymbolKind::Module,
            SymbolKind::Namespace,
        ] {
            assert_eq!(SymbolKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn kind_parse_accepts_language_aliases() {
        assert_eq!(SymbolKind::parse("struct"), Some(SymbolKind::Class));
        assert_eq!(SymbolKind::parse("trait"), Some(SymbolKind::Interface));
        assert_eq!(SymbolKind::parse("Fn"), Some(SymbolKind::Function));
        assert_eq!(SymbolKind::parse("unknown"), None);
    }

    #[test]
    fn edge_kinds_serialize_lowercase() {
        let json = serde_json::to_string(&EdgeKind::Instantiates).unwrap();
        assert_eq!(json, "\"instantiates\"");
        let back: EdgeKind = serde_json::from_str("\"extends\"").unwrap();
        assert_eq!(back, EdgeKind::Extends);
    }

    #[test]
    fn edge_priority_orders_structural_first() {
        assert!(EdgeKind::Imports.priority() < EdgeKind::Extends.priority());
        assert!(EdgeKind::Extends.priority() < EdgeKind::Implements.priority());
        assert!(EdgeKind::Instantiates.priority() < EdgeKind::Calls.priority());
        assert!(EdgeKind::Calls.priority() < EdgeKind::Uses.priority());
    }

    #[test]
    fn safe_slice_rejects_out_of_bounds() {
        let data = b"hello";
        assert_eq!(safe_slice(data, 0, 5), Some(&data[..]));
        assert_eq!(safe_slice(data, 2, 4), Some(&b"ll"[..]));
        assert_eq!(safe_slice(data, 4, 2), None);
        assert_eq!(safe_slice(data, 0, 6), None);
    }

    #[test]
    fn clean_comment_strips_markers() {
        let raw = "/**\n * Adds two numbers.\n * @param a left\n */";
        let cleaned = clean_comment_text(raw);
        assert!(cleaned.starts_with("Adds two numbers."));
        assert!(!cleaned.contains("/*"));
        assert!(!cleaned.contains("*/"));

        assert_eq!(clean_comment_text("/// A doc line."), "A doc line.");
        assert_eq!(clean_comment_text("# python style"), "python style");
    }

    #[test]
    fn strip_specifier_removes_delimiters() {
        assert_eq!(strip_specifier("\"./a\""), "./a");
        assert_eq!(strip_specifier("'react'"), "react");
        assert_eq!(strip_specifier("<stdio.h>"), "stdio.h");
        assert_eq!(strip_specifier("\"mod.ts\""), "mod.ts");
    }

    #[test]
    fn invalid_utf8_yields_no_facts() {
        let facts = parse_source(Language::Python, "/p/x.py", b"\xff\xfe\x00");
        assert!(facts.symbols.is_empty());
    }
}
