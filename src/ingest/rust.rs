//! Rust symbol extraction.
//!
//! Emits modules, structs (as classes) with their fields, enums with
//! variants recorded as constants, traits (as interfaces), free functions,
//! methods declared inside `impl` blocks (the implemented type becomes the
//! owner), consts, statics, type aliases, identifier-pattern `let` bindings,
//! and `use` declarations as file→path edges. Exported-ness is the presence
//! of a visibility modifier.

use crate::ingest::pool::{self, Grammar};
use crate::ingest::{
    clean_comment_text, comments_above, field_text, first_line_signature, node_text, span_of,
    EdgeKind, FileFacts, RawEdge, RawSymbol, SymbolKind,
};

pub fn extract(filepath: &str, source: &[u8]) -> FileFacts {
    let tree = match pool::with_parser(Grammar::Rust, |parser| parser.parse(source, None)) {
        Ok(Some(tree)) => tree,
        _ => return FileFacts::default(),
    };

    let mut facts = FileFacts::default();
    walk(&tree.root_node(), source, filepath, None, false, &mut facts);
    facts
}

fn has_visibility(node: &tree_sitter::Node) -> bool {
    let mut cursor = node.walk();
    let result = node
        .children(&mut cursor)
        .any(|c| c.kind() == "visibility_modifier");
    result
}

/// Rustdoc: contiguous `///` lines (or a `/** */` block) directly above.
fn rustdoc_above(node: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    let comments = comments_above(node, source);
    let doc_lines: Vec<&String> = comments
        .iter()
        .filter(|c| c.starts_with("///") || c.starts_with("/**"))
        .collect();
    if doc_lines.is_empty() {
        return None;
    }
    let joined = doc_lines
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let cleaned = clean_comment_text(&joined);
    (!cleaned.is_empty()).then_some(cleaned)
}

#[allow(clippy::too_many_arguments)]
fn push(
    facts: &mut FileFacts,
    node: &tree_sitter::Node,
    source: &[u8],
    name: String,
    kind: SymbolKind,
    parent: Option<&str>,
    exported: bool,
) {
    facts.symbols.push(RawSymbol {
        name,
        kind,
        start_row: node.start_position().row,
        location: span_of(node),
        signature: first_line_signature(node, source),
        docstring: rustdoc_above(node, source),
        parent: parent.map(|s| s.to_string()),
        exported,
    });
}

fn walk(
    node: &tree_sitter::Node,
    source: &[u8],
    filepath: &str,
    owner: Option<&str>,
    in_impl_or_trait: bool,
    facts: &mut FileFacts,
) {
    match node.kind() {
        "mod_item" => {
            if let Some(name) = field_text(node, source, "name") {
                push(
                    facts,
                    node,
                    source,
                    name.clone(),
                    SymbolKind::Module,
                    owner,
                    has_visibility(node),
                );
                if let Some(body) = node.child_by_field_name("body") {
                    walk_children(&body, source, filepath, Some(&name), false, facts);
                }
            }
        }

        "struct_item" => {
            if let Some(name) = field_text(node, source, "name") {
                push(
                    facts,
                    node,
                    source,
                    name.clone(),
                    SymbolKind::Class,
                    owner,
                    has_visibility(node),
                );
                if let Some(body) = node.child_by_field_name("body") {
                    if body.kind() == "field_declaration_list" {
                        let mut cursor = body.walk();
                        for field in body.children(&mut cursor) {
                            if field.kind() != "field_declaration" {
                                continue;
                            }
                            if let Some(field_name) = field_text(&field, source, "name") {
                                push(
                                    facts,
                                    &field,
                                    source,
                                    field_name,
                                    SymbolKind::Property,
                                    Some(&name),
                                    has_visibility(&field),
                                );
                            }
                        }
                    }
                }
            }
        }

        "enum_item" => {
            if let Some(name) = field_text(node, source, "name") {
                push(
                    facts,
                    node,
                    source,
                    name.clone(),
                    SymbolKind::Enum,
                    owner,
                    has_visibility(node),
                );
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for variant in body.children(&mut cursor) {
                        if variant.kind() != "enum_variant" {
                            continue;
                        }
                        if let Some(variant_name) = field_text(&variant, source, "name") {
                            push(
                                facts,
                                &variant,
                                source,
                                variant_name,
                                SymbolKind::Constant,
                                Some(&name),
                                has_visibility(node),
                            );
                        }
                    }
                }
            }
        }

        "trait_item" => {
            if let Some(name) = field_text(node, source, "name") {
                push(
                    facts,
                    node,
                    source,
                    name.clone(),
                    SymbolKind::Interface,
                    owner,
                    has_visibility(node),
                );
                if let Some(body) = node.child_by_field_name("body") {
                    walk_children(&body, source, filepath, Some(&name), true, facts);
                }
            }
        }

        // The implemented type owns any fn declared inside; no symbol for
        // the impl block itself. `impl Trait for Type` also records an
        // implements edge by name.
        "impl_item" => {
            let type_name = field_text(node, source, "type").map(|t| base_type_name(&t));
            if let (Some(type_name), Some(trait_name)) =
                (&type_name, field_text(node, source, "trait"))
            {
                facts.edges.push(RawEdge {
                    from: type_name.clone(),
                    to: base_type_name(&trait_name),
                    kind: EdgeKind::Implements,
                    location: Some(span_of(node)),
                });
            }
            if let Some(body) = node.child_by_field_name("body") {
                walk_children(&body, source, filepath, type_name.as_deref(), true, facts);
            }
        }

        "function_item" | "function_signature_item" => {
            if let Some(name) = field_text(node, source, "name") {
                let kind = if in_impl_or_trait {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                };
                push(
                    facts,
                    node,
                    source,
                    name.clone(),
                    kind,
                    owner,
                    has_visibility(node),
                );
                if let Some(body) = node.child_by_field_name("body") {
                    walk_children(&body, source, filepath, Some(&name), false, facts);
                }
            }
        }

        "const_item" | "static_item" => {
            if let Some(name) = field_text(node, source, "name") {
                push(
                    facts,
                    node,
                    source,
                    name,
                    SymbolKind::Constant,
                    owner,
                    has_visibility(node),
                );
            }
        }

        "type_item" => {
            if let Some(name) = field_text(node, source, "name") {
                push(
                    facts,
                    node,
                    source,
                    name,
                    SymbolKind::Type,
                    owner,
                    has_visibility(node),
                );
            }
        }

        // `let x = …` with a plain identifier pattern.
        "let_declaration" => {
            if let Some(pattern) = node.child_by_field_name("pattern") {
                if pattern.kind() == "identifier" {
                    if let Some(name) = node_text(&pattern, source) {
                        push(
                            facts,
                            node,
                            source,
                            name.to_string(),
                            SymbolKind::Variable,
                            owner,
                            false,
                        );
                    }
                }
            }
        }

        "use_declaration" => {
            if let Some(argument) = field_text(node, source, "argument") {
                facts.edges.push(RawEdge {
                    from: filepath.to_string(),
                    to: argument,
                    kind: EdgeKind::Imports,
                    location: Some(span_of(node)),
                });
            }
        }

        _ => walk_children(node, source, filepath, owner, in_impl_or_trait, facts),
    }
}

fn walk_children(
    node: &tree_sitter::Node,
    source: &[u8],
    filepath: &str,
    owner: Option<&str>,
    in_impl_or_trait: bool,
    facts: &mut FileFacts,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(&child, source, filepath, owner, in_impl_or_trait, facts);
    }
}

/// `Vec<String>` → `Vec`, `crate::store::GraphStore` → `GraphStore`.
fn base_type_name(raw: &str) -> String {
    let no_generics = raw.split('<').next().unwrap_or(raw).trim();
    no_generics
        .rsplit("::")
        .next()
        .unwrap_or(no_generics)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_rs(source: &str) -> FileFacts {
        extract("/p/lib.rs", source.as_bytes())
    }

    fn find<'a>(facts: &'a FileFacts, name: &str) -> &'a RawSymbol {
        facts
            .symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("symbol {} not found in {:?}", name, facts.symbols))
    }

    #[test]
    fn struct_with_fields() {
        let src = "pub struct Config {\n    pub url: String,\n    retries: u32,\n}\n";
        let facts = extract_rs(src);
        let config = find(&facts, "Config");
        assert_eq!(config.kind, SymbolKind::Class);
        assert!(config.exported);

        let url = find(&facts, "url");
        assert_eq!(url.kind, SymbolKind::Property);
        assert_eq!(url.parent.as_deref(), Some("Config"));
        assert!(url.exported);
        assert!(!find(&facts, "retries").exported);
    }

    #[test]
    fn enum_variants_are_constants() {
        let facts = extract_rs("pub enum Mode {\n    Fast,\n    Slow,\n}\n");
        assert_eq!(find(&facts, "Mode").kind, SymbolKind::Enum);
        let fast = find(&facts, "Fast");
        assert_eq!(fast.kind, SymbolKind::Constant);
        assert_eq!(fast.parent.as_deref(), Some("Mode"));
    }

    #[test]
    fn impl_methods_attach_to_type() {
        let src = "struct Engine;\n\nimpl Engine {\n    pub fn start(&self) {}\n}\n";
        let facts = extract_rs(src);
        let start = find(&facts, "start");
        assert_eq!(start.kind, SymbolKind::Method);
        assert_eq!(start.parent.as_deref(), Some("Engine"));
        // No symbol for the impl block itself.
        assert_eq!(
            facts.symbols.iter().filter(|s| s.name == "Engine").count(),
            1
        );
    }

    #[test]
    fn trait_impl_emits_implements_edge() {
        let src = "trait Runner {}\nstruct Engine;\nimpl Runner for Engine {}\n";
        let facts = extract_rs(src);
        let implements: Vec<_> = facts
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Implements)
            .collect();
        assert_eq!(implements.len(), 1);
        assert_eq!(implements[0].from, "Engine");
        assert_eq!(implements[0].to, "Runner");
    }

    #[test]
    fn trait_fns_are_methods() {
        let facts = extract_rs("pub trait Store {\n    fn get(&self, key: &str) -> String;\n}\n");
        assert_eq!(find(&facts, "Store").kind, SymbolKind::Interface);
        let get = find(&facts, "get");
        assert_eq!(get.kind, SymbolKind::Method);
        assert_eq!(get.parent.as_deref(), Some("Store"));
    }

    #[test]
    fn modules_contain_their_items() {
        let src = "pub mod inner {\n    pub fn run() {}\n}\n";
        let facts = extract_rs(src);
        assert_eq!(find(&facts, "inner").kind, SymbolKind::Module);
        let run = find(&facts, "run");
        assert_eq!(run.parent.as_deref(), Some("inner"));
        assert_eq!(run.kind, SymbolKind::Function);
    }

    #[test]
    fn const_static_and_type_alias() {
        let src = "pub const MAX: usize = 8;\nstatic NAME: &str = \"x\";\npub type Result = std::result::Result<(), ()>;\n";
        let facts = extract_rs(src);
        assert_eq!(find(&facts, "MAX").kind, SymbolKind::Constant);
        assert_eq!(find(&facts, "NAME").kind, SymbolKind::Constant);
        assert!(!find(&facts, "NAME").exported);
        assert_eq!(find(&facts, "Result").kind, SymbolKind::Type);
    }

    #[test]
    fn let_bindings_with_identifier_patterns_only() {
        let src = "fn main() {\n    let count = 1;\n    let (a, b) = (1, 2);\n}\n";
        let facts = extract_rs(src);
        let count = find(&facts, "count");
        assert_eq!(count.kind, SymbolKind::Variable);
        assert_eq!(count.parent.as_deref(), Some("main"));
        // Tuple patterns are skipped.
        assert!(!facts.symbols.iter().any(|s| s.name == "a"));
    }

    #[test]
    fn use_declarations_become_import_edges() {
        let src = "use std::collections::HashMap;\nuse crate::store::GraphStore;\n";
        let facts = extract_rs(src);
        let targets: Vec<&str> = facts.edges.iter().map(|e| e.to.as_str()).collect();
        assert_eq!(
            targets,
            vec!["std::collections::HashMap", "crate::store::GraphStore"]
        );
        assert!(facts.edges.iter().all(|e| e.kind == EdgeKind::Imports));
        assert!(facts.edges.iter().all(|e| e.from == "/p/lib.rs"));
    }

    #[test]
    fn rustdoc_is_attached() {
        let src = "/// Starts the engine.\n/// Blocks until ready.\npub fn start() {}\n";
        let facts = extract_rs(src);
        let doc = find(&facts, "start").docstring.as_deref().unwrap();
        assert!(doc.starts_with("Starts the engine."));
        assert!(doc.contains("Blocks until ready."));
    }

    #[test]
    fn plain_comments_are_not_docs() {
        let facts = extract_rs("// internal helper\nfn helper() {}\n");
        assert!(find(&facts, "helper").docstring.is_none());
    }

    #[test]
    fn generic_impl_type_is_stripped() {
        let src = "struct Cache<T> { items: Vec<T> }\nimpl<T> Cache<T> {\n    fn len(&self) -> usize { 0 }\n}\n";
        let facts = extract_rs(src);
        assert_eq!(find(&facts, "len").parent.as_deref(), Some("Cache"));
    }
}
