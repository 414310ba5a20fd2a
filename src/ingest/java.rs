//! Java symbol extraction.
//!
//! Emits the package declaration, classes (whose signatures carry
//! `extends`/`implements`), interfaces, enums with their constants, methods,
//! constructors, fields (`static` → constant, otherwise property), local
//! variable declarations, and imports by fully qualified name. Javadoc
//! blocks become docstrings.

use crate::ingest::pool::{self, Grammar};
use crate::ingest::{
    clean_comment_text, comments_above, field_text, first_line_signature, name_from_children,
    node_text, span_of, EdgeKind, FileFacts, RawEdge, RawSymbol, SymbolKind,
};

pub fn extract(filepath: &str, source: &[u8]) -> FileFacts {
    let tree = match pool::with_parser(Grammar::Java, |parser| parser.parse(source, None)) {
        Ok(Some(tree)) => tree,
        _ => return FileFacts::default(),
    };

    let mut facts = FileFacts::default();
    walk(&tree.root_node(), source, filepath, None, &mut facts);
    facts
}

/// Raw text of a declaration's `modifiers` child, empty when absent.
fn modifiers_text(node: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    let result = node
        .children(&mut cursor)
        .find(|c| c.kind() == "modifiers")
        .and_then(|m| node_text(&m, source).map(|s| s.to_string()));
    result
}

/// Explicit `public`; members with no modifier block at all default to
/// public (interface members).
fn is_public(node: &tree_sitter::Node, source: &[u8]) -> bool {
    match modifiers_text(node, source) {
        Some(mods) => mods.contains("public"),
        None => true,
    }
}

/// Javadoc `/** … */` directly above a declaration.
fn javadoc_above(node: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    let comments = comments_above(node, source);
    let last = comments.last()?;
    if !last.starts_with("/**") {
        return None;
    }
    let cleaned = clean_comment_text(last);
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
        docstring: javadoc_above(node, source),
        parent: parent.map(|s| s.to_string()),
        exported,
    });
}

fn walk(
    node: &tree_sitter::Node,
    source: &[u8],
    filepath: &str,
    owner: Option<&str>,
    facts: &mut FileFacts,
) {
    match node.kind() {
        "package_declaration" => {
            if let Some(name) =
                name_from_children(node, source, &["scoped_identifier", "identifier"])
            {
                push(facts, node, source, name, SymbolKind::Module, None, true);
            }
        }

        "import_declaration" => {
            if let Some(name) =
                name_from_children(node, source, &["scoped_identifier", "identifier"])
            {
                facts.edges.push(RawEdge {
                    from: filepath.to_string(),
                    to: name,
                    kind: EdgeKind::Imports,
                    location: Some(span_of(node)),
                });
            }
        }

        "class_declaration" | "interface_declaration" => {
            if let Some(name) = field_text(node, source, "name") {
                let kind = if node.kind() == "interface_declaration" {
                    SymbolKind::Interface
                } else {
                    SymbolKind::Class
                };
                push(
                    facts,
                    node,
                    source,
                    name.clone(),
                    kind,
                    owner,
                    is_public(node, source),
                );
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        walk(&child, source, filepath, Some(&name), facts);
                    }
                }
            }
        }

        "enum_declaration" => {
            if let Some(name) = field_text(node, source, "name") {
                push(
                    facts,
                    node,
                    source,
                    name.clone(),
                    SymbolKind::Enum,
                    owner,
                    is_public(node, source),
                );
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        if child.kind() == "enum_constant" {
                            if let Some(constant) = field_text(&child, source, "name") {
                                push(
                                    facts,
                                    &child,
                                    source,
                                    constant,
                                    SymbolKind::Constant,
                                    Some(&name),
                                    true,
                                );
                            }
                        } else {
                            walk(&child, source, filepath, Some(&name), facts);
                        }
                    }
                }
            }
        }

        "method_declaration" => {
            if let Some(name) = field_text(node, source, "name") {
                push(
                    facts,
                    node,
                    source,
                    name.clone(),
                    SymbolKind::Method,
                    owner,
                    is_public(node, source),
                );
                if let Some(body) = node.child_by_field_name("body") {
                    walk_children(&body, source, filepath, Some(&name), facts);
                }
            }
        }

        "constructor_declaration" => {
            if let Some(name) = field_text(node, source, "name") {
                push(
                    facts,
                    node,
                    source,
                    name.clone(),
                    SymbolKind::Constructor,
                    owner,
                    is_public(node, source),
                );
                if let Some(body) = node.child_by_field_name("body") {
                    walk_children(&body, source, filepath, Some(&name), facts);
                }
            }
        }

        "field_declaration" => {
            let is_static = modifiers_text(node, source)
                .map(|m| m.contains("static"))
                .unwrap_or(false);
            let kind = if is_static {
                SymbolKind::Constant
            } else {
                SymbolKind::Property
            };
            let exported = is_public(node, source);
            let mut cursor = node.walk();
            for declarator in node.children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(name) = field_text(&declarator, source, "name") {
                    push(facts, node, source, name, kind, owner, exported);
                }
            }
        }

        "local_variable_declaration" => {
            let mut cursor = node.walk();
            for declarator in node.children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(name) = field_text(&declarator, source, "name") {
                    push(facts, node, source, name, SymbolKind::Variable, owner, false);
                }
            }
        }

        _ => walk_children(node, source, filepath, owner, facts),
    }
}

fn walk_children(
    node: &tree_sitter::Node,
    source: &[u8],
    filepath: &str,
    owner: Option<&str>,
    facts: &mut FileFacts,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(&child, source, filepath, owner, facts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_java(source: &str) -> FileFacts {
        extract("/p/App.java", source.as_bytes())
    }

    fn find<'a>(facts: &'a FileFacts, name: &str) -> &'a RawSymbol {
        facts
            .symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("symbol {} not found in {:?}", name, facts.symbols))
    }

    #[test]
    fn package_and_imports() {
        let src = "package com.acme.app;\n\nimport java.util.List;\nimport java.io.File;\n\npublic class App {}\n";
        let facts = extract_java(src);
        assert_eq!(find(&facts, "com.acme.app").kind, SymbolKind::Module);
        let targets: Vec<&str> = facts.edges.iter().map(|e| e.to.as_str()).collect();
        assert_eq!(targets, vec!["java.util.List", "java.io.File"]);
        assert!(facts.edges.iter().all(|e| e.kind == EdgeKind::Imports));
    }

    #[test]
    fn class_signature_carries_heritage() {
        let src = "public class Child extends Base implements Closeable {\n}\n";
        let facts = extract_java(src);
        let child = find(&facts, "Child");
        assert!(child.exported);
        let sig = child.signature.as_deref().unwrap();
        assert!(sig.contains("extends Base"));
        assert!(sig.contains("implements Closeable"));
    }

    #[test]
    fn methods_and_constructor() {
        let src = "public class Engine {\n  public Engine() {}\n  public void start() {}\n  void stop() {}\n}\n";
        let facts = extract_java(src);
        let ctor = facts
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Constructor)
            .unwrap();
        assert_eq!(ctor.name, "Engine");
        assert_eq!(ctor.parent.as_deref(), Some("Engine"));

        assert!(find(&facts, "start").exported);
        let stop = find(&facts, "stop");
        assert_eq!(stop.kind, SymbolKind::Method);
        // No modifier block at all defaults to exported.
        assert!(stop.exported);
    }

    #[test]
    fn interface_members_default_public() {
        let src = "public interface Store {\n  String get(String key);\n}\n";
        let facts = extract_java(src);
        assert_eq!(find(&facts, "Store").kind, SymbolKind::Interface);
        let get = find(&facts, "get");
        assert_eq!(get.kind, SymbolKind::Method);
        assert!(get.exported); // no modifier block at all
    }

    #[test]
    fn static_fields_are_constants() {
        let src = "public class Config {\n  public static int MAX = 10;\n  private String name;\n}\n";
        let facts = extract_java(src);
        assert_eq!(find(&facts, "MAX").kind, SymbolKind::Constant);
        let name = find(&facts, "name");
        assert_eq!(name.kind, SymbolKind::Property);
        assert!(!name.exported);
    }

    #[test]
    fn enum_constants() {
        let src = "public enum Color { RED, GREEN }\n";
        let facts = extract_java(src);
        assert_eq!(find(&facts, "Color").kind, SymbolKind::Enum);
        let red = find(&facts, "RED");
        assert_eq!(red.kind, SymbolKind::Constant);
        assert_eq!(red.parent.as_deref(), Some("Color"));
    }

    #[test]
    fn local_variables_attach_to_method() {
        let src = "public class A {\n  void run() {\n    int count = 0;\n  }\n}\n";
        let facts = extract_java(src);
        let count = find(&facts, "count");
        assert_eq!(count.kind, SymbolKind::Variable);
        assert_eq!(count.parent.as_deref(), Some("run"));
    }

    #[test]
    fn javadoc_is_attached() {
        let src = "public class A {\n  /** Starts the engine. */\n  public void start() {}\n}\n";
        let facts = extract_java(src);
        assert_eq!(
            find(&facts, "start").docstring.as_deref(),
            Some("Starts the engine.")
        );
    }
}
