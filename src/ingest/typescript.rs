//! TypeScript and JavaScript symbol extraction (also TSX/JSX).
//!
//! Walks the tree-sitter tree and emits classes, interfaces, enums and their
//! members, type aliases, namespaces, functions, arrow- and function-valued
//! bindings, class methods and public fields, and interface property
//! signatures. `export_statement` nodes are descended into without producing
//! a duplicate walk; import statements become file→specifier edges.

use crate::ingest::detect::Language;
use crate::ingest::pool::{self, Grammar};
use crate::ingest::{
    clean_comment_text, comments_above, field_text, first_line_signature, name_from_children,
    node_text, span_of, strip_specifier, EdgeKind, FileFacts, RawEdge, RawSymbol, SymbolKind,
};

/// Extract facts from one TypeScript/JavaScript file.
///
/// Pure function: same input, same output. A parse failure yields empty
/// facts.
pub fn extract(filepath: &str, source: &[u8], language: Language) -> FileFacts {
    let grammar = Grammar::for_file(language, filepath);
    let tree = match pool::with_parser(grammar, |parser| parser.parse(source, None)) {
        Ok(Some(tree)) => tree,
        _ => return FileFacts::default(),
    };

    let mut facts = FileFacts::default();
    walk(
        &tree.root_node(),
        source,
        filepath,
        None,
        false,
        None,
        &mut facts,
    );
    facts
}

/// First child of the given kind.
fn find_child<'t>(node: &tree_sitter::Node<'t>, kind: &str) -> Option<tree_sitter::Node<'t>> {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).find(|c| c.kind() == kind);
    result
}

/// JSDoc block directly above a node, if any.
fn jsdoc_above(node: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    let comments = comments_above(node, source);
    let last = comments.last()?;
    if !last.starts_with("/**") {
        return None;
    }
    let cleaned = clean_comment_text(last);
    (!cleaned.is_empty()).then_some(cleaned)
}

#[allow(clippy::too_many_arguments)]
fn walk(
    node: &tree_sitter::Node,
    source: &[u8],
    filepath: &str,
    owner: Option<&str>,
    exported: bool,
    inherited_doc: Option<String>,
    facts: &mut FileFacts,
) {
    match node.kind() {
        // `export class A {}` wraps the declaration; descend once with the
        // export flag set and the doc comment that sits above the export.
        "export_statement" => {
            // `export { A } from "./a"` re-exports are imports of the source.
            if let Some(spec) = field_text(node, source, "source") {
                facts.edges.push(RawEdge {
                    from: filepath.to_string(),
                    to: strip_specifier(&spec),
                    kind: EdgeKind::Imports,
                    location: Some(span_of(node)),
                });
            }
            let doc = jsdoc_above(node, source);
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(&child, source, filepath, owner, true, doc.clone(), facts);
            }
        }

        "import_statement" => {
            if let Some(spec) = field_text(node, source, "source") {
                facts.edges.push(RawEdge {
                    from: filepath.to_string(),
                    to: strip_specifier(&spec),
                    kind: EdgeKind::Imports,
                    location: Some(span_of(node)),
                });
            }
        }

        "class_declaration" | "abstract_class_declaration" => {
            if let Some(name) = field_text(node, source, "name") {
                push_symbol(
                    facts, node, source, &name, SymbolKind::Class, owner, exported,
                    inherited_doc,
                );
                if let Some(body) = node.child_by_field_name("body") {
                    walk_members(&body, source, filepath, &name, facts);
                }
            }
        }

        "interface_declaration" => {
            if let Some(name) = field_text(node, source, "name") {
                push_symbol(
                    facts,
                    node,
                    source,
                    &name,
                    SymbolKind::Interface,
                    owner,
                    exported,
                    inherited_doc,
                );
                if let Some(body) = node.child_by_field_name("body") {
                    walk_members(&body, source, filepath, &name, facts);
                }
            }
        }

        "enum_declaration" => {
            if let Some(name) = field_text(node, source, "name") {
                push_symbol(
                    facts, node, source, &name, SymbolKind::Enum, owner, exported,
                    inherited_doc,
                );
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for member in body.children(&mut cursor) {
                        let member_name = match member.kind() {
                            "enum_assignment" => field_text(&member, source, "name"),
                            "property_identifier" => {
                                node_text(&member, source).map(|s| s.to_string())
                            }
                            _ => None,
                        };
                        if let Some(member_name) = member_name {
                            push_symbol(
                                facts,
                                &member,
                                source,
                                &member_name,
                                SymbolKind::Constant,
                                Some(&name),
                                exported,
                                None,
                            );
                        }
                    }
                }
            }
        }

        "type_alias_declaration" => {
            if let Some(name) = field_text(node, source, "name") {
                push_symbol(
                    facts, node, source, &name, SymbolKind::Type, owner, exported,
                    inherited_doc,
                );
            }
        }

        // `namespace X {}` / `module X {}`. The name is not a grammar field
        // in every version; fall back to scanning children.
        "internal_module" | "module" => {
            let name = field_text(node, source, "name")
                .or_else(|| name_from_children(node, source, &["identifier", "nested_identifier"]));
            if let Some(name) = name {
                push_symbol(
                    facts,
                    node,
                    source,
                    &name,
                    SymbolKind::Namespace,
                    owner,
                    exported,
                    inherited_doc,
                );
                let body = node
                    .child_by_field_name("body")
                    .or_else(|| find_child(node, "statement_block"));
                if let Some(body) = body {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        walk(&child, source, filepath, Some(&name), false, None, facts);
                    }
                }
            }
        }

        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = field_text(node, source, "name") {
                push_symbol(
                    facts,
                    node,
                    source,
                    &name,
                    SymbolKind::Function,
                    owner,
                    exported,
                    inherited_doc,
                );
            }
        }

        // `const f = () => …` / `let x = 1` / `var y`
        "lexical_declaration" | "variable_declaration" => {
            let is_const = node_text(node, source)
                .map(|t| t.trim_start().starts_with("const"))
                .unwrap_or(false);
            let doc = inherited_doc.or_else(|| jsdoc_above(node, source));
            let mut cursor = node.walk();
            for declarator in node.children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(name_node) = declarator.child_by_field_name("name") else {
                    continue;
                };
                if name_node.kind() != "identifier" {
                    continue; // destructuring patterns have no single name
                }
                let Some(name) = node_text(&name_node, source).map(|s| s.to_string()) else {
                    continue;
                };
                let value_kind = declarator
                    .child_by_field_name("value")
                    .map(|v| v.kind().to_string());
                let kind = match value_kind.as_deref() {
                    Some("arrow_function") | Some("function_expression") | Some("function") => {
                        SymbolKind::Function
                    }
                    _ if is_const => SymbolKind::Constant,
                    _ => SymbolKind::Variable,
                };
                push_symbol(
                    facts,
                    node,
                    source,
                    &name,
                    kind,
                    owner,
                    exported,
                    doc.clone(),
                );
            }
        }

        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(&child, source, filepath, owner, exported, None, facts);
            }
        }
    }
}

/// Walk a class or interface body, attaching members to `owner`.
fn walk_members(
    body: &tree_sitter::Node,
    source: &[u8],
    filepath: &str,
    owner: &str,
    facts: &mut FileFacts,
) {
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        match member.kind() {
            "method_definition" | "method_signature" => {
                if let Some(name) = field_text(&member, source, "name") {
                    let kind = if name == "constructor" {
                        SymbolKind::Constructor
                    } else {
                        SymbolKind::Method
                    };
                    push_symbol(facts, &member, source, &name, kind, Some(owner), false, None);
                }
            }
            "public_field_definition" | "field_definition" | "property_signature" => {
                if let Some(name) = field_text(&member, source, "name") {
                    push_symbol(
                        facts,
                        &member,
                        source,
                        &name,
                        SymbolKind::Property,
                        Some(owner),
                        false,
                        None,
                    );
                }
            }
            // Nested declarations keep the outer walk semantics.
            _ => walk(&member, source, filepath, Some(owner), false, None, facts),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn push_symbol(
    facts: &mut FileFacts,
    node: &tree_sitter::Node,
    source: &[u8],
    name: &str,
    kind: SymbolKind,
    owner: Option<&str>,
    exported: bool,
    doc: Option<String>,
) {
    let docstring = doc.or_else(|| jsdoc_above(node, source));
    facts.symbols.push(RawSymbol {
        name: name.to_string(),
        kind,
        start_row: node.start_position().row,
        location: span_of(node),
        signature: first_line_signature(node, source),
        docstring,
        parent: owner.map(|s| s.to_string()),
        exported,
    });
}
