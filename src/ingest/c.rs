//! C symbol extraction.
//!
//! Emits function definitions and prototypes, struct/union/enum specifiers,
//! typedefs, `#define` macros as constants, struct fields as properties, and
//! `#include` directives as file→header edges. File-local (`static`)
//! declarations are not exported.

use crate::ingest::pool::{self, Grammar};
use crate::ingest::{
    clean_comment_text, comments_above, field_text, first_line_signature, node_text, span_of,
    strip_specifier, EdgeKind, FileFacts, RawEdge, RawSymbol, SymbolKind,
};

pub fn extract(filepath: &str, source: &[u8]) -> FileFacts {
    let tree = match pool::with_parser(Grammar::C, |parser| parser.parse(source, None)) {
        Ok(Some(tree)) => tree,
        _ => return FileFacts::default(),
    };

    let mut facts = FileFacts::default();
    walk(&tree.root_node(), source, filepath, None, &mut facts);
    facts
}

/// Unwrap a declarator chain down to its identifier:
/// `*(*fp)(int)` and friends.
pub(crate) fn declarator_name(node: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" => {
            node_text(node, source).map(|s| s.to_string())
        }
        _ => {
            if let Some(inner) = node.child_by_field_name("declarator") {
                return declarator_name(&inner, source);
            }
            // parenthesized_declarator has no field; scan children.
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if let Some(name) = declarator_name(&child, source) {
                    return Some(name);
                }
            }
            None
        }
    }
}

/// Whether a declarator chain bottoms out in a function declarator.
pub(crate) fn has_function_declarator(node: &tree_sitter::Node) -> bool {
    if node.kind() == "function_declarator" {
        return true;
    }
    match node.child_by_field_name("declarator") {
        Some(inner) => has_function_declarator(&inner),
        None => false,
    }
}

/// `static` storage class anywhere in the declaration's specifiers.
pub(crate) fn is_static(node: &tree_sitter::Node, source: &[u8]) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).any(|c| {
        c.kind() == "storage_class_specifier"
            && node_text(&c, source).map(|t| t == "static").unwrap_or(false)
    });
    result
}

/// `/* … */` or contiguous `//` block directly above a declaration.
pub(crate) fn comment_doc_above(node: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    let comments = comments_above(node, source);
    if comments.is_empty() {
        return None;
    }
    let cleaned = clean_comment_text(&comments.join("\n"));
    (!cleaned.is_empty()).then_some(cleaned)
}

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
        docstring: comment_doc_above(node, source),
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
        "preproc_include" => {
            if let Some(path) = field_text(node, source, "path") {
                facts.edges.push(RawEdge {
                    from: filepath.to_string(),
                    to: strip_specifier(&path),
                    kind: EdgeKind::Imports,
                    location: Some(span_of(node)),
                });
            }
        }

        "preproc_def" | "preproc_function_def" => {
            if let Some(name) = field_text(node, source, "name") {
                push(facts, node, source, name, SymbolKind::Constant, owner, true);
            }
        }

        "function_definition" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some(name) = declarator_name(&declarator, source) {
                    push(
                        facts,
                        node,
                        source,
                        name,
                        SymbolKind::Function,
                        owner,
                        !is_static(node, source),
                    );
                }
            }
        }

        // Prototypes: a declaration carrying a function_declarator, possibly
        // nested under pointer declarators.
        "declaration" => {
            let mut cursor = node.walk();
            for declarator in node.children_by_field_name("declarator", &mut cursor) {
                if has_function_declarator(&declarator) {
                    if let Some(name) = declarator_name(&declarator, source) {
                        push(
                            facts,
                            node,
                            source,
                            name,
                            SymbolKind::Function,
                            owner,
                            !is_static(node, source),
                        );
                    }
                }
            }
        }

        "struct_specifier" | "union_specifier" | "enum_specifier" => {
            walk_tagged_type(node, source, filepath, owner, facts);
        }

        "type_definition" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some(name) = declarator_name(&declarator, source) {
                    push(facts, node, source, name, SymbolKind::Type, owner, true);
                }
            }
            // `typedef struct { … } name;` still carries the members.
            if let Some(inner) = node.child_by_field_name("type") {
                if matches!(
                    inner.kind(),
                    "struct_specifier" | "union_specifier" | "enum_specifier"
                ) {
                    walk_tagged_type(&inner, source, filepath, owner, facts);
                }
            }
        }

        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(&child, source, filepath, owner, facts);
            }
        }
    }
}

/// struct → interface, union → type, enum → enum (+ members).
fn walk_tagged_type(
    node: &tree_sitter::Node,
    source: &[u8],
    _filepath: &str,
    owner: Option<&str>,
    facts: &mut FileFacts,
) {
    let Some(body) = node.child_by_field_name("body") else {
        return; // forward declaration
    };
    let name = field_text(node, source, "name");

    let kind = match node.kind() {
        "struct_specifier" => SymbolKind::Interface,
        "union_specifier" => SymbolKind::Type,
        _ => SymbolKind::Enum,
    };

    if let Some(ref name) = name {
        push(facts, node, source, name.clone(), kind, owner, true);
    }

    let parent = name.as_deref().or(owner);
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        match member.kind() {
            "field_declaration" => {
                if let Some(declarator) = member.child_by_field_name("declarator") {
                    if let Some(field_name) = declarator_name(&declarator, source) {
                        push(
                            facts,
                            &member,
                            source,
                            field_name,
                            SymbolKind::Property,
                            parent,
                            true,
                        );
                    }
                }
            }
            "enumerator" => {
                if let Some(enum_name) = field_text(&member, source, "name") {
                    push(
                        facts,
                        &member,
                        source,
                        enum_name,
                        SymbolKind::Constant,
                        parent,
                        true,
                    );
                }
            }
            "enumerator_list" => {
                let mut inner = member.walk();
                for enumerator in member.children(&mut inner) {
                    if enumerator.kind() == "enumerator" {
                        if let Some(enum_name) = field_text(&enumerator, source, "name") {
                            push(
                                facts,
                                &enumerator,
                                source,
                                enum_name,
                                SymbolKind::Constant,
                                parent,
                                true,
                            );
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_c(source: &str) -> FileFacts {
        extract("/p/util.c", source.as_bytes())
    }

    fn find<'a>(facts: &'a FileFacts, name: &str) -> &'a RawSymbol {
        facts
            .symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("symbol {} not found in {:?}", name, facts.symbols))
    }

    #[test]
    fn includes_become_import_edges() {
        let facts = extract_c("#include <stdio.h>\n#include \"util.h\"\n");
        let targets: Vec<&str> = facts.edges.iter().map(|e| e.to.as_str()).collect();
        assert_eq!(targets, vec!["stdio.h", "util.h"]);
        assert!(facts.edges.iter().all(|e| e.kind == EdgeKind::Imports));
    }

    #[test]
    fn defines_are_constants() {
        let facts = extract_c("#define MAX_LEN 128\n#define SQUARE(x) ((x) * (x))\n");
        assert_eq!(find(&facts, "MAX_LEN").kind, SymbolKind::Constant);
        assert_eq!(find(&facts, "SQUARE").kind, SymbolKind::Constant);
    }

    #[test]
    fn functions_and_static_visibility() {
        let src = "int add(int a, int b) { return a + b; }\nstatic void helper(void) {}\n";
        let facts = extract_c(src);
        let add = find(&facts, "add");
        assert_eq!(add.kind, SymbolKind::Function);
        assert!(add.exported);
        assert!(!find(&facts, "helper").exported);
    }

    #[test]
    fn prototypes_are_functions() {
        let facts = extract_c("int parse(const char *input);\n");
        assert_eq!(find(&facts, "parse").kind, SymbolKind::Function);
    }

    #[test]
    fn pointer_return_functions_unwrap_declarator() {
        let facts = extract_c("char *strdup2(const char *s) { return 0; }\n");
        assert_eq!(find(&facts, "strdup2").kind, SymbolKind::Function);
    }

    #[test]
    fn struct_fields_are_properties() {
        let src = "struct point {\n  int x;\n  int y;\n};\n";
        let facts = extract_c(src);
        let point = find(&facts, "point");
        assert_eq!(point.kind, SymbolKind::Interface);
        let x = find(&facts, "x");
        assert_eq!(x.kind, SymbolKind::Property);
        assert_eq!(x.parent.as_deref(), Some("point"));
    }

    #[test]
    fn union_is_a_type() {
        let facts = extract_c("union value {\n  int i;\n  float f;\n};\n");
        assert_eq!(find(&facts, "value").kind, SymbolKind::Type);
    }

    #[test]
    fn enum_members_are_constants() {
        let facts = extract_c("enum color { RED, GREEN };\n");
        assert_eq!(find(&facts, "color").kind, SymbolKind::Enum);
        let red = find(&facts, "RED");
        assert_eq!(red.kind, SymbolKind::Constant);
        assert_eq!(red.parent.as_deref(), Some("color"));
    }

    #[test]
    fn typedef_is_a_type() {
        let facts = extract_c("typedef unsigned long size_type;\n");
        assert_eq!(find(&facts, "size_type").kind, SymbolKind::Type);
    }

    #[test]
    fn block_comment_above_is_docstring() {
        let src = "/* Adds two integers. */\nint add(int a, int b) { return a + b; }\n";
        let facts = extract_c(src);
        assert_eq!(
            find(&facts, "add").docstring.as_deref(),
            Some("Adds two integers.")
        );
    }

    #[test]
    fn forward_declarations_are_skipped() {
        let facts = extract_c("struct opaque;\n");
        assert!(facts.symbols.is_empty());
    }
}
