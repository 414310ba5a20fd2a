//! Python symbol extraction.
//!
//! Emits classes and their methods, functions, module-level assignments
//! (`ALL_CAPS` names become constants), `self.*` assignments as properties of
//! the enclosing class, and `import`/`from … import` statements as
//! file→module edges. Decorated definitions are descended past their
//! decorators. Docstrings are the triple-quoted first expression of a body.

use crate::ingest::pool::{self, Grammar};
use crate::ingest::{
    field_text, first_line_signature, node_text, span_of, EdgeKind, FileFacts, RawEdge, RawSymbol,
    SymbolKind,
};

pub fn extract(filepath: &str, source: &[u8]) -> FileFacts {
    let tree = match pool::with_parser(Grammar::Python, |parser| parser.parse(source, None)) {
        Ok(Some(tree)) => tree,
        _ => return FileFacts::default(),
    };

    let mut facts = FileFacts::default();
    let ctx = Ctx {
        filepath,
        class: None,
        owner: None,
    };
    walk(&tree.root_node(), source, &ctx, &mut facts);
    facts
}

/// Walk context: the enclosing class (for `self.*` properties) and the
/// immediate lexical owner (for parent links).
#[derive(Clone, Copy)]
struct Ctx<'a> {
    filepath: &'a str,
    class: Option<&'a str>,
    owner: Option<&'a str>,
}

fn walk(node: &tree_sitter::Node, source: &[u8], ctx: &Ctx, facts: &mut FileFacts) {
    match node.kind() {
        // Skip decorators, keep the definition.
        "decorated_definition" => {
            if let Some(definition) = node.child_by_field_name("definition") {
                walk(&definition, source, ctx, facts);
            }
        }

        "class_definition" => {
            if let Some(name) = field_text(node, source, "name") {
                facts.symbols.push(RawSymbol {
                    name: name.clone(),
                    kind: SymbolKind::Class,
                    start_row: node.start_position().row,
                    location: span_of(node),
                    signature: first_line_signature(node, source),
                    docstring: body_docstring(node, source),
                    parent: ctx.owner.map(|s| s.to_string()),
                    exported: ctx.owner.is_none(),
                });

                // Base classes become extends edges by name; non-local bases
                // are dropped during normalisation.
                if let Some(superclasses) = node.child_by_field_name("superclasses") {
                    let mut cursor = superclasses.walk();
                    for base in superclasses.children(&mut cursor) {
                        if base.kind() == "identifier" {
                            if let Some(base_name) = node_text(&base, source) {
                                facts.edges.push(RawEdge {
                                    from: name.clone(),
                                    to: base_name.to_string(),
                                    kind: EdgeKind::Extends,
                                    location: Some(span_of(&base)),
                                });
                            }
                        }
                    }
                }

                if let Some(body) = node.child_by_field_name("body") {
                    let inner = Ctx {
                        class: Some(&name),
                        owner: Some(&name),
                        ..*ctx
                    };
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        walk(&child, source, &inner, facts);
                    }
                }
            }
        }

        "function_definition" => {
            if let Some(name) = field_text(node, source, "name") {
                let in_class = ctx.owner.is_some() && ctx.owner == ctx.class;
                let kind = if in_class {
                    if name == "__init__" {
                        SymbolKind::Constructor
                    } else {
                        SymbolKind::Method
                    }
                } else {
                    SymbolKind::Function
                };
                facts.symbols.push(RawSymbol {
                    name: name.clone(),
                    kind,
                    start_row: node.start_position().row,
                    location: span_of(node),
                    signature: first_line_signature(node, source),
                    docstring: body_docstring(node, source),
                    parent: ctx.owner.map(|s| s.to_string()),
                    exported: ctx.owner.is_none(),
                });

                if let Some(body) = node.child_by_field_name("body") {
                    let inner = Ctx {
                        owner: Some(&name),
                        ..*ctx
                    };
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        walk(&child, source, &inner, facts);
                    }
                }
            }
        }

        "expression_statement" => {
            if let Some(assignment) = node.named_child(0).filter(|n| n.kind() == "assignment") {
                walk_assignment(&assignment, source, ctx, facts);
            }
        }

        // `import a.b, c`
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                let module = match child.kind() {
                    "dotted_name" => node_text(&child, source).map(|s| s.to_string()),
                    "aliased_import" => field_text(&child, source, "name"),
                    _ => None,
                };
                if let Some(module) = module {
                    facts.edges.push(RawEdge {
                        from: ctx.filepath.to_string(),
                        to: module,
                        kind: EdgeKind::Imports,
                        location: Some(span_of(node)),
                    });
                }
            }
        }

        // `from x.y import z`
        "import_from_statement" => {
            if let Some(module) = field_text(node, source, "module_name") {
                facts.edges.push(RawEdge {
                    from: ctx.filepath.to_string(),
                    to: module,
                    kind: EdgeKind::Imports,
                    location: Some(span_of(node)),
                });
            }
        }

        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(&child, source, ctx, facts);
            }
        }
    }
}

/// Module-level `NAME = …` and method-level `self.name = …` assignments.
fn walk_assignment(
    assignment: &tree_sitter::Node,
    source: &[u8],
    ctx: &Ctx,
    facts: &mut FileFacts,
) {
    let Some(left) = assignment.child_by_field_name("left") else {
        return;
    };

    match left.kind() {
        "identifier" if ctx.owner.is_none() || ctx.owner == ctx.class => {
            // Module-level or class-level binding.
            let Some(name) = node_text(&left, source) else {
                return;
            };
            let kind = if is_screaming_case(name) {
                SymbolKind::Constant
            } else {
                SymbolKind::Variable
            };
            facts.symbols.push(RawSymbol {
                name: name.to_string(),
                kind,
                start_row: assignment.start_position().row,
                location: span_of(assignment),
                signature: first_line_signature(assignment, source),
                docstring: None,
                parent: ctx.owner.map(|s| s.to_string()),
                exported: ctx.owner.is_none(),
            });
        }
        "attribute" => {
            // `self.x = …` inside a method body.
            let Some(class_name) = ctx.class else {
                return;
            };
            let object = left
                .child_by_field_name("object")
                .and_then(|n| node_text(&n, source).map(|s| s.to_string()));
            if object.as_deref() != Some("self") {
                return;
            }
            if let Some(attr) = field_text(&left, source, "attribute") {
                facts.symbols.push(RawSymbol {
                    name: attr,
                    kind: SymbolKind::Property,
                    start_row: assignment.start_position().row,
                    location: span_of(assignment),
                    signature: first_line_signature(assignment, source),
                    docstring: None,
                    parent: Some(class_name.to_string()),
                    exported: false,
                });
            }
        }
        _ => {}
    }
}

/// `ALL_CAPS_WITH_UNDERSCORES` convention for constants.
fn is_screaming_case(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Triple-quoted first expression of a `body` block.
fn body_docstring(node: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    let text = node_text(&string, source)?;
    let text = text.trim_start_matches(|c: char| c.is_ascii_alphabetic()); // r/b/f prefixes
    let cleaned = text.trim_matches(|c| c == '"' || c == '\'').trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_py(source: &str) -> FileFacts {
        extract("/p/app.py", source.as_bytes())
    }

    fn find<'a>(facts: &'a FileFacts, name: &str) -> &'a RawSymbol {
        facts
            .symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("symbol {} not found in {:?}", name, facts.symbols))
    }

    #[test]
    fn extracts_class_with_methods_and_init() {
        let src = "class Engine:\n    def __init__(self):\n        self.speed = 0\n    def start(self):\n        pass\n";
        let facts = extract_py(src);

        assert_eq!(find(&facts, "Engine").kind, SymbolKind::Class);
        assert_eq!(find(&facts, "__init__").kind, SymbolKind::Constructor);
        let start = find(&facts, "start");
        assert_eq!(start.kind, SymbolKind::Method);
        assert_eq!(start.parent.as_deref(), Some("Engine"));
        assert!(!start.exported);

        let speed = find(&facts, "speed");
        assert_eq!(speed.kind, SymbolKind::Property);
        assert_eq!(speed.parent.as_deref(), Some("Engine"));
    }

    #[test]
    fn top_level_definitions_are_exported() {
        let facts = extract_py("def run():\n    pass\n\nclass App:\n    pass\n");
        assert!(find(&facts, "run").exported);
        assert!(find(&facts, "App").exported);
    }

    #[test]
    fn screaming_case_assignment_is_a_constant() {
        let facts = extract_py("MAX_RETRIES = 3\ncounter = 0\n");
        assert_eq!(find(&facts, "MAX_RETRIES").kind, SymbolKind::Constant);
        assert_eq!(find(&facts, "counter").kind, SymbolKind::Variable);
    }

    #[test]
    fn imports_become_file_to_module_edges() {
        let facts = extract_py("import os.path\nfrom collections import OrderedDict\n");
        assert_eq!(facts.edges.len(), 2);
        assert_eq!(facts.edges[0].from, "/p/app.py");
        assert_eq!(facts.edges[0].to, "os.path");
        assert_eq!(facts.edges[1].to, "collections");
        assert!(facts.edges.iter().all(|e| e.kind == EdgeKind::Imports));
    }

    #[test]
    fn base_classes_emit_extends_edges() {
        let facts = extract_py("class Base:\n    pass\n\nclass Child(Base):\n    pass\n");
        let extends: Vec<_> = facts
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Extends)
            .collect();
        assert_eq!(extends.len(), 1);
        assert_eq!(extends[0].from, "Child");
        assert_eq!(extends[0].to, "Base");
    }

    #[test]
    fn docstring_is_first_string_of_body() {
        let src = "def area(r):\n    \"\"\"Circle area.\"\"\"\n    return 3.14 * r * r\n";
        let facts = extract_py(src);
        assert_eq!(find(&facts, "area").docstring.as_deref(), Some("Circle area."));
    }

    #[test]
    fn decorated_definitions_descend_past_decorators() {
        let src = "@staticmethod\ndef helper():\n    pass\n";
        let facts = extract_py(src);
        let helper = find(&facts, "helper");
        assert_eq!(helper.kind, SymbolKind::Function);
        // Row of the `def`, not the decorator.
        assert_eq!(helper.start_row, 1);
    }

    #[test]
    fn nested_function_is_not_exported() {
        let facts = extract_py("def outer():\n    def inner():\n        pass\n");
        let inner = find(&facts, "inner");
        assert!(!inner.exported);
        assert_eq!(inner.parent.as_deref(), Some("outer"));
    }

    #[test]
    fn malformed_source_yields_partial_facts() {
        let facts = extract_py("def good():\n    pass\n\ndef (((\n");
        assert!(facts.symbols.iter().any(|s| s.name == "good"));
    }
}
