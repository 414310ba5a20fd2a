//! C++ symbol extraction.
//!
//! Everything the C walker covers, plus namespaces, classes with access
//! control (members after `public:` are exported; struct members default
//! to exported), inline and out-of-line methods (`Type::method` attaches to
//! `Type`), constructors, and base-class edges. Template declarations are
//! descended into.

use crate::ingest::c::{comment_doc_above, declarator_name, has_function_declarator, is_static};
use crate::ingest::pool::{self, Grammar};
use crate::ingest::{
    field_text, first_line_signature, node_text, span_of, strip_specifier, EdgeKind, FileFacts,
    RawEdge, RawSymbol, SymbolKind,
};

pub fn extract(filepath: &str, source: &[u8]) -> FileFacts {
    let tree = match pool::with_parser(Grammar::Cpp, |parser| parser.parse(source, None)) {
        Ok(Some(tree)) => tree,
        _ => return FileFacts::default(),
    };

    let mut facts = FileFacts::default();
    let ctx = Ctx {
        owner: None,
        in_class: false,
    };
    walk(&tree.root_node(), source, filepath, ctx, &mut facts);
    facts
}

/// Walk context: the enclosing named scope and whether it is a class-like
/// scope (methods) as opposed to a namespace (free functions).
#[derive(Clone, Copy)]
struct Ctx<'a> {
    owner: Option<&'a str>,
    in_class: bool,
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
        docstring: comment_doc_above(node, source),
        parent: parent.map(|s| s.to_string()),
        exported,
    });
}

fn walk(
    node: &tree_sitter::Node,
    source: &[u8],
    filepath: &str,
    ctx: Ctx,
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
                push(
                    facts,
                    node,
                    source,
                    name,
                    SymbolKind::Constant,
                    ctx.owner,
                    true,
                );
            }
        }

        "namespace_definition" => {
            if let Some(name) = field_text(node, source, "name") {
                push(
                    facts,
                    node,
                    source,
                    name.clone(),
                    SymbolKind::Namespace,
                    ctx.owner,
                    true,
                );
                if let Some(body) = node.child_by_field_name("body") {
                    let inner = Ctx {
                        owner: Some(&name),
                        in_class: false,
                    };
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        walk(&child, source, filepath, inner, facts);
                    }
                }
            }
        }

        "class_specifier" | "struct_specifier" => {
            walk_class(node, source, filepath, ctx, facts);
        }

        "union_specifier" => {
            if node.child_by_field_name("body").is_some() {
                if let Some(name) = field_text(node, source, "name") {
                    push(facts, node, source, name, SymbolKind::Type, ctx.owner, true);
                }
            }
        }

        "enum_specifier" => {
            let Some(body) = node.child_by_field_name("body") else {
                return;
            };
            let name = field_text(node, source, "name");
            if let Some(ref name) = name {
                push(
                    facts,
                    node,
                    source,
                    name.clone(),
                    SymbolKind::Enum,
                    ctx.owner,
                    true,
                );
            }
            let parent = name.as_deref().or(ctx.owner);
            let mut cursor = body.walk();
            for member in body.children(&mut cursor) {
                if member.kind() == "enumerator" {
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
            }
        }

        "function_definition" => {
            push_function(node, source, ctx, true, facts);
        }

        "declaration" => {
            let mut cursor = node.walk();
            for declarator in node.children_by_field_name("declarator", &mut cursor) {
                if has_function_declarator(&declarator) {
                    if let Some(name) = declarator_name(&declarator, source) {
                        let kind = if ctx.in_class {
                            SymbolKind::Method
                        } else {
                            SymbolKind::Function
                        };
                        push(
                            facts,
                            node,
                            source,
                            name,
                            kind,
                            ctx.owner,
                            !is_static(node, source),
                        );
                    }
                }
            }
        }

        "type_definition" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some(name) = declarator_name(&declarator, source) {
                    push(facts, node, source, name, SymbolKind::Type, ctx.owner, true);
                }
            }
        }

        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(&child, source, filepath, ctx, facts);
            }
        }
    }
}

/// A free function, an inline method, or an out-of-line `Type::method`.
fn push_function(
    node: &tree_sitter::Node,
    source: &[u8],
    ctx: Ctx,
    member_exported: bool,
    facts: &mut FileFacts,
) {
    let Some(declarator) = node.child_by_field_name("declarator") else {
        return;
    };

    // Out-of-line definition: `void Engine::start() { … }`
    if let Some((scope, raw_name)) = qualified_name(&declarator, source) {
        let is_dtor = raw_name.starts_with('~');
        let name = raw_name.trim_start_matches('~').to_string();
        let kind = if !is_dtor && scope == name {
            SymbolKind::Constructor
        } else {
            SymbolKind::Method
        };
        push(facts, node, source, name, kind, Some(&scope), true);
        return;
    }

    let Some(name) = declarator_name(&declarator, source) else {
        return;
    };
    let kind = if ctx.in_class {
        match ctx.owner {
            Some(class_name) if name == class_name => SymbolKind::Constructor,
            _ => SymbolKind::Method,
        }
    } else {
        SymbolKind::Function
    };
    let exported = if ctx.in_class {
        member_exported
    } else {
        !is_static(node, source)
    };
    push(facts, node, source, name, kind, ctx.owner, exported);
}

/// Split a `qualified_identifier` declarator into `(scope, name)`.
fn qualified_name(declarator: &tree_sitter::Node, source: &[u8]) -> Option<(String, String)> {
    let mut node = *declarator;
    loop {
        if node.kind() == "qualified_identifier" {
            let scope = field_text(&node, source, "scope")?;
            let name = field_text(&node, source, "name")?;
            let scope = scope.rsplit("::").next().unwrap_or(&scope).to_string();
            return Some((scope, name));
        }
        node = node.child_by_field_name("declarator")?;
    }
}

/// Class or struct with access-controlled members.
fn walk_class(
    node: &tree_sitter::Node,
    source: &[u8],
    filepath: &str,
    ctx: Ctx,
    facts: &mut FileFacts,
) {
    let Some(body) = node.child_by_field_name("body") else {
        return; // forward declaration
    };
    let Some(name) = field_text(node, source, "name") else {
        return;
    };

    let is_struct = node.kind() == "struct_specifier";
    let kind = if is_struct {
        SymbolKind::Interface
    } else {
        SymbolKind::Class
    };
    push(facts, node, source, name.clone(), kind, ctx.owner, true);

    // Base classes become extends edges by name.
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "base_class_clause" {
            let mut inner = child.walk();
            for base in child.children(&mut inner) {
                if base.kind() == "type_identifier" {
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
    }

    let member_ctx = Ctx {
        owner: Some(&name),
        in_class: true,
    };
    let mut public = is_struct;
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        match member.kind() {
            "access_specifier" => {
                public = node_text(&member, source)
                    .map(|t| t.starts_with("public"))
                    .unwrap_or(false);
            }
            "function_definition" => {
                push_function(&member, source, member_ctx, public, facts);
            }
            "field_declaration" => {
                let Some(declarator) = member.child_by_field_name("declarator") else {
                    continue;
                };
                let Some(member_name) = declarator_name(&declarator, source) else {
                    continue;
                };
                let member_kind = if has_function_declarator(&declarator) {
                    if member_name == name {
                        SymbolKind::Constructor
                    } else {
                        SymbolKind::Method
                    }
                } else {
                    SymbolKind::Property
                };
                push(
                    facts,
                    &member,
                    source,
                    member_name,
                    member_kind,
                    Some(&name),
                    public,
                );
            }
            _ => walk(&member, source, filepath, member_ctx, facts),
        }
    }
}
