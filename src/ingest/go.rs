//! Go symbol extraction.
//!
//! Emits the package clause, type declarations (struct → class, interface →
//! interface, otherwise type alias), functions and methods with their
//! receivers, `var`/`const` specs, short `:=` declarations inside function
//! bodies, and both individual and grouped imports. Exported-ness follows the
//! Go rule: an uppercase first letter.

use crate::ingest::pool::{self, Grammar};
use crate::ingest::{
    clean_comment_text, comments_above, field_text, first_line_signature, node_text, span_of,
    strip_specifier, EdgeKind, FileFacts, RawEdge, RawSymbol, SymbolKind,
};

pub fn extract(filepath: &str, source: &[u8]) -> FileFacts {
    let tree = match pool::with_parser(Grammar::Go, |parser| parser.parse(source, None)) {
        Ok(Some(tree)) => tree,
        _ => return FileFacts::default(),
    };

    let mut facts = FileFacts::default();
    walk(&tree.root_node(), source, filepath, None, &mut facts);
    facts
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

/// Godoc: the contiguous `//` block directly above a declaration.
fn godoc_above(node: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    let comments = comments_above(node, source);
    if comments.is_empty() || !comments.iter().all(|c| c.starts_with("//")) {
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
) {
    let exported = is_exported(&name);
    facts.symbols.push(RawSymbol {
        name,
        kind,
        start_row: node.start_position().row,
        location: span_of(node),
        signature: first_line_signature(node, source),
        docstring: godoc_above(node, source),
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
        "package_clause" => {
            if let Some(name) = name_child(node, source, "package_identifier") {
                push(facts, node, source, name, SymbolKind::Module, None);
            }
        }

        "import_declaration" => {
            collect_imports(node, source, filepath, facts);
        }

        "function_declaration" => {
            if let Some(name) = field_text(node, source, "name") {
                push(facts, node, source, name.clone(), SymbolKind::Function, owner);
                if let Some(body) = node.child_by_field_name("body") {
                    walk_children(&body, source, filepath, Some(&name), facts);
                }
            }
        }

        "method_declaration" => {
            if let Some(name) = field_text(node, source, "name") {
                let receiver = receiver_type(node, source);
                push(
                    facts,
                    node,
                    source,
                    name.clone(),
                    SymbolKind::Method,
                    receiver.as_deref(),
                );
                if let Some(body) = node.child_by_field_name("body") {
                    walk_children(&body, source, filepath, Some(&name), facts);
                }
            }
        }

        "type_declaration" => {
            let mut cursor = node.walk();
            for spec in node.children(&mut cursor) {
                if spec.kind() != "type_spec" {
                    continue;
                }
                let Some(name) = field_text(&spec, source, "name") else {
                    continue;
                };
                let type_node = spec.child_by_field_name("type");
                let kind = match type_node.as_ref().map(|t| t.kind()) {
                    Some("struct_type") => SymbolKind::Class,
                    Some("interface_type") => SymbolKind::Interface,
                    _ => SymbolKind::Type,
                };
                // Godoc sits above the type_declaration, not the spec.
                let doc = godoc_above(node, source);
                let exported = is_exported(&name);
                facts.symbols.push(RawSymbol {
                    name: name.clone(),
                    kind,
                    start_row: spec.start_position().row,
                    location: span_of(&spec),
                    signature: first_line_signature(&spec, source),
                    docstring: doc,
                    parent: owner.map(|s| s.to_string()),
                    exported,
                });
                if let Some(type_node) = type_node {
                    walk_type_members(&type_node, source, &name, facts);
                }
            }
        }

        "var_declaration" | "const_declaration" => {
            let kind = if node.kind() == "const_declaration" {
                SymbolKind::Constant
            } else {
                SymbolKind::Variable
            };
            let mut cursor = node.walk();
            for spec in node.children(&mut cursor) {
                match spec.kind() {
                    "var_spec" | "const_spec" => {
                        spec_names(&spec, source, |name| {
                            push(facts, &spec, source, name, kind, owner);
                        });
                    }
                    // `var ( … )` / `const ( … )` groups
                    "var_spec_list" | "const_spec_list" => {
                        let mut inner = spec.walk();
                        for grouped in spec.children(&mut inner) {
                            if matches!(grouped.kind(), "var_spec" | "const_spec") {
                                spec_names(&grouped, source, |name| {
                                    push(facts, &grouped, source, name, kind, owner);
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        // `x := …` inside a function body
        "short_var_declaration" => {
            if let Some(left) = node.child_by_field_name("left") {
                let mut cursor = left.walk();
                for ident in left.children(&mut cursor) {
                    if ident.kind() == "identifier" {
                        if let Some(name) = node_text(&ident, source) {
                            push(
                                facts,
                                node,
                                source,
                                name.to_string(),
                                SymbolKind::Variable,
                                owner,
                            );
                        }
                    }
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

/// Struct fields and interface method specs become children of the type.
fn walk_type_members(
    type_node: &tree_sitter::Node,
    source: &[u8],
    type_name: &str,
    facts: &mut FileFacts,
) {
    match type_node.kind() {
        "struct_type" => {
            let Some(list) = type_node
                .named_child(0)
                .filter(|n| n.kind() == "field_declaration_list")
            else {
                return;
            };
            let mut cursor = list.walk();
            for field in list.children(&mut cursor) {
                if field.kind() != "field_declaration" {
                    continue;
                }
                spec_names(&field, source, |name| {
                    push(
                        facts,
                        &field,
                        source,
                        name,
                        SymbolKind::Property,
                        Some(type_name),
                    );
                });
            }
        }
        "interface_type" => {
            let mut cursor = type_node.walk();
            for member in type_node.children(&mut cursor) {
                if matches!(member.kind(), "method_spec" | "method_elem") {
                    if let Some(name) = field_text(&member, source, "name") {
                        push(
                            facts,
                            &member,
                            source,
                            name,
                            SymbolKind::Method,
                            Some(type_name),
                        );
                    }
                }
            }
        }
        _ => {}
    }
}

/// All `name:` fields of a spec node (Go allows `var a, b int`).
fn spec_names(spec: &tree_sitter::Node, source: &[u8], mut f: impl FnMut(String)) {
    let mut cursor = spec.walk();
    for name_node in spec.children_by_field_name("name", &mut cursor) {
        if let Some(name) = node_text(&name_node, source) {
            f(name.to_string());
        }
    }
}

/// Receiver type of a method, stripped of pointer and package qualifiers:
/// `func (s *server) run()` → `server`.
fn receiver_type(node: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let text = node_text(&receiver, source)?;
    let inner = text.trim_matches(|c| c == '(' || c == ')');
    let type_part = inner.split_whitespace().last()?;
    let stripped = type_part.trim_start_matches('*');
    let base = stripped.rsplit('.').next().unwrap_or(stripped);
    // Drop generic instantiations: `list[T]` → `list`.
    let base = base.split('[').next().unwrap_or(base);
    (!base.is_empty()).then(|| base.to_string())
}

fn name_child(node: &tree_sitter::Node, source: &[u8], kind: &str) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == kind {
            return node_text(&child, source).map(|s| s.to_string());
        }
    }
    None
}

/// Both `import "x"` and `import ( "x"\n"y" )` forms.
fn collect_imports(
    node: &tree_sitter::Node,
    source: &[u8],
    filepath: &str,
    facts: &mut FileFacts,
) {
    fn emit(spec: &tree_sitter::Node, source: &[u8], filepath: &str, facts: &mut FileFacts) {
        if let Some(path) = spec
            .child_by_field_name("path")
            .and_then(|p| node_text(&p, source).map(|s| s.to_string()))
        {
            facts.edges.push(RawEdge {
                from: filepath.to_string(),
                to: strip_specifier(&path),
                kind: EdgeKind::Imports,
                location: Some(span_of(spec)),
            });
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_spec" => emit(&child, source, filepath, facts),
            "import_spec_list" => {
                let mut inner = child.walk();
                for spec in child.children(&mut inner) {
                    if spec.kind() == "import_spec" {
                        emit(&spec, source, filepath, facts);
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

    fn extract_go(source: &str) -> FileFacts {
        extract("/p/main.go", source.as_bytes())
    }

    fn find<'a>(facts: &'a FileFacts, name: &str) -> &'a RawSymbol {
        facts
            .symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("symbol {} not found in {:?}", name, facts.symbols))
    }

    #[test]
    fn package_and_function_extraction() {
        let facts = extract_go("package main\n\nfunc main() {\n}\n");
        assert_eq!(find(&facts, "main").kind, SymbolKind::Module);
        let f = facts
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Function)
            .unwrap();
        assert_eq!(f.name, "main");
        assert!(!f.exported); // lowercase
    }

    #[test]
    fn uppercase_names_are_exported() {
        let facts = extract_go("package lib\n\nfunc Run() {}\nfunc helper() {}\n");
        assert!(find(&facts, "Run").exported);
        assert!(!find(&facts, "helper").exported);
    }

    #[test]
    fn struct_maps_to_class_with_fields() {
        let src = "package lib\n\ntype Server struct {\n\tAddr string\n\tport int\n}\n";
        let facts = extract_go(src);
        let server = find(&facts, "Server");
        assert_eq!(server.kind, SymbolKind::Class);
        assert!(server.exported);

        let addr = find(&facts, "Addr");
        assert_eq!(addr.kind, SymbolKind::Property);
        assert_eq!(addr.parent.as_deref(), Some("Server"));
        assert!(!find(&facts, "port").exported);
    }

    #[test]
    fn interface_maps_to_interface_with_methods() {
        let src = "package lib\n\ntype Store interface {\n\tGet(key string) string\n}\n";
        let facts = extract_go(src);
        assert_eq!(find(&facts, "Store").kind, SymbolKind::Interface);
        let get = find(&facts, "Get");
        assert_eq!(get.kind, SymbolKind::Method);
        assert_eq!(get.parent.as_deref(), Some("Store"));
    }

    #[test]
    fn plain_type_declaration_is_a_type() {
        let facts = extract_go("package lib\n\ntype ID int64\n");
        assert_eq!(find(&facts, "ID").kind, SymbolKind::Type);
    }

    #[test]
    fn method_receiver_becomes_parent() {
        let src = "package lib\n\ntype server struct{}\n\nfunc (s *server) run() {}\n";
        let facts = extract_go(src);
        let run = find(&facts, "run");
        assert_eq!(run.kind, SymbolKind::Method);
        assert_eq!(run.parent.as_deref(), Some("server"));
    }

    #[test]
    fn grouped_imports_each_emit_an_edge() {
        let src = "package main\n\nimport (\n\t\"fmt\"\n\t\"net/http\"\n)\n\nimport \"os\"\n";
        let facts = extract_go(src);
        let targets: Vec<&str> = facts.edges.iter().map(|e| e.to.as_str()).collect();
        assert_eq!(targets, vec!["fmt", "net/http", "os"]);
        assert!(facts.edges.iter().all(|e| e.from == "/p/main.go"));
    }

    #[test]
    fn const_and_var_specs() {
        let src = "package lib\n\nconst MaxSize = 10\n\nvar (\n\tdebug bool\n\tName string\n)\n";
        let facts = extract_go(src);
        assert_eq!(find(&facts, "MaxSize").kind, SymbolKind::Constant);
        assert_eq!(find(&facts, "debug").kind, SymbolKind::Variable);
        assert!(find(&facts, "Name").exported);
    }

    #[test]
    fn short_declarations_attach_to_function() {
        let src = "package main\n\nfunc main() {\n\tcount := 1\n\t_ = count\n}\n";
        let facts = extract_go(src);
        let count = find(&facts, "count");
        assert_eq!(count.kind, SymbolKind::Variable);
        assert_eq!(count.parent.as_deref(), Some("main"));
    }

    #[test]
    fn godoc_block_is_attached() {
        let src = "package lib\n\n// Run starts the server.\n// It blocks until shutdown.\nfunc Run() {}\n";
        let facts = extract_go(src);
        let doc = find(&facts, "Run").docstring.as_deref().unwrap();
        assert!(doc.starts_with("Run starts the server."));
        assert!(doc.contains("blocks until shutdown"));
    }
}
