//! Thread-local parser pool for reusing tree-sitter Parser instances.
//!
//! Creating a `tree_sitter::Parser` per file is measurable overhead during
//! batch extraction. The pool keeps one parser per grammar per thread:
//! lazy initialization, `RefCell` access, no locks. Extraction tasks run on
//! blocking worker threads, so each worker warms its own set once.

use anyhow::Result;
use std::cell::RefCell;
use std::thread::LocalKey;

use crate::ingest::detect::Language;

/// Grammar selection. Distinct from [`Language`] because TypeScript source
/// splits across two grammars (`.ts` vs `.tsx`) and JavaScript has its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Grammar {
    Rust,
    Python,
    Go,
    C,
    Cpp,
    Java,
    JavaScript,
    TypeScript,
    Tsx,
}

impl Grammar {
    /// Pick the grammar for a source file.
    pub(crate) fn for_file(language: Language, path: &str) -> Grammar {
        match language {
            Language::TypeScript => {
                if path.ends_with(".tsx") {
                    Grammar::Tsx
                } else {
                    Grammar::TypeScript
                }
            }
            Language::JavaScript => Grammar::JavaScript,
            Language::Python => Grammar::Python,
            Language::Go => Grammar::Go,
            Language::Rust => Grammar::Rust,
            Language::Java => Grammar::Java,
            Language::C => Grammar::C,
            Language::Cpp => Grammar::Cpp,
        }
    }

    fn language(&self) -> tree_sitter::Language {
        match self {
            Grammar::Rust => tree_sitter_rust::language(),
            Grammar::Python => tree_sitter_python::language(),
            Grammar::Go => tree_sitter_go::language(),
            Grammar::C => tree_sitter_c::language(),
            Grammar::Cpp => tree_sitter_cpp::language(),
            Grammar::Java => tree_sitter_java::language(),
            Grammar::JavaScript => tree_sitter_javascript::language(),
            Grammar::TypeScript => tree_sitter_typescript::language_typescript(),
            Grammar::Tsx => tree_sitter_typescript::language_tsx(),
        }
    }
}

thread_local! {
    static RUST_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static PYTHON_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static GO_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static C_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static CPP_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static JAVA_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static JAVASCRIPT_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static TYPESCRIPT_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static TSX_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
}

fn slot_for(grammar: Grammar) -> &'static LocalKey<RefCell<Option<tree_sitter::Parser>>> {
    match grammar {
        Grammar::Rust => &RUST_PARSER,
        Grammar::Python => &PYTHON_PARSER,
        Grammar::Go => &GO_PARSER,
        Grammar::C => &C_PARSER,
        Grammar::Cpp => &CPP_PARSER,
        Grammar::Java => &JAVA_PARSER,
        Grammar::JavaScript => &JAVASCRIPT_PARSER,
        Grammar::TypeScript => &TYPESCRIPT_PARSER,
        Grammar::Tsx => &TSX_PARSER,
    }
}

/// Run `f` with this thread's parser for `grammar`, initializing it on
/// first use.
pub(crate) fn with_parser<F, R>(grammar: Grammar, f: F) -> Result<R>
where
    F: FnOnce(&mut tree_sitter::Parser) -> R,
{
    slot_for(grammar).with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            let mut parser = tree_sitter::Parser::new();
            parser.set_language(&grammar.language())?;
            *slot = Some(parser);
        }
        let parser = slot
            .as_mut()
            .expect("parser slot initialized immediately above");
        Ok(f(parser))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_parses_and_reuses() {
        let first = with_parser(Grammar::Rust, |parser| {
            parser.parse("fn a() {}", None).is_some()
        })
        .unwrap();
        assert!(first);

        // Second call on the same thread reuses the warmed parser.
        let second = with_parser(Grammar::Rust, |parser| {
            parser.parse("fn b() {}", None).is_some()
        })
        .unwrap();
        assert!(second);
    }

    #[test]
    fn grammar_selection_splits_ts_and_tsx() {
        assert_eq!(
            Grammar::for_file(Language::TypeScript, "/p/a.ts"),
            Grammar::TypeScript
        );
        assert_eq!(
            Grammar::for_file(Language::TypeScript, "/p/a.tsx"),
            Grammar::Tsx
        );
        assert_eq!(
            Grammar::for_file(Language::JavaScript, "/p/a.jsx"),
            Grammar::JavaScript
        );
    }

    #[test]
    fn every_grammar_loads() {
        for grammar in [
            Grammar::Rust,
            Grammar::Python,
            Grammar::Go,
            Grammar::C,
            Grammar::Cpp,
            Grammar::Java,
            Grammar::JavaScript,
            Grammar::TypeScript,
            Grammar::Tsx,
        ] {
            assert!(with_parser(grammar, |_| ()).is_ok(), "{:?}", grammar);
        }
    }
}
