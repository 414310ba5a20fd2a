//! End-to-end pipeline tests over the in-memory backend.
//!
//! Each test indexes a real fixture tree in a tempdir and asserts against
//! the query surface, exercising scan → extract → resolve → persist →
//! PageRank as one pipeline.

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use sextant::{
    Config, DependentsOptions, EdgeKind, GraphAnalytics, GraphStore, IndexOptions, Indexer,
    MemoryBackend, QueryService, SearchFilter,
};

fn test_config() -> Config {
    let mut config = Config::default();
    config.git.enabled = false;
    config
}

fn new_indexer() -> Indexer {
    let store = Arc::new(GraphStore::new(Arc::new(MemoryBackend::new()), "sextant"));
    Indexer::new(store, test_config())
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

fn incremental() -> IndexOptions {
    IndexOptions {
        force: false,
        incremental: true,
    }
}

#[tokio::test]
async fn empty_project_produces_zero_stats() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "README.md", "# not indexable");
    write(dir.path(), "node_modules/x/index.ts", "export class X {}");

    let indexer = new_indexer();
    let stats = indexer
        .index_project(dir.path(), IndexOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(stats.files_indexed, 0);
    assert_eq!(stats.symbols_found, 0);
    assert_eq!(stats.dependencies_found, 0);
    assert!(stats.errors.is_empty());

    let service = QueryService::new(Arc::clone(indexer.store()), &test_config());
    let overview = service.get_project_overview(10, false).await.unwrap();
    let stats = overview.metadata.unwrap().stats;
    assert_eq!(stats.files, 0);
    assert_eq!(stats.symbols, 0);
    assert_eq!(stats.edges, 0);
}

#[tokio::test]
async fn two_file_typescript_dependency() {
    let dir = tempfile::TempDir::new().unwrap();
    let a = write(dir.path(), "a.ts", "export class A {}\n");
    let b = write(
        dir.path(),
        "b.ts",
        "import { A } from \"./a\";\nclass B extends A {}\n",
    );

    let indexer = new_indexer();
    indexer
        .index_project(dir.path(), IndexOptions::default(), None)
        .await
        .unwrap();

    let a_id = format!("{}:A:0", a);
    let b_id = format!("{}:B:1", b);

    let service = QueryService::new(Arc::clone(indexer.store()), &test_config());

    // `A` ranks above `B` in search results.
    let hits = service
        .search_symbols("*", &SearchFilter::default())
        .await
        .unwrap();
    let pos = |id: &str| hits.iter().position(|s| s.id == id).unwrap();
    assert!(pos(&a_id) < pos(&b_id));

    // The dependents of A include B with an extends edge.
    let report = service
        .get_dependents(&a_id, 1, &DependentsOptions::default())
        .await
        .unwrap();
    assert_eq!(report.direct.len(), 1);
    assert_eq!(report.direct[0].from, b_id);
    assert_eq!(report.direct[0].kind, EdgeKind::Extends);
}

#[tokio::test]
async fn impact_suggests_dependencies_first() {
    let dir = tempfile::TempDir::new().unwrap();
    // One-line bindings: signatures carry the call chain x → y → z.
    let f = write(
        dir.path(),
        "f.ts",
        "const z = () => 1;\nconst y = () => z();\nconst x = () => y();\n",
    );

    let indexer = new_indexer();
    indexer
        .index_project(dir.path(), IndexOptions::default(), None)
        .await
        .unwrap();

    let service = QueryService::new(Arc::clone(indexer.store()), &test_config());
    let report = service
        .get_impact(&[f.clone()], &DependentsOptions::default())
        .await
        .unwrap();

    let position = |name: &str| {
        report
            .suggested_order
            .iter()
            .position(|id| id.contains(&format!(":{}:", name)))
            .unwrap_or_else(|| panic!("{} missing from {:?}", name, report.suggested_order))
    };
    assert!(position("z") < position("y"));
    assert!(position("y") < position("x"));
}

#[tokio::test]
async fn mutually_referencing_functions_form_a_cycle() {
    let dir = tempfile::TempDir::new().unwrap();
    let f = write(
        dir.path(),
        "loop.ts",
        "const ping = () => pong();\nconst pong = () => ping();\n",
    );

    let indexer = new_indexer();
    indexer
        .index_project(dir.path(), IndexOptions::default(), None)
        .await
        .unwrap();

    let analytics = GraphAnalytics::new(indexer.store());
    let cycles = analytics.find_cycles().await.unwrap();

    let ping_id = format!("{}:ping:0", f);
    let pong_id = format!("{}:pong:1", f);
    assert!(
        cycles
            .iter()
            .any(|cycle| cycle.contains(&ping_id) && cycle.contains(&pong_id)),
        "no ping/pong cycle in {:?}",
        cycles
    );
}

#[tokio::test]
async fn deleting_a_file_removes_every_trace() {
    let dir = tempfile::TempDir::new().unwrap();
    let a = write(dir.path(), "a.ts", "export class A {}\n");
    write(
        dir.path(),
        "b.ts",
        "import { A } from \"./a\";\nclass B extends A {}\n",
    );

    let indexer = new_indexer();
    indexer
        .index_project(dir.path(), incremental(), None)
        .await
        .unwrap();
    let a_id = format!("{}:A:0", a);
    assert!(!indexer
        .store()
        .dependents_of(&a_id)
        .await
        .unwrap()
        .is_empty());

    std::fs::remove_file(&a).unwrap();
    indexer
        .index_project(dir.path(), incremental(), None)
        .await
        .unwrap();

    assert!(indexer.store().symbols_in_file(&a).await.unwrap().is_empty());
    for edge in indexer.store().all_edges().await.unwrap() {
        assert_ne!(edge.from, a_id);
        assert_ne!(edge.to, a_id);
    }
}

#[tokio::test]
async fn heavily_referenced_class_outranks_a_leaf() {
    let dir = tempfile::TempDir::new().unwrap();
    let core = write(dir.path(), "core.ts", "export class Core {}\n");
    let leaf = write(dir.path(), "leaf.ts", "export class Leaf {}\n");
    for i in 0..20 {
        write(
            dir.path(),
            &format!("user{}.ts", i),
            &format!(
                "import {{ Core }} from \"./core\";\nexport class User{} extends Core {{}}\n",
                i
            ),
        );
    }

    let indexer = new_indexer();
    indexer
        .index_project(dir.path(), IndexOptions::default(), None)
        .await
        .unwrap();

    let core_id = format!("{}:Core:0", core);
    let leaf_id = format!("{}:Leaf:0", leaf);

    let core_rank = indexer
        .store()
        .page_rank_of(&core_id)
        .await
        .unwrap()
        .unwrap();
    let leaf_rank = indexer
        .store()
        .page_rank_of(&leaf_id)
        .await
        .unwrap()
        .unwrap();
    assert!(core_rank > leaf_rank);

    let analytics = GraphAnalytics::new(indexer.store());
    let top = analytics.top_symbols(1).await.unwrap();
    assert_eq!(top[0].0.id, core_id);
}

#[tokio::test]
async fn reindex_without_changes_is_idempotent() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "a.ts", "export class A {}\n");
    write(
        dir.path(),
        "b.ts",
        "import { A } from \"./a\";\nexport const make = () => new A();\n",
    );

    let indexer = new_indexer();
    indexer
        .index_project(dir.path(), incremental(), None)
        .await
        .unwrap();
    let symbols = indexer.store().all_symbol_ids().await.unwrap();
    let edges = indexer.store().all_edges().await.unwrap();
    let ranks = indexer.store().top_ranked(100).await.unwrap();

    indexer
        .index_project(dir.path(), incremental(), None)
        .await
        .unwrap();

    assert_eq!(indexer.store().all_symbol_ids().await.unwrap(), symbols);
    assert_eq!(indexer.store().all_edges().await.unwrap(), edges);
    let ranks_after = indexer.store().top_ranked(100).await.unwrap();
    assert_eq!(ranks.len(), ranks_after.len());
    for ((id_a, score_a), (id_b, score_b)) in ranks.iter().zip(ranks_after.iter()) {
        assert_eq!(id_a, id_b);
        assert!((score_a - score_b).abs() < 1e-9);
    }
}

#[tokio::test]
async fn incremental_matches_full_reindex_after_mutations() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "a.ts", "export class A {}\n");
    let b = write(
        dir.path(),
        "b.ts",
        "import { A } from \"./a\";\nclass B extends A {}\n",
    );

    // Indexer one: full index, then apply mutations, then incremental.
    let tracking_indexer = new_indexer();
    tracking_indexer
        .index_project(dir.path(), incremental(), None)
        .await
        .unwrap();

    std::thread::sleep(std::time::Duration::from_millis(20));
    std::fs::write(
        &b,
        "import { A } from \"./a\";\nclass B extends A {}\nexport const go = () => new A();\n",
    )
    .unwrap();
    let c = write(dir.path(), "c.ts", "export function lone() {}\n");

    tracking_indexer
        .index_project(dir.path(), incremental(), None)
        .await
        .unwrap();

    // Indexer two: one full pass over the final tree.
    let fresh_indexer = new_indexer();
    fresh_indexer
        .index_project(dir.path(), IndexOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(
        tracking_indexer.store().all_symbol_ids().await.unwrap(),
        fresh_indexer.store().all_symbol_ids().await.unwrap()
    );
    assert_eq!(
        tracking_indexer.store().all_edges().await.unwrap(),
        fresh_indexer.store().all_edges().await.unwrap()
    );
    // Both see the new file.
    assert!(!tracking_indexer
        .store()
        .symbols_in_file(&c)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn oversized_files_leave_no_trace() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = test_config();
    config.indexer.max_file_size = 64;

    let big = write(
        dir.path(),
        "big.ts",
        &format!("export class Big {{}} // {}\n", "x".repeat(100)),
    );
    write(dir.path(), "small.ts", "export class Small {}\n");

    let store = Arc::new(GraphStore::new(Arc::new(MemoryBackend::new()), "sextant"));
    let indexer = Indexer::new(store, config);
    let stats = indexer
        .index_project(dir.path(), IndexOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(stats.files_indexed, 1);
    assert!(indexer.store().symbols_in_file(&big).await.unwrap().is_empty());
    assert!(indexer.store().file_tracking(&big).await.unwrap().is_none());
}

#[tokio::test]
async fn multi_language_project_indexes_every_walker() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "app.ts", "export class App {}\n");
    write(dir.path(), "util.py", "def helper():\n    pass\n");
    write(dir.path(), "main.go", "package main\n\nfunc main() {}\n");
    write(dir.path(), "lib.rs", "pub fn run() {}\n");
    write(dir.path(), "App.java", "public class App {}\n");
    write(dir.path(), "util.c", "int add(int a, int b) { return a + b; }\n");
    write(
        dir.path(),
        "engine.cpp",
        "class Engine {\npublic:\n  void start() {}\n};\n",
    );

    let indexer = new_indexer();
    let stats = indexer
        .index_project(dir.path(), IndexOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(stats.files_indexed, 7);
    assert!(stats.errors.is_empty());

    let languages: std::collections::HashSet<String> = {
        let mut set = std::collections::HashSet::new();
        for id in indexer.store().all_symbol_ids().await.unwrap() {
            if let Some(symbol) = indexer.store().get_symbol(&id).await.unwrap() {
                set.insert(symbol.language);
            }
        }
        set
    };
    for expected in ["typescript", "python", "go", "rust", "java", "c", "cpp"] {
        assert!(languages.contains(expected), "missing {}", expected);
    }
}

#[tokio::test]
async fn pagerank_values_sum_to_one_after_indexing() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "a.ts", "export class A {}\nexport class B {}\n");

    let indexer = new_indexer();
    indexer
        .index_project(dir.path(), IndexOptions::default(), None)
        .await
        .unwrap();

    let ranked = indexer.store().top_ranked(1000).await.unwrap();
    let total: f64 = ranked.iter().map(|(_, score)| score).sum();
    assert!((total - 1.0).abs() < 1e-9);

    // Sorted-set scores equal the mirrored pageRank field.
    for (id, score) in ranked {
        let mirrored = indexer
            .store()
            .get_symbol(&id)
            .await
            .unwrap()
            .unwrap()
            .page_rank
            .unwrap();
        assert!((score - mirrored).abs() < f64::EPSILON);
    }
}
