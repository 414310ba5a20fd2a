//! Persistent graph store.
//!
//! The store is a namespaced graph database over primitive containers:
//! hashes for symbol and edge records, sets for indexes and adjacency,
//! a sorted set for PageRank, and scalars for tracking and metadata.
//!
//! [`StoreBackend`] is the primitive-container contract; [`RedisBackend`]
//! talks to a Redis/Valkey server and [`MemoryBackend`] keeps everything in
//! process for tests and embedded use. [`GraphStore`] is the typed handle
//! everything else works through: it owns the project context (the
//! namespace) behind a `tokio::sync::RwLock` so a context switch never
//! interleaves with in-flight reads or writes, and it expresses the two
//! compound mutations (add edge, remove symbol) as atomic write batches so
//! readers never observe torn edges or half-removed symbols.

pub mod keys;
pub mod memory;
pub mod redis;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ingest::{EdgeKind, SymbolKind};
use crate::model::{Edge, FileTracking, ProjectMetadata, ProjectStats, Span, Symbol};

/// One primitive write operation inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Put { key: String, value: String },
    Delete { key: String },
    HashPut { key: String, fields: Vec<(String, String)> },
    HashSetField { key: String, field: String, value: String },
    SetAdd { key: String, member: String },
    SetRemove { key: String, member: String },
    ZAdd { key: String, member: String, score: f64 },
    ZRemove { key: String, member: String },
}

/// Primitive container operations every backend must provide.
///
/// Single operations either succeed fully or leave state unchanged.
/// [`StoreBackend::apply`] executes a whole batch atomically: concurrent
/// readers observe either none or all of its effects.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Round-trip liveness check; used to fail fast at initialisation.
    async fn ping(&self) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>>;
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Members of a sorted set with scores, highest first. `limit` of
    /// `None` returns everything.
    async fn zset_range_desc(&self, key: &str, limit: Option<usize>)
        -> Result<Vec<(String, f64)>>;
    async fn zset_score(&self, key: &str, member: &str) -> Result<Option<f64>>;

    /// Set-if-absent with a TTL in milliseconds. Returns whether the key
    /// was set (the advisory-lock acquire primitive).
    async fn set_nx_ttl(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool>;

    /// Execute a batch of writes atomically.
    async fn apply(&self, ops: Vec<StoreOp>) -> Result<()>;

    /// All keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Sorted-set rewrite batch size for [`GraphStore::set_page_ranks`].
const PAGERANK_BATCH: usize = 500;

/// The typed store handle.
///
/// All keys are scoped `<prefix>:<project>:…`; the project component is
/// switched with [`GraphStore::set_project_context`].
pub struct GraphStore {
    backend: Arc<dyn StoreBackend>,
    key_prefix: String,
    project: RwLock<String>,
}

impl GraphStore {
    pub fn new(backend: Arc<dyn StoreBackend>, key_prefix: impl Into<String>) -> Self {
        Self {
            backend,
            key_prefix: key_prefix.into(),
            project: RwLock::new("default".to_string()),
        }
    }

    /// Switch the namespace to the project rooted at `root`.
    ///
    /// Takes the context write lock, so the switch waits for in-flight
    /// operations and no operation starts under a half-switched context.
    pub async fn set_project_context(&self, root: &str) -> String {
        let name = keys::project_name(root);
        let mut project = self.project.write().await;
        *project = name.clone();
        name
    }

    pub async fn project_context(&self) -> String {
        self.project.read().await.clone()
    }

    fn key(&self, project: &str, suffix: &str) -> String {
        format!("{}:{}:{}", self.key_prefix, project, suffix)
    }

    // -----------------------------------------------------------------------
    // Symbols
    // -----------------------------------------------------------------------

    /// Insert or replace a batch of symbols with their index-set
    /// memberships, as one atomic batch.
    pub async fn add_symbols(&self, symbols: &[Symbol]) -> Result<()> {
        if symbols.is_empty() {
            return Ok(());
        }
        let project = self.project.read().await;
        let mut ops = Vec::with_capacity(symbols.len() * 4);
        for symbol in symbols {
            ops.push(StoreOp::HashPut {
                key: self.key(&project, &keys::symbol_key(&symbol.id)),
                fields: symbol_fields(symbol),
            });
            ops.push(StoreOp::SetAdd {
                key: self.key(&project, &keys::file_index_key(&symbol.filepath)),
                member: symbol.id.clone(),
            });
            ops.push(StoreOp::SetAdd {
                key: self.key(&project, &keys::name_index_key(&symbol.name)),
                member: symbol.id.clone(),
            });
            ops.push(StoreOp::SetAdd {
                key: self.key(&project, &keys::kind_index_key(symbol.kind.as_str())),
                member: symbol.id.clone(),
            });
        }
        self.backend.apply(ops).await
    }

    pub async fn get_symbol(&self, id: &str) -> Result<Option<Symbol>> {
        let project = self.project.read().await;
        let fields = self
            .backend
            .hash_get_all(&self.key(&project, &keys::symbol_key(id)))
            .await?;
        Ok(symbol_from_fields(id, &fields))
    }

    /// Remove a symbol and every trace of it: index-set memberships,
    /// incident edges in both directions, adjacency sets, and its PageRank
    /// entry. Two-phase: read the incident sets, then apply one atomic
    /// deletion batch.
    pub async fn remove_symbol(&self, id: &str) -> Result<()> {
        let project = self.project.read().await;
        let symbol = {
            let fields = self
                .backend
                .hash_get_all(&self.key(&project, &keys::symbol_key(id)))
                .await?;
            symbol_from_fields(id, &fields)
        };

        let mut ops = Vec::new();
        ops.push(StoreOp::Delete {
            key: self.key(&project, &keys::symbol_key(id)),
        });
        if let Some(symbol) = &symbol {
            ops.push(StoreOp::SetRemove {
                key: self.key(&project, &keys::file_index_key(&symbol.filepath)),
                member: id.to_string(),
            });
            ops.push(StoreOp::SetRemove {
                key: self.key(&project, &keys::name_index_key(&symbol.name)),
                member: id.to_string(),
            });
            ops.push(StoreOp::SetRemove {
                key: self.key(&project, &keys::kind_index_key(symbol.kind.as_str())),
                member: id.to_string(),
            });
        }
        self.collect_adjacency_removal(&project, id, &mut ops).await?;
        ops.push(StoreOp::ZRemove {
            key: self.key(&project, keys::PAGERANK_KEY),
            member: id.to_string(),
        });
        self.backend.apply(ops).await
    }

    /// Deletion ops for both adjacency directions of a node (symbol ID or
    /// filepath pseudo-node).
    async fn collect_adjacency_removal(
        &self,
        project: &str,
        id: &str,
        ops: &mut Vec<StoreOp>,
    ) -> Result<()> {
        let outgoing = self
            .backend
            .set_members(&self.key(project, &keys::deps_from_key(id)))
            .await?;
        for to in outgoing {
            ops.push(StoreOp::Delete {
                key: self.key(project, &keys::edge_key(id, &to)),
            });
            ops.push(StoreOp::SetRemove {
                key: self.key(project, &keys::deps_to_key(&to)),
                member: id.to_string(),
            });
        }
        let incoming = self
            .backend
            .set_members(&self.key(project, &keys::deps_to_key(id)))
            .await?;
        for from in incoming {
            ops.push(StoreOp::Delete {
                key: self.key(project, &keys::edge_key(&from, id)),
            });
            ops.push(StoreOp::SetRemove {
                key: self.key(project, &keys::deps_from_key(&from)),
                member: id.to_string(),
            });
        }
        ops.push(StoreOp::Delete {
            key: self.key(project, &keys::deps_from_key(id)),
        });
        ops.push(StoreOp::Delete {
            key: self.key(project, &keys::deps_to_key(id)),
        });
        Ok(())
    }

    /// IDs of every symbol in a file, sorted for determinism.
    pub async fn symbols_in_file(&self, path: &str) -> Result<Vec<String>> {
        let project = self.project.read().await;
        let mut ids = self
            .backend
            .set_members(&self.key(&project, &keys::file_index_key(path)))
            .await?;
        ids.sort();
        Ok(ids)
    }

    pub async fn ids_by_name(&self, name: &str) -> Result<Vec<String>> {
        let project = self.project.read().await;
        let mut ids = self
            .backend
            .set_members(&self.key(&project, &keys::name_index_key(name)))
            .await?;
        ids.sort();
        Ok(ids)
    }

    pub async fn ids_by_kind(&self, kind: SymbolKind) -> Result<Vec<String>> {
        let project = self.project.read().await;
        let mut ids = self
            .backend
            .set_members(&self.key(&project, &keys::kind_index_key(kind.as_str())))
            .await?;
        ids.sort();
        Ok(ids)
    }

    /// Every symbol ID in the store, sorted.
    pub async fn all_symbol_ids(&self) -> Result<Vec<String>> {
        let project = self.project.read().await;
        let prefix = self.key(&project, "symbol:");
        let mut ids: Vec<String> = self
            .backend
            .keys_with_prefix(&prefix)
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(|s| s.to_string()))
            .collect();
        ids.sort();
        Ok(ids)
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Insert an edge: the record hash plus both adjacency-set memberships,
    /// as one atomic batch.
    pub async fn add_edge(&self, edge: &Edge) -> Result<()> {
        let project = self.project.read().await;
        let ops = vec![
            StoreOp::HashPut {
                key: self.key(&project, &keys::edge_key(&edge.from, &edge.to)),
                fields: edge_fields(edge),
            },
            StoreOp::SetAdd {
                key: self.key(&project, &keys::deps_from_key(&edge.from)),
                member: edge.to.clone(),
            },
            StoreOp::SetAdd {
                key: self.key(&project, &keys::deps_to_key(&edge.to)),
                member: edge.from.clone(),
            },
        ];
        self.backend.apply(ops).await
    }

    pub async fn edge_between(&self, from: &str, to: &str) -> Result<Option<Edge>> {
        let project = self.project.read().await;
        let fields = self
            .backend
            .hash_get_all(&self.key(&project, &keys::edge_key(from, to)))
            .await?;
        Ok(edge_from_fields(&fields))
    }

    /// Counterpart IDs this node depends on, sorted.
    pub async fn dependencies_of(&self, id: &str) -> Result<Vec<String>> {
        let project = self.project.read().await;
        let mut ids = self
            .backend
            .set_members(&self.key(&project, &keys::deps_from_key(id)))
            .await?;
        ids.sort();
        Ok(ids)
    }

    /// Counterpart IDs depending on this node, sorted.
    pub async fn dependents_of(&self, id: &str) -> Result<Vec<String>> {
        let project = self.project.read().await;
        let mut ids = self
            .backend
            .set_members(&self.key(&project, &keys::deps_to_key(id)))
            .await?;
        ids.sort();
        Ok(ids)
    }

    /// Every edge record in the store. Reads the record hashes, so the
    /// result carries kinds and locations.
    pub async fn all_edges(&self) -> Result<Vec<Edge>> {
        let project = self.project.read().await;
        let prefix = self.key(&project, "edge:from:");
        let keys = self.backend.keys_with_prefix(&prefix).await?;
        let mut edges = Vec::with_capacity(keys.len());
        for key in keys {
            let fields = self.backend.hash_get_all(&key).await?;
            if let Some(edge) = edge_from_fields(&fields) {
                edges.push(edge);
            }
        }
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        Ok(edges)
    }

    // -----------------------------------------------------------------------
    // PageRank
    // -----------------------------------------------------------------------

    /// Clear and rewrite the PageRank sorted set in bounded-size batches,
    /// mirroring each score into the symbol hash's `pageRank` field.
    pub async fn set_page_ranks(&self, ranks: &HashMap<String, f64>) -> Result<()> {
        let project = self.project.read().await;
        let zkey = self.key(&project, keys::PAGERANK_KEY);
        self.backend
            .apply(vec![StoreOp::Delete { key: zkey.clone() }])
            .await?;

        let mut entries: Vec<(&String, &f64)> = ranks.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for chunk in entries.chunks(PAGERANK_BATCH) {
            let mut ops = Vec::with_capacity(chunk.len() * 2);
            for (id, score) in chunk {
                ops.push(StoreOp::ZAdd {
                    key: zkey.clone(),
                    member: (*id).clone(),
                    score: **score,
                });
                ops.push(StoreOp::HashSetField {
                    key: self.key(&project, &keys::symbol_key(id)),
                    field: "pageRank".to_string(),
                    value: score.to_string(),
                });
            }
            self.backend.apply(ops).await?;
        }
        Ok(())
    }

    pub async fn page_rank_of(&self, id: &str) -> Result<Option<f64>> {
        let project = self.project.read().await;
        self.backend
            .zset_score(&self.key(&project, keys::PAGERANK_KEY), id)
            .await
    }

    /// Top-ranked symbol IDs with scores, highest first.
    pub async fn top_ranked(&self, limit: usize) -> Result<Vec<(String, f64)>> {
        let project = self.project.read().await;
        self.backend
            .zset_range_desc(&self.key(&project, keys::PAGERANK_KEY), Some(limit))
            .await
    }

    // -----------------------------------------------------------------------
    // File tracking
    // -----------------------------------------------------------------------

    pub async fn put_file_tracking(&self, path: &str, tracking: &FileTracking) -> Result<()> {
        let project = self.project.read().await;
        let ops = vec![StoreOp::HashPut {
            key: self.key(&project, &keys::tracking_key(path)),
            fields: vec![
                ("mtime".to_string(), tracking.mtime.to_string()),
                ("hash".to_string(), tracking.hash.clone()),
            ],
        }];
        self.backend.apply(ops).await
    }

    pub async fn file_tracking(&self, path: &str) -> Result<Option<FileTracking>> {
        let project = self.project.read().await;
        let fields = self
            .backend
            .hash_get_all(&self.key(&project, &keys::tracking_key(path)))
            .await?;
        Ok(tracking_from_fields(&fields))
    }

    /// All tracked files with their records.
    pub async fn all_tracking(&self) -> Result<HashMap<String, FileTracking>> {
        let project = self.project.read().await;
        let prefix = self.key(&project, "file:");
        let keys = self.backend.keys_with_prefix(&prefix).await?;
        let mut tracked = HashMap::with_capacity(keys.len());
        for key in keys {
            let Some(path) = key.strip_prefix(&prefix).map(|s| s.to_string()) else {
                continue;
            };
            let fields = self.backend.hash_get_all(&key).await?;
            if let Some(tracking) = tracking_from_fields(&fields) {
                tracked.insert(path, tracking);
            }
        }
        Ok(tracked)
    }

    pub async fn remove_file_tracking(&self, path: &str) -> Result<()> {
        let project = self.project.read().await;
        let ops = vec![StoreOp::Delete {
            key: self.key(&project, &keys::tracking_key(path)),
        }];
        self.backend.apply(ops).await
    }

    /// Remove every symbol of a file, the file's unresolved import edges,
    /// and its tracking record.
    pub async fn remove_file(&self, path: &str) -> Result<()> {
        for id in self.symbols_in_file(path).await? {
            self.remove_symbol(&id).await?;
        }
        // The filepath itself is a pseudo-node for unresolved imports.
        let project = self.project.read().await;
        let mut ops = Vec::new();
        self.collect_adjacency_removal(&project, path, &mut ops)
            .await?;
        ops.push(StoreOp::Delete {
            key: self.key(&project, &keys::tracking_key(path)),
        });
        ops.push(StoreOp::Delete {
            key: self.key(&project, &keys::file_index_key(path)),
        });
        self.backend.apply(ops).await
    }

    // -----------------------------------------------------------------------
    // Project metadata and locks
    // -----------------------------------------------------------------------

    pub async fn put_project_metadata(&self, metadata: &ProjectMetadata) -> Result<()> {
        let project = self.project.read().await;
        let ops = vec![
            StoreOp::Put {
                key: self.key(&project, keys::ROOT_KEY),
                value: metadata.root.clone(),
            },
            StoreOp::Put {
                key: self.key(&project, keys::INDEXED_AT_KEY),
                value: metadata.indexed_at.to_rfc3339(),
            },
            StoreOp::Put {
                key: self.key(&project, keys::STATS_KEY),
                value: serde_json::to_string(&metadata.stats)?,
            },
        ];
        self.backend.apply(ops).await
    }

    pub async fn project_metadata(&self) -> Result<Option<ProjectMetadata>> {
        let project = self.project.read().await;
        let Some(root) = self.backend.get(&self.key(&project, keys::ROOT_KEY)).await? else {
            return Ok(None);
        };
        let indexed_at = self
            .backend
            .get(&self.key(&project, keys::INDEXED_AT_KEY))
            .await?
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now);
        let stats: ProjectStats = self
            .backend
            .get(&self.key(&project, keys::STATS_KEY))
            .await?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Ok(Some(ProjectMetadata {
            root,
            indexed_at,
            stats,
        }))
    }

    /// Single-writer advisory lock via set-if-absent with TTL. Returns
    /// whether acquisition succeeded.
    pub async fn acquire_lock(&self, name: &str, ttl_ms: u64) -> Result<bool> {
        let project = self.project.read().await;
        self.backend
            .set_nx_ttl(&self.key(&project, &keys::lock_key(name)), "held", ttl_ms)
            .await
    }

    pub async fn release_lock(&self, name: &str) -> Result<()> {
        let project = self.project.read().await;
        let ops = vec![StoreOp::Delete {
            key: self.key(&project, &keys::lock_key(name)),
        }];
        self.backend.apply(ops).await
    }
}

// ---------------------------------------------------------------------------
// Record <-> hash-field mapping
// ---------------------------------------------------------------------------

fn symbol_fields(symbol: &Symbol) -> Vec<(String, String)> {
    let mut fields = vec![
        ("name".to_string(), symbol.name.clone()),
        ("kind".to_string(), symbol.kind.as_str().to_string()),
        ("filepath".to_string(), symbol.filepath.clone()),
        (
            "location".to_string(),
            serde_json::to_string(&symbol.location).unwrap_or_default(),
        ),
        ("exported".to_string(), symbol.exported.to_string()),
        ("language".to_string(), symbol.language.clone()),
    ];
    if let Some(signature) = &symbol.signature {
        fields.push(("signature".to_string(), signature.clone()));
    }
    if let Some(docstring) = &symbol.docstring {
        fields.push(("docstring".to_string(), docstring.clone()));
    }
    if let Some(parent) = &symbol.parent {
        fields.push(("parent".to_string(), parent.clone()));
    }
    if !symbol.children.is_empty() {
        fields.push((
            "children".to_string(),
            serde_json::to_string(&symbol.children).unwrap_or_default(),
        ));
    }
    if let Some(git) = &symbol.git {
        fields.push((
            "git".to_string(),
            serde_json::to_string(git).unwrap_or_default(),
        ));
    }
    if let Some(rank) = symbol.page_rank {
        fields.push(("pageRank".to_string(), rank.to_string()));
    }
    fields
}

fn symbol_from_fields(id: &str, fields: &HashMap<String, String>) -> Option<Symbol> {
    let name = fields.get("name")?.clone();
    let kind = SymbolKind::parse(fields.get("kind")?)?;
    let filepath = fields.get("filepath")?.clone();
    let location: Span = serde_json::from_str(fields.get("location")?).ok()?;
    Some(Symbol {
        id: id.to_string(),
        name,
        kind,
        filepath,
        location,
        signature: fields.get("signature").cloned(),
        docstring: fields.get("docstring").cloned(),
        parent: fields.get("parent").cloned(),
        children: fields
            .get("children")
            .and_then(|c| serde_json::from_str(c).ok())
            .unwrap_or_default(),
        exported: fields.get("exported").map(|e| e == "true").unwrap_or(false),
        language: fields.get("language").cloned().unwrap_or_default(),
        git: fields.get("git").and_then(|g| serde_json::from_str(g).ok()),
        page_rank: fields.get("pageRank").and_then(|r| r.parse().ok()),
    })
}

fn edge_fields(edge: &Edge) -> Vec<(String, String)> {
    let mut fields = vec![
        ("from".to_string(), edge.from.clone()),
        ("to".to_string(), edge.to.clone()),
        ("type".to_string(), edge.kind.as_str().to_string()),
    ];
    if let Some(location) = &edge.location {
        fields.push((
            "location".to_string(),
            serde_json::to_string(location).unwrap_or_default(),
        ));
    }
    fields
}

fn edge_from_fields(fields: &HashMap<String, String>) -> Option<Edge> {
    Some(Edge {
        from: fields.get("from")?.clone(),
        to: fields.get("to")?.clone(),
        kind: EdgeKind::parse(fields.get("type")?)?,
        location: fields
            .get("location")
            .and_then(|l| serde_json::from_str(l).ok()),
    })
}

fn tracking_from_fields(fields: &HashMap<String, String>) -> Option<FileTracking> {
    Some(FileTracking {
        mtime: fields.get("mtime")?.parse().ok()?,
        hash: fields.get("hash")?.clone(),
    })
}
