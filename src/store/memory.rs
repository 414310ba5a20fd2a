//! In-memory store backend.
//!
//! Backs integration tests and embedded use with the same contract as the
//! Redis backend. The keyspace is a `DashMap` (per-key sharded access for
//! point reads and writes); batch atomicity comes from a coarse `RwLock`
//! gate: [`StoreBackend::apply`] holds the write side for the duration of a
//! batch while every reader holds the read side, so readers observe either
//! none or all of a batch's effects.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::{StoreBackend, StoreOp};

#[derive(Debug, Clone)]
enum Value {
    Str {
        value: String,
        expires_at: Option<Instant>,
    },
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
    ZSet(BTreeMap<String, f64>),
}

/// Process-local backend: a sharded keyspace behind a batch gate.
#[derive(Default)]
pub struct MemoryBackend {
    data: DashMap<String, Value>,
    /// Write side held across an `apply` batch; read side by every reader.
    gate: RwLock<()>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_op(data: &DashMap<String, Value>, op: StoreOp) {
        match op {
            StoreOp::Put { key, value } => {
                data.insert(
                    key,
                    Value::Str {
                        value,
                        expires_at: None,
                    },
                );
            }
            StoreOp::Delete { key } => {
                data.remove(&key);
            }
            StoreOp::HashPut { key, fields } => {
                let mut entry = data
                    .entry(key)
                    .or_insert_with(|| Value::Hash(HashMap::new()));
                if !matches!(entry.value(), Value::Hash(_)) {
                    *entry.value_mut() = Value::Hash(HashMap::new());
                }
                if let Value::Hash(hash) = entry.value_mut() {
                    hash.extend(fields);
                }
            }
            StoreOp::HashSetField { key, field, value } => {
                let mut entry = data
                    .entry(key)
                    .or_insert_with(|| Value::Hash(HashMap::new()));
                if let Value::Hash(hash) = entry.value_mut() {
                    hash.insert(field, value);
                }
            }
            StoreOp::SetAdd { key, member } => {
                let mut entry = data
                    .entry(key)
                    .or_insert_with(|| Value::Set(BTreeSet::new()));
                if let Value::Set(set) = entry.value_mut() {
                    set.insert(member);
                }
            }
            StoreOp::SetRemove { key, member } => {
                let mut emptied = false;
                if let Some(mut entry) = data.get_mut(&key) {
                    if let Value::Set(set) = entry.value_mut() {
                        set.remove(&member);
                        emptied = set.is_empty();
                    }
                }
                if emptied {
                    data.remove(&key);
                }
            }
            StoreOp::ZAdd { key, member, score } => {
                let mut entry = data
                    .entry(key)
                    .or_insert_with(|| Value::ZSet(BTreeMap::new()));
                if let Value::ZSet(zset) = entry.value_mut() {
                    zset.insert(member, score);
                }
            }
            StoreOp::ZRemove { key, member } => {
                if let Some(mut entry) = data.get_mut(&key) {
                    if let Value::ZSet(zset) = entry.value_mut() {
                        zset.remove(&member);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _gate = self.gate.read().await;
        let mut expired = false;
        let result = self.data.get(key).and_then(|entry| match entry.value() {
            Value::Str { value, expires_at } => {
                if expires_at.map(|at| at <= Instant::now()).unwrap_or(false) {
                    expired = true;
                    None
                } else {
                    Some(value.clone())
                }
            }
            _ => None,
        });
        if expired {
            self.data.remove(key);
        }
        Ok(result)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let _gate = self.gate.read().await;
        Ok(self
            .data
            .get(key)
            .and_then(|entry| match entry.value() {
                Value::Hash(hash) => Some(hash.clone()),
                _ => None,
            })
            .unwrap_or_default())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let _gate = self.gate.read().await;
        Ok(self
            .data
            .get(key)
            .and_then(|entry| match entry.value() {
                Value::Set(set) => Some(set.iter().cloned().collect()),
                _ => None,
            })
            .unwrap_or_default())
    }

    async fn zset_range_desc(
        &self,
        key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<(String, f64)>> {
        let _gate = self.gate.read().await;
        let mut entries: Vec<(String, f64)> = self
            .data
            .get(key)
            .and_then(|entry| match entry.value() {
                Value::ZSet(zset) => {
                    Some(zset.iter().map(|(m, s)| (m.clone(), *s)).collect())
                }
                _ => None,
            })
            .unwrap_or_default();
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    async fn zset_score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let _gate = self.gate.read().await;
        Ok(self.data.get(key).and_then(|entry| match entry.value() {
            Value::ZSet(zset) => zset.get(member).copied(),
            _ => None,
        }))
    }

    async fn set_nx_ttl(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool> {
        let _gate = self.gate.read().await;
        let now = Instant::now();
        let fresh = Value::Str {
            value: value.to_string(),
            expires_at: Some(now + Duration::from_millis(ttl_ms)),
        };
        // The entry API keeps check-then-set atomic per key.
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let live = match occupied.get() {
                    Value::Str { expires_at, .. } => {
                        !expires_at.map(|at| at <= now).unwrap_or(false)
                    }
                    _ => true,
                };
                if live {
                    return Ok(false);
                }
                occupied.insert(fresh);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    async fn apply(&self, ops: Vec<StoreOp>) -> Result<()> {
        let _gate = self.gate.write().await;
        for op in ops {
            Self::apply_op(&self.data, op);
        }
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let _gate = self.gate.read().await;
        let mut keys: Vec<String> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
