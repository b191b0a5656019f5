//! The key-value adapter: a numbered logical database on a Redis-protocol
//! store.
//!
//! The master keeps maintenance-window state here: per-user id counters
//! (hash), per-user window sets, window hashes, and one global sorted set
//! ordered by window end time. Multi-key mutations go through [`Kv::tx`],
//! which is all-or-nothing.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

/// One command inside an atomic [`Kv::tx`] multi-op.
#[derive(Debug, Clone)]
pub enum KvOp {
    Hset {
        key: String,
        field: String,
        value: String,
    },
    HsetAll {
        key: String,
        fields: Vec<(String, String)>,
    },
    Sadd {
        key: String,
        member: String,
    },
    Srem {
        key: String,
        member: String,
    },
    Zadd {
        key: String,
        score: i64,
        member: String,
    },
    Zrem {
        key: String,
        member: String,
    },
    Del {
        key: String,
    },
}

/// Key-value store primitives the master relies on.
///
/// Connections come from a pooled accessor inside the implementation;
/// transient connection errors propagate to the caller unchanged.
#[async_trait]
pub trait Kv: Send + Sync {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    async fn sadd(&self, key: &str, member: &str) -> Result<()>;
    async fn srem(&self, key: &str, member: &str) -> Result<()>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;

    async fn zadd(&self, key: &str, score: i64, member: &str) -> Result<()>;
    async fn zrem(&self, key: &str, member: &str) -> Result<()>;
    /// Members with scores, ascending by score. `start`/`stop` are
    /// inclusive rank bounds; negative indexes count from the end.
    async fn zrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, i64)>>;

    async fn del(&self, key: &str) -> Result<()>;
    /// Keys matching a glob pattern (only `*` wildcards are used here).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Execute the ops atomically: either all apply or none do.
    async fn tx(&self, ops: Vec<KvOp>) -> Result<()>;
}

// ── In-memory backend ───────────────────────────────────────────────

#[derive(Debug, Clone)]
enum MemValue {
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    /// member → score; range queries sort on (score, member).
    Zset(BTreeMap<String, i64>),
}

/// In-memory [`Kv`] used by tests and standalone development. A single
/// mutex guards the whole store, which makes [`Kv::tx`] all-or-nothing by
/// construction.
#[derive(Default)]
pub struct MemKv {
    data: Mutex<HashMap<String, MemValue>>,
}

impl MemKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(data: &mut HashMap<String, MemValue>, op: &KvOp) {
        match op {
            KvOp::Hset { key, field, value } => {
                let entry = data
                    .entry(key.clone())
                    .or_insert_with(|| MemValue::Hash(HashMap::new()));
                if let MemValue::Hash(h) = entry {
                    h.insert(field.clone(), value.clone());
                }
            }
            KvOp::HsetAll { key, fields } => {
                let entry = data
                    .entry(key.clone())
                    .or_insert_with(|| MemValue::Hash(HashMap::new()));
                if let MemValue::Hash(h) = entry {
                    for (f, v) in fields {
                        h.insert(f.clone(), v.clone());
                    }
                }
            }
            KvOp::Sadd { key, member } => {
                let entry = data
                    .entry(key.clone())
                    .or_insert_with(|| MemValue::Set(HashSet::new()));
                if let MemValue::Set(s) = entry {
                    s.insert(member.clone());
                }
            }
            KvOp::Srem { key, member } => {
                if let Some(MemValue::Set(s)) = data.get_mut(key) {
                    s.remove(member);
                }
            }
            KvOp::Zadd {
                key,
                score,
                member,
            } => {
                let entry = data
                    .entry(key.clone())
                    .or_insert_with(|| MemValue::Zset(BTreeMap::new()));
                if let MemValue::Zset(z) = entry {
                    z.insert(member.clone(), *score);
                }
            }
            KvOp::Zrem { key, member } => {
                if let Some(MemValue::Zset(z)) = data.get_mut(key) {
                    z.remove(member);
                }
            }
            KvOp::Del { key } => {
                data.remove(key);
            }
        }
    }
}

#[async_trait]
impl Kv for MemKv {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let data = self.data.lock().unwrap();
        Ok(match data.get(key) {
            Some(MemValue::Hash(h)) => h.get(field).cloned(),
            _ => None,
        })
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::apply(
            &mut data,
            &KvOp::Hset {
                key: key.to_string(),
                field: field.to_string(),
                value: value.to_string(),
            },
        );
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let data = self.data.lock().unwrap();
        Ok(match data.get(key) {
            Some(MemValue::Hash(h)) => h.clone(),
            _ => HashMap::new(),
        })
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut data = self.data.lock().unwrap();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| MemValue::Hash(HashMap::new()));
        if let MemValue::Hash(h) = entry {
            let current: i64 = h.get(field).and_then(|v| v.parse().ok()).unwrap_or(0);
            let next = current + delta;
            h.insert(field.to_string(), next.to_string());
            Ok(next)
        } else {
            Ok(delta)
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::apply(
            &mut data,
            &KvOp::Sadd {
                key: key.to_string(),
                member: member.to_string(),
            },
        );
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::apply(
            &mut data,
            &KvOp::Srem {
                key: key.to_string(),
                member: member.to_string(),
            },
        );
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let data = self.data.lock().unwrap();
        Ok(match data.get(key) {
            Some(MemValue::Set(s)) => s.iter().cloned().collect(),
            _ => vec![],
        })
    }

    async fn zadd(&self, key: &str, score: i64, member: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::apply(
            &mut data,
            &KvOp::Zadd {
                key: key.to_string(),
                score,
                member: member.to_string(),
            },
        );
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::apply(
            &mut data,
            &KvOp::Zrem {
                key: key.to_string(),
                member: member.to_string(),
            },
        );
        Ok(())
    }

    async fn zrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, i64)>> {
        let data = self.data.lock().unwrap();
        let mut members: Vec<(String, i64)> = match data.get(key) {
            Some(MemValue::Zset(z)) => z.iter().map(|(m, s)| (m.clone(), *s)).collect(),
            _ => vec![],
        };
        members.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let len = members.len() as isize;
        let resolve = |i: isize| -> isize {
            if i < 0 {
                (len + i).max(0)
            } else {
                i
            }
        };
        let from = resolve(start).min(len) as usize;
        let to = resolve(stop).min(len - 1);
        if to < from as isize {
            return Ok(vec![]);
        }
        Ok(members[from..=(to as usize)].to_vec())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let data = self.data.lock().unwrap();
        let matches = |key: &str| -> bool {
            match pattern.split_once('*') {
                Some((prefix, suffix)) => {
                    key.len() >= prefix.len() + suffix.len()
                        && key.starts_with(prefix)
                        && key.ends_with(suffix)
                }
                None => key == pattern,
            }
        };
        Ok(data.keys().filter(|k| matches(k)).cloned().collect())
    }

    async fn tx(&self, ops: Vec<KvOp>) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        for op in &ops {
            Self::apply(&mut data, op);
        }
        Ok(())
    }
}
