//! The hierarchical directory that owns users, probes, and probe groups.
//!
//! Entities are addressed by distinguished names built deterministically
//! from their UUIDs (e.g. `amonprobe=<uuid>,uuid=<uuid>,ou=users,o=smartdc`).
//! The master only ever reads and writes string-valued attributes.

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// A directory entry: a DN plus a multi-valued attribute map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl Entry {
    pub fn new(dn: impl Into<String>) -> Self {
        Entry {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Builder-style attribute setter; replaces any prior values.
    pub fn with_attr(mut self, name: &str, values: Vec<String>) -> Self {
        self.attrs.insert(name.to_string(), values);
        self
    }

    /// First value of `name`, if the attribute is present and non-empty.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.attrs
            .get(name)
            .and_then(|vs| vs.first())
            .map(String::as_str)
    }

    /// All values of `name` (empty slice when absent).
    pub fn values(&self, name: &str) -> &[String] {
        self.attrs.get(name).map_or(&[], Vec::as_slice)
    }
}

/// Search scope below a base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// The base entry itself.
    Base,
    /// Immediate children of the base.
    One,
    /// The base and everything under it.
    Sub,
}

/// Read/write access to the external directory.
///
/// `search` collects the backend's asynchronous entry stream and returns
/// the complete list; a non-zero terminal status from the backend is an
/// error, never a partial result.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn get(&self, dn: &str) -> Result<Option<Entry>>;

    async fn search(&self, base_dn: &str, scope: SearchScope, filter: &str) -> Result<Vec<Entry>>;

    /// Create or fully replace the entry at `entry.dn`.
    async fn put(&self, entry: &Entry) -> Result<()>;

    async fn del(&self, dn: &str) -> Result<()>;
}

// ── In-memory backend ───────────────────────────────────────────────

/// In-memory [`Directory`] used by tests and standalone development.
///
/// Evaluates the filter subset the master actually issues: equality,
/// presence, and `&` conjunctions thereof.
#[derive(Default)]
pub struct MemDirectory {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl MemDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Directory for MemDirectory {
    async fn get(&self, dn: &str) -> Result<Option<Entry>> {
        Ok(self.entries.lock().unwrap().get(dn).cloned())
    }

    async fn search(&self, base_dn: &str, scope: SearchScope, filter: &str) -> Result<Vec<Entry>> {
        let filter = Filter::parse(filter)?;
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .values()
            .filter(|e| in_scope(&e.dn, base_dn, scope) && filter.matches(e))
            .cloned()
            .collect())
    }

    async fn put(&self, entry: &Entry) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(entry.dn.clone(), entry.clone());
        Ok(())
    }

    async fn del(&self, dn: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(dn);
        Ok(())
    }
}

fn in_scope(dn: &str, base_dn: &str, scope: SearchScope) -> bool {
    if dn == base_dn {
        return !matches!(scope, SearchScope::One);
    }
    let suffix = format!(",{base_dn}");
    match scope {
        SearchScope::Base => false,
        SearchScope::Sub => dn.ends_with(&suffix),
        SearchScope::One => dn
            .strip_suffix(&suffix)
            .is_some_and(|rdn| !rdn.contains(',')),
    }
}

/// The filter subset `MemDirectory` evaluates.
enum Filter {
    And(Vec<Filter>),
    Eq(String, String),
    Present(String),
}

impl Filter {
    fn parse(s: &str) -> Result<Filter> {
        let inner = s
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(|| StorageError::UnsupportedFilter(s.to_string()))?;

        if let Some(rest) = inner.strip_prefix('&') {
            let mut parts = Vec::new();
            let mut depth = 0usize;
            let mut start = 0usize;
            for (i, c) in rest.char_indices() {
                match c {
                    '(' => {
                        if depth == 0 {
                            start = i;
                        }
                        depth += 1;
                    }
                    ')' => {
                        depth = depth
                            .checked_sub(1)
                            .ok_or_else(|| StorageError::UnsupportedFilter(s.to_string()))?;
                        if depth == 0 {
                            parts.push(Filter::parse(&rest[start..=i])?);
                        }
                    }
                    _ => {}
                }
            }
            if depth != 0 || parts.is_empty() {
                return Err(StorageError::UnsupportedFilter(s.to_string()));
            }
            return Ok(Filter::And(parts));
        }

        let (attr, value) = inner
            .split_once('=')
            .ok_or_else(|| StorageError::UnsupportedFilter(s.to_string()))?;
        let attr_ok = !attr.is_empty()
            && attr
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !attr_ok || value.contains('(') || value.contains(')') {
            return Err(StorageError::UnsupportedFilter(s.to_string()));
        }
        if value == "*" {
            Ok(Filter::Present(attr.to_string()))
        } else {
            Ok(Filter::Eq(attr.to_string(), value.to_string()))
        }
    }

    fn matches(&self, entry: &Entry) -> bool {
        match self {
            Filter::And(fs) => fs.iter().all(|f| f.matches(entry)),
            Filter::Eq(attr, value) => entry.values(attr).iter().any(|v| v == value),
            Filter::Present(attr) => !entry.values(attr).is_empty(),
        }
    }
}
