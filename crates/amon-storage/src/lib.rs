//! Storage adapters for the Amon master.
//!
//! Three concerns live here, each behind a `Send + Sync` trait so the
//! server and its tests can swap backends freely:
//!
//! * [`directory::Directory`] — the hierarchical user/probe directory.
//!   The production backend ([`ldap::LdapDirectory`]) speaks LDAP; the
//!   in-memory backend ([`directory::MemDirectory`]) implements the same
//!   contract for tests and standalone development.
//! * [`kv::Kv`] — a numbered logical database on a Redis-protocol
//!   key-value store, with an atomic multi-op ([`kv::KvOp`]).
//! * [`cache::Cache`] — named, bounded, TTL'd response caches with
//!   negative-result caching and a global disable sentinel.

pub mod cache;
pub mod directory;
pub mod error;
pub mod kv;
pub mod ldap;
pub mod redis_kv;

#[cfg(test)]
mod tests;

pub use cache::Cache;
pub use directory::{Directory, Entry, MemDirectory, SearchScope};
pub use error::StorageError;
pub use kv::{Kv, KvOp, MemKv};
pub use ldap::LdapDirectory;
pub use redis_kv::RedisKv;
