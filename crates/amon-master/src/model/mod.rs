//! The master's data model over the directory: users (read-only), probes
//! and probe groups (read-write), and contact resolution.

pub mod contact;
pub mod probe;
pub mod probe_group;
pub mod user;

use crate::config::CacheConfig;
use amon_storage::Cache;
use std::time::Duration;
use user::UserLookup;
use uuid::Uuid;

// ── Distinguished names ─────────────────────────────────────────────
//
// Entities are addressed by DNs built deterministically from UUIDs.

pub fn users_base(base_dn: &str) -> String {
    format!("ou=users,{base_dn}")
}

pub fn user_dn(base_dn: &str, user: Uuid) -> String {
    format!("uuid={user},ou=users,{base_dn}")
}

pub fn probe_dn(base_dn: &str, user: Uuid, probe: Uuid) -> String {
    format!("amonprobe={probe},uuid={user},ou=users,{base_dn}")
}

pub fn probe_group_dn(base_dn: &str, user: Uuid, group: Uuid) -> String {
    format!("amonprobegroup={group},uuid={user},ou=users,{base_dn}")
}

pub fn operators_dn(base_dn: &str) -> String {
    format!("cn=operators,ou=groups,{base_dn}")
}

// ── Response caches ─────────────────────────────────────────────────

/// The cached per-agent probe manifest: the serialized probe list plus
/// its content digest.
#[derive(Debug, Clone)]
pub struct AgentManifest {
    pub body: String,
    pub digest: String,
}

/// Every named response cache, and the one place the invalidation policy
/// lives. Writers never touch individual caches directly — they call the
/// `invalidate_*` method for the entity kind they wrote.
pub struct Caches {
    pub user_get: Cache<UserLookup>,
    pub probe_get: Cache<Option<probe::Probe>>,
    pub probe_list: Cache<Vec<probe::Probe>>,
    pub group_get: Cache<Option<probe_group::ProbeGroup>>,
    pub group_list: Cache<Vec<probe_group::ProbeGroup>>,
    pub agent_probes: Cache<AgentManifest>,
}

impl Caches {
    pub fn new(cfg: &CacheConfig) -> Self {
        let enabled = !cfg.disabled;
        let user_ttl = Duration::from_secs(cfg.user_ttl_secs);
        let probe_ttl = Duration::from_secs(cfg.probe_ttl_secs);
        let manifest_ttl = Duration::from_secs(cfg.agent_probes_ttl_secs);
        Self {
            user_get: Cache::new("userGet", cfg.user_capacity, user_ttl, enabled),
            probe_get: Cache::new("probeGet", cfg.user_capacity, probe_ttl, enabled),
            probe_list: Cache::new("probeList", cfg.user_capacity, probe_ttl, enabled),
            group_get: Cache::new("probeGroupGet", cfg.user_capacity, probe_ttl, enabled),
            group_list: Cache::new("probeGroupList", cfg.user_capacity, probe_ttl, enabled),
            // One entry per agent; the TTL is the only bound.
            agent_probes: Cache::new("agentProbes", 0, manifest_ttl, enabled),
        }
    }

    /// A probe at `dn` targeting `agent` was written or deleted.
    pub fn invalidate_probe(&self, dn: &str, agent: Uuid) {
        self.probe_list.reset();
        self.probe_get.del(dn);
        self.agent_probes.del(&agent.to_string());
    }

    /// A probe group at `dn` was written or deleted.
    pub fn invalidate_probe_group(&self, dn: &str) {
        self.group_list.reset();
        self.group_get.del(dn);
    }
}
