//! Maintenance windows: time-bounded notification suppression.
//!
//! Windows live in the KV store. Per user: a monotonic id counter (field
//! of the `maintenanceIds` hash) and a set of live ids; per window: a
//! hash of its fields; globally: one sorted set (`maintenancesByEnd`)
//! ordered by window end, which drives the expiry reaper.

pub mod reaper;

use amon_common::error::MasterError;
use amon_common::time::TimeSpec;
use amon_common::types::Event;
use amon_storage::{Kv, KvOp};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use reaper::Reaper;

pub const KEY_MAINT_IDS: &str = "maintenanceIds";
pub const KEY_BY_END: &str = "maintenancesByEnd";

pub fn set_key(user: Uuid) -> String {
    format!("maintenances:{user}")
}

pub fn window_key(user: Uuid, id: u64) -> String {
    format!("maintenance:{user}:{id}")
}

pub fn parse_window_key(key: &str) -> Option<(Uuid, u64)> {
    let rest = key.strip_prefix("maintenance:")?;
    let (user, id) = rest.split_once(':')?;
    Some((Uuid::parse_str(user).ok()?, id.parse().ok()?))
}

/// What a window suppresses: everything, or specific probes, probe
/// groups, or machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaintScope {
    All,
    Probes(Vec<Uuid>),
    ProbeGroups(Vec<Uuid>),
    Machines(Vec<Uuid>),
}

#[derive(Debug, Clone)]
pub struct Maintenance {
    pub user: Uuid,
    /// Per-user id from the monotonic counter; never reused.
    pub id: u64,
    /// ms-epoch, inclusive-exclusive `[start, end)` on the wire but
    /// matched strictly (`start < t < end`) against event times.
    pub start: i64,
    pub end: i64,
    pub notes: Option<String>,
    pub scope: MaintScope,
}

impl Maintenance {
    /// Does this window suppress an event at `time` touching the given
    /// probe/group/machine?
    pub fn covers(
        &self,
        time: i64,
        probe: Option<Uuid>,
        group: Option<Uuid>,
        machine: Option<Uuid>,
    ) -> bool {
        if !(self.start < time && time < self.end) {
            return false;
        }
        match &self.scope {
            MaintScope::All => true,
            MaintScope::Probes(uuids) => probe.is_some_and(|p| uuids.contains(&p)),
            MaintScope::ProbeGroups(uuids) => group.is_some_and(|g| uuids.contains(&g)),
            MaintScope::Machines(uuids) => machine.is_some_and(|m| uuids.contains(&m)),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("user".into(), Value::String(self.user.to_string()));
        map.insert("start".into(), Value::from(self.start));
        map.insert("end".into(), Value::from(self.end));
        if let Some(notes) = &self.notes {
            map.insert("notes".into(), Value::String(notes.clone()));
        }
        let uuid_list = |uuids: &[Uuid]| {
            Value::Array(
                uuids
                    .iter()
                    .map(|u| Value::String(u.to_string()))
                    .collect(),
            )
        };
        match &self.scope {
            MaintScope::All => {
                map.insert("all".into(), Value::Bool(true));
            }
            MaintScope::Probes(uuids) => {
                map.insert("probes".into(), uuid_list(uuids));
            }
            MaintScope::ProbeGroups(uuids) => {
                map.insert("probeGroups".into(), uuid_list(uuids));
            }
            MaintScope::Machines(uuids) => {
                map.insert("machines".into(), uuid_list(uuids));
            }
        }
        Value::Object(map)
    }

    fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("user".to_string(), self.user.to_string()),
            ("id".to_string(), self.id.to_string()),
            ("start".to_string(), self.start.to_string()),
            ("end".to_string(), self.end.to_string()),
        ];
        if let Some(notes) = &self.notes {
            fields.push(("notes".to_string(), notes.clone()));
        }
        let encode = |uuids: &[Uuid]| {
            serde_json::to_string(&uuids.iter().map(Uuid::to_string).collect::<Vec<_>>())
                .unwrap_or_else(|_| "[]".to_string())
        };
        match &self.scope {
            MaintScope::All => fields.push(("all".to_string(), "true".to_string())),
            MaintScope::Probes(u) => fields.push(("probes".to_string(), encode(u))),
            MaintScope::ProbeGroups(u) => fields.push(("probeGroups".to_string(), encode(u))),
            MaintScope::Machines(u) => fields.push(("machines".to_string(), encode(u))),
        }
        fields
    }

    /// Rebuild from a stored hash, enforcing the same invariants as
    /// create (exactly one scope, start < end). Windows that fail here
    /// are bogus and get self-healed by the caller.
    fn from_fields(fields: &HashMap<String, String>) -> Result<Maintenance, MasterError> {
        let bad = |what: &str| MasterError::invalid(format!("bad maintenance record: {what}"));

        let user = fields
            .get("user")
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| bad("user"))?;
        let id: u64 = fields
            .get("id")
            .and_then(|v| v.parse().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| bad("id"))?;
        let start: i64 = fields
            .get("start")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| bad("start"))?;
        let end: i64 = fields
            .get("end")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| bad("end"))?;
        if start >= end {
            return Err(bad("start >= end"));
        }

        let decode = |raw: &str| -> Result<Vec<Uuid>, MasterError> {
            let strings: Vec<String> =
                serde_json::from_str(raw).map_err(|_| bad("scope list"))?;
            strings
                .iter()
                .map(|s| Uuid::parse_str(s).map_err(|_| bad("scope uuid")))
                .collect()
        };
        let mut scopes = Vec::new();
        if fields.get("all").map(String::as_str) == Some("true") {
            scopes.push(MaintScope::All);
        }
        if let Some(raw) = fields.get("probes") {
            scopes.push(MaintScope::Probes(decode(raw)?));
        }
        if let Some(raw) = fields.get("probeGroups") {
            scopes.push(MaintScope::ProbeGroups(decode(raw)?));
        }
        if let Some(raw) = fields.get("machines") {
            scopes.push(MaintScope::Machines(decode(raw)?));
        }
        if scopes.len() != 1 {
            return Err(bad("exactly one scope required"));
        }

        Ok(Maintenance {
            user,
            id,
            start,
            end,
            notes: fields.get("notes").cloned(),
            scope: scopes.remove(0),
        })
    }
}

/// Wire input for create.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaintenanceInput {
    /// ms-epoch or `"now"` (the default).
    pub start: Option<TimeSpec>,
    /// ms-epoch or `"Nm" | "Nh" | "Nd"`.
    pub end: Option<TimeSpec>,
    pub notes: Option<String>,
    pub all: Option<bool>,
    pub probes: Option<Vec<Uuid>>,
    #[serde(rename = "probeGroups")]
    pub probe_groups: Option<Vec<Uuid>>,
    pub machines: Option<Vec<Uuid>>,
}

fn scope_from_input(input: &MaintenanceInput) -> Result<MaintScope, MasterError> {
    let mut scopes = Vec::new();
    if input.all == Some(true) {
        scopes.push(MaintScope::All);
    }
    if let Some(probes) = &input.probes {
        if probes.is_empty() {
            return Err(MasterError::invalid("\"probes\" must not be empty"));
        }
        scopes.push(MaintScope::Probes(probes.clone()));
    }
    if let Some(groups) = &input.probe_groups {
        if groups.is_empty() {
            return Err(MasterError::invalid("\"probeGroups\" must not be empty"));
        }
        scopes.push(MaintScope::ProbeGroups(groups.clone()));
    }
    if let Some(machines) = &input.machines {
        if machines.is_empty() {
            return Err(MasterError::invalid("\"machines\" must not be empty"));
        }
        scopes.push(MaintScope::Machines(machines.clone()));
    }
    match scopes.len() {
        0 => Err(MasterError::missing(
            "one of \"all\", \"probes\", \"probeGroups\", \"machines\"",
        )),
        1 => Ok(scopes.remove(0)),
        _ => Err(MasterError::invalid(
            "exactly one of \"all\", \"probes\", \"probeGroups\", \"machines\" may be given",
        )),
    }
}

/// Invoked after a window ends or is deleted; the event router uses it
/// to react to the end of suppression.
pub trait MaintenanceEndHandler: Send + Sync {
    fn maintenance_ended(&self, user: Uuid, id: u64);
}

pub struct MaintenanceEngine {
    kv: Arc<dyn Kv>,
    reaper: Reaper,
    end_handler: OnceLock<Arc<dyn MaintenanceEndHandler>>,
}

impl MaintenanceEngine {
    pub fn new(kv: Arc<dyn Kv>) -> Self {
        Self {
            kv,
            reaper: Reaper::new(),
            end_handler: OnceLock::new(),
        }
    }

    /// Wire the end hook; call once during assembly.
    pub fn set_end_handler(&self, handler: Arc<dyn MaintenanceEndHandler>) {
        let _ = self.end_handler.set(handler);
    }

    /// (Re-)arm the expiry reaper at the next window to expire. Must be
    /// called whenever a window is created, deleted, or found bogus —
    /// and once at startup.
    pub fn poke(self: &Arc<Self>) {
        self.reaper.arm(Arc::clone(self));
    }

    pub async fn create(
        self: &Arc<Self>,
        user: Uuid,
        input: MaintenanceInput,
    ) -> Result<Maintenance, MasterError> {
        let now = Utc::now().timestamp_millis();
        let start = input
            .start
            .clone()
            .unwrap_or(TimeSpec::Word("now".to_string()))
            .resolve_start(now)?;
        let end = input
            .end
            .clone()
            .ok_or_else(|| MasterError::missing("end"))?
            .resolve_end(now)?;
        if start >= end {
            return Err(MasterError::invalid("\"start\" must be before \"end\""));
        }
        let scope = scope_from_input(&input)?;

        let id = self
            .kv
            .hincrby(KEY_MAINT_IDS, &user.to_string(), 1)
            .await
            .map_err(|e| kv_internal("maintenance id allocation", e))? as u64;

        let maint = Maintenance {
            user,
            id,
            start,
            end,
            notes: input.notes,
            scope,
        };
        let key = window_key(user, id);
        self.kv
            .tx(vec![
                KvOp::Sadd {
                    key: set_key(user),
                    member: id.to_string(),
                },
                KvOp::Zadd {
                    key: KEY_BY_END.to_string(),
                    score: end,
                    member: key.clone(),
                },
                KvOp::HsetAll {
                    key,
                    fields: maint.to_fields(),
                },
            ])
            .await
            .map_err(|e| kv_internal("maintenance create", e))?;

        tracing::info!(user = %user, id = id, start = start, end = end, "Maintenance window created");
        self.poke();
        Ok(maint)
    }

    /// Fetch one window. An id at or below the user's counter that is no
    /// longer present is `Gone`; an id never issued is `ResourceNotFound`.
    pub async fn get(self: &Arc<Self>, user: Uuid, id: u64) -> Result<Maintenance, MasterError> {
        let fields = self
            .kv
            .hgetall(&window_key(user, id))
            .await
            .map_err(|e| kv_internal("maintenance get", e))?;

        if !fields.is_empty() {
            match Maintenance::from_fields(&fields) {
                Ok(maint) => return Ok(maint),
                Err(e) => {
                    tracing::warn!(user = %user, id = id, error = %e, "bogus maintenance window, self-healing");
                    self.schedule_heal(user, id);
                }
            }
        }

        let counter: u64 = self
            .kv
            .hget(KEY_MAINT_IDS, &user.to_string())
            .await
            .map_err(|e| kv_internal("maintenance counter read", e))?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        if id > 0 && id <= counter {
            Err(MasterError::Gone(format!(
                "maintenance {id} no longer exists"
            )))
        } else {
            Err(MasterError::ResourceNotFound(format!(
                "maintenance {id} not found"
            )))
        }
    }

    /// All live windows for a user, fetched in parallel and ordered by
    /// id. Bogus records are dropped from the result and self-healed in
    /// the background so the reaper cannot spin on them.
    pub async fn list(self: &Arc<Self>, user: Uuid) -> Result<Vec<Maintenance>, MasterError> {
        let members = self
            .kv
            .smembers(&set_key(user))
            .await
            .map_err(|e| kv_internal("maintenance list", e))?;

        let mut ids: Vec<u64> = members.iter().filter_map(|m| m.parse().ok()).collect();
        ids.sort_unstable();

        let fetches = ids.iter().map(|id| {
            let key = window_key(user, *id);
            let kv = Arc::clone(&self.kv);
            async move { kv.hgetall(&key).await }
        });
        let results = futures::future::join_all(fetches).await;

        let mut windows = Vec::with_capacity(ids.len());
        for (id, fetched) in ids.into_iter().zip(results) {
            let fields = fetched.map_err(|e| kv_internal("maintenance fetch", e))?;
            match Maintenance::from_fields(&fields) {
                Ok(maint) => windows.push(maint),
                Err(e) => {
                    tracing::warn!(user = %user, id = id, error = %e, "bogus maintenance window, self-healing");
                    self.schedule_heal(user, id);
                }
            }
        }
        Ok(windows)
    }

    /// Operator view: every live window across users.
    pub async fn list_all(self: &Arc<Self>) -> Result<Vec<Maintenance>, MasterError> {
        let keys = self
            .kv
            .keys("maintenance:*")
            .await
            .map_err(|e| kv_internal("maintenance scan", e))?;

        let mut windows = Vec::new();
        for key in keys {
            let Some((user, id)) = parse_window_key(&key) else {
                continue;
            };
            let fields = self
                .kv
                .hgetall(&key)
                .await
                .map_err(|e| kv_internal("maintenance fetch", e))?;
            match Maintenance::from_fields(&fields) {
                Ok(maint) => windows.push(maint),
                Err(e) => {
                    tracing::warn!(user = %user, id = id, error = %e, "bogus maintenance window, self-healing");
                    self.schedule_heal(user, id);
                }
            }
        }
        windows.sort_by_key(|w| (w.user, w.id));
        Ok(windows)
    }

    /// Remove a window: one multi-op across the per-user set, the time
    /// index, and the hash. Fires the end hook and re-arms the reaper.
    pub async fn delete(self: &Arc<Self>, user: Uuid, id: u64) -> Result<(), MasterError> {
        self.kv
            .tx(vec![
                KvOp::Srem {
                    key: set_key(user),
                    member: id.to_string(),
                },
                KvOp::Zrem {
                    key: KEY_BY_END.to_string(),
                    member: window_key(user, id),
                },
                KvOp::Del {
                    key: window_key(user, id),
                },
            ])
            .await
            .map_err(|e| kv_internal("maintenance delete", e))?;

        tracing::info!(user = %user, id = id, "Maintenance window deleted");
        if let Some(handler) = self.end_handler.get() {
            handler.maintenance_ended(user, id);
        }
        self.poke();
        Ok(())
    }

    /// First window of the event's owner that covers the event, if any.
    /// One match suffices; overlapping windows beyond the first are not
    /// reported. Linear in the user's window count, which stays small in
    /// practice.
    pub async fn event_in_maintenance(
        self: &Arc<Self>,
        event: &Event,
        group: Option<Uuid>,
    ) -> Result<Option<Maintenance>, MasterError> {
        let windows = self.list(event.user()).await?;
        Ok(windows.into_iter().find(|w| {
            w.covers(event.time_ms(), event.probe_uuid, group, event.machine)
        }))
    }

    fn schedule_heal(self: &Arc<Self>, user: Uuid, id: u64) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = engine.delete(user, id).await {
                tracing::warn!(user = %user, id = id, error = %e, "maintenance self-heal failed");
            }
        });
    }
}

fn kv_internal(context: &str, e: amon_storage::StorageError) -> MasterError {
    tracing::error!(context = context, error = %e, "KV operation failed");
    MasterError::internal(format!("{context} failed"))
}

#[cfg(test)]
mod tests;
