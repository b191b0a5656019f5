//! Probes: validation, persistence, and write authorization.

use crate::collaborators::{ServerInventory, Vm, VmMetadata};
use crate::model::probe_group::ProbeGroupModel;
use crate::model::user::User;
use crate::model::{probe_dn, users_base, Caches};
use amon_common::error::MasterError;
use amon_probe::{KindRegistry, ProbeKind};
use amon_storage::{Directory, Entry, SearchScope};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_NAME_LEN: usize = 512;

#[derive(Debug, Clone)]
pub struct Probe {
    pub uuid: Uuid,
    pub user: Uuid,
    pub name: Option<String>,
    /// Probe kind, e.g. `log-scan`.
    pub kind: String,
    /// The agent that executes this probe.
    pub agent: Uuid,
    /// The machine the probe watches.
    pub machine: Uuid,
    pub group: Option<Uuid>,
    pub contacts: Vec<String>,
    pub config: Option<Value>,
    pub disabled: bool,
    /// Private: the probe runs on the machine's physical host. Relays
    /// and agents see this; the public API does not.
    pub run_in_vm_host: bool,
}

/// Wire input for create/put.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeInput {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub agent: Option<Uuid>,
    pub machine: Option<Uuid>,
    pub group: Option<Uuid>,
    #[serde(default)]
    pub contacts: Vec<String>,
    pub config: Option<Value>,
    #[serde(default)]
    pub disabled: bool,
}

impl Probe {
    /// Serialization for the external `/pub` API: private fields omitted.
    pub fn public_json(&self) -> Value {
        self.to_json(false)
    }

    /// Serialization for relays and agents: adds `runInVmHost`.
    pub fn internal_json(&self) -> Value {
        self.to_json(true)
    }

    fn to_json(&self, internal: bool) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("uuid".into(), Value::String(self.uuid.to_string()));
        map.insert("user".into(), Value::String(self.user.to_string()));
        if let Some(name) = &self.name {
            map.insert("name".into(), Value::String(name.clone()));
        }
        map.insert("type".into(), Value::String(self.kind.clone()));
        map.insert("agent".into(), Value::String(self.agent.to_string()));
        map.insert("machine".into(), Value::String(self.machine.to_string()));
        if let Some(group) = self.group {
            map.insert("group".into(), Value::String(group.to_string()));
        }
        map.insert(
            "contacts".into(),
            Value::Array(self.contacts.iter().cloned().map(Value::String).collect()),
        );
        if let Some(config) = &self.config {
            map.insert("config".into(), config.clone());
        }
        map.insert("disabled".into(), Value::Bool(self.disabled));
        if internal {
            map.insert("runInVmHost".into(), Value::Bool(self.run_in_vm_host));
        }
        Value::Object(map)
    }

    fn to_entry(&self, base_dn: &str) -> Entry {
        let mut entry = Entry::new(probe_dn(base_dn, self.user, self.uuid))
            .with_attr("objectclass", vec!["amonprobe".into()])
            .with_attr("uuid", vec![self.uuid.to_string()])
            .with_attr("user", vec![self.user.to_string()])
            .with_attr("type", vec![self.kind.clone()])
            .with_attr("agent", vec![self.agent.to_string()])
            .with_attr("machine", vec![self.machine.to_string()])
            .with_attr("contacts", self.contacts.clone())
            .with_attr("disabled", vec![self.disabled.to_string()])
            .with_attr("runinvmhost", vec![self.run_in_vm_host.to_string()]);
        if let Some(name) = &self.name {
            entry = entry.with_attr("name", vec![name.clone()]);
        }
        if let Some(group) = self.group {
            entry = entry.with_attr("group", vec![group.to_string()]);
        }
        if let Some(config) = &self.config {
            entry = entry.with_attr("config", vec![config.to_string()]);
        }
        entry
    }

    fn from_entry(entry: &Entry) -> Result<Probe, MasterError> {
        let bad = |what: &str| {
            tracing::error!(dn = %entry.dn, what = what, "bad probe entry in directory");
            MasterError::internal("bad probe entry in directory")
        };
        let parse_uuid = |attr: &str| -> Result<Uuid, MasterError> {
            entry
                .first(attr)
                .and_then(|v| Uuid::parse_str(v).ok())
                .ok_or_else(|| bad(attr))
        };
        let config = match entry.first("config") {
            Some(raw) => Some(serde_json::from_str(raw).map_err(|_| bad("config"))?),
            None => None,
        };
        Ok(Probe {
            uuid: parse_uuid("uuid")?,
            user: parse_uuid("user")?,
            name: entry.first("name").map(str::to_string),
            kind: entry.first("type").ok_or_else(|| bad("type"))?.to_string(),
            agent: parse_uuid("agent")?,
            machine: parse_uuid("machine")?,
            group: entry
                .first("group")
                .map(|v| Uuid::parse_str(v).map_err(|_| bad("group")))
                .transpose()?,
            contacts: entry.values("contacts").to_vec(),
            config,
            disabled: entry.first("disabled") == Some("true"),
            run_in_vm_host: entry.first("runinvmhost") == Some("true"),
        })
    }
}

pub struct ProbeModel {
    dir: Arc<dyn Directory>,
    caches: Arc<Caches>,
    kinds: Arc<KindRegistry>,
    vm_metadata: Arc<dyn VmMetadata>,
    inventory: Arc<dyn ServerInventory>,
    groups: Arc<ProbeGroupModel>,
    admin_uuid: Option<Uuid>,
    base_dn: String,
}

impl ProbeModel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dir: Arc<dyn Directory>,
        caches: Arc<Caches>,
        kinds: Arc<KindRegistry>,
        vm_metadata: Arc<dyn VmMetadata>,
        inventory: Arc<dyn ServerInventory>,
        groups: Arc<ProbeGroupModel>,
        admin_uuid: Option<Uuid>,
        base_dn: &str,
    ) -> Self {
        Self {
            dir,
            caches,
            kinds,
            vm_metadata,
            inventory,
            groups,
            admin_uuid,
            base_dn: base_dn.to_string(),
        }
    }

    pub async fn list(&self, user: Uuid) -> Result<Vec<Probe>, MasterError> {
        let cache_key = user.to_string();
        if let Some(probes) = self.caches.probe_list.get(&cache_key) {
            return Ok(probes);
        }

        let entries = self
            .dir
            .search(
                &crate::model::user_dn(&self.base_dn, user),
                SearchScope::One,
                "(objectclass=amonprobe)",
            )
            .await
            .map_err(|e| {
                tracing::error!(user = %user, error = %e, "probe list failed");
                MasterError::internal("probe list failed")
            })?;

        let mut probes = Vec::with_capacity(entries.len());
        for entry in &entries {
            probes.push(Probe::from_entry(entry)?);
        }
        probes.sort_by_key(|p| p.uuid);
        self.caches.probe_list.set(&cache_key, probes.clone());
        Ok(probes)
    }

    pub async fn get(&self, user: Uuid, uuid: Uuid) -> Result<Option<Probe>, MasterError> {
        let dn = probe_dn(&self.base_dn, user, uuid);
        if let Some(cached) = self.caches.probe_get.get(&dn) {
            return Ok(cached);
        }

        let found = self.dir.get(&dn).await.map_err(|e| {
            tracing::error!(user = %user, probe = %uuid, error = %e, "probe get failed");
            MasterError::internal("probe get failed")
        })?;
        let probe = match found {
            Some(entry) => Some(Probe::from_entry(&entry)?),
            None => None,
        };
        self.caches.probe_get.set(&dn, probe.clone());
        Ok(probe)
    }

    /// Every probe (across users) executed by `agent`, sorted by UUID.
    pub async fn list_by_agent(&self, agent: Uuid) -> Result<Vec<Probe>, MasterError> {
        let filter = format!("(&(objectclass=amonprobe)(agent={agent}))");
        let entries = self
            .dir
            .search(&users_base(&self.base_dn), SearchScope::Sub, &filter)
            .await
            .map_err(|e| {
                tracing::error!(agent = %agent, error = %e, "probe search by agent failed");
                MasterError::internal("probe search failed")
            })?;

        let mut probes = Vec::with_capacity(entries.len());
        for entry in &entries {
            probes.push(Probe::from_entry(entry)?);
        }
        probes.sort_by_key(|p| p.uuid);
        Ok(probes)
    }

    /// Validate, authorize, persist. `actor` owns the probe; the write
    /// sequence is validate → authorize → persist → invalidate caches.
    pub async fn put(
        &self,
        actor: &User,
        uuid: Uuid,
        input: ProbeInput,
        skip_authz: bool,
    ) -> Result<Probe, MasterError> {
        let (mut probe, kind) = self.validate(actor.uuid, uuid, input).await?;
        self.authorize_put(actor, &mut probe, kind, skip_authz)
            .await?;

        // A PUT may move the probe to another agent; the manifest cache
        // for the old agent goes stale too.
        let prior_agent = self
            .get(actor.uuid, uuid)
            .await?
            .map(|existing| existing.agent);

        let entry = probe.to_entry(&self.base_dn);
        self.dir.put(&entry).await.map_err(|e| {
            tracing::error!(user = %actor.uuid, probe = %uuid, error = %e, "probe write failed");
            MasterError::internal("probe write failed")
        })?;

        self.caches.invalidate_probe(&entry.dn, probe.agent);
        if let Some(old_agent) = prior_agent {
            if old_agent != probe.agent {
                self.caches.agent_probes.del(&old_agent.to_string());
            }
        }

        tracing::info!(
            user = %actor.uuid,
            probe = %uuid,
            kind = %probe.kind,
            agent = %probe.agent,
            "Probe written"
        );
        Ok(probe)
    }

    /// Delete requires the actor to be the owner or an operator.
    pub async fn delete(&self, actor: &User, owner: Uuid, uuid: Uuid) -> Result<(), MasterError> {
        let probe = self
            .get(owner, uuid)
            .await?
            .ok_or_else(|| MasterError::ResourceNotFound(format!("probe {uuid} not found")))?;

        if actor.uuid != probe.user && !actor.operator {
            return Err(MasterError::invalid(
                "only the probe owner or an operator may delete a probe",
            ));
        }

        let dn = probe_dn(&self.base_dn, owner, uuid);
        self.dir.del(&dn).await.map_err(|e| {
            tracing::error!(user = %owner, probe = %uuid, error = %e, "probe delete failed");
            MasterError::internal("probe delete failed")
        })?;

        self.caches.invalidate_probe(&dn, probe.agent);
        tracing::info!(user = %owner, probe = %uuid, "Probe deleted");
        Ok(())
    }

    async fn validate(
        &self,
        user: Uuid,
        uuid: Uuid,
        input: ProbeInput,
    ) -> Result<(Probe, &dyn ProbeKind), MasterError> {
        let kind_name = input.kind.ok_or_else(|| MasterError::missing("type"))?;
        let kind = self
            .kinds
            .get(&kind_name)
            .ok_or_else(|| MasterError::invalid(format!("unknown probe type: \"{kind_name}\"")))?;

        if let Some(name) = &input.name {
            if name.len() > MAX_NAME_LEN {
                return Err(MasterError::invalid(format!(
                    "\"name\" is longer than {MAX_NAME_LEN} characters"
                )));
            }
        }

        // Where the probe runs constrains agent/machine.
        let (agent, machine) = if kind.runs_locally() {
            match (input.agent, input.machine) {
                (Some(a), Some(m)) if a != m => {
                    return Err(MasterError::invalid(format!(
                        "\"{kind_name}\" probes run locally: \"agent\" and \"machine\" must be equal"
                    )));
                }
                (Some(a), _) => (a, a),
                (None, Some(m)) => (m, m),
                (None, None) => return Err(MasterError::missing("agent")),
            }
        } else if kind.runs_in_vm_host() {
            let machine = input.machine.ok_or_else(|| MasterError::missing("machine"))?;
            // The real agent is the VM's physical host, resolved during
            // authorization; a placeholder keeps the field total.
            (input.agent.unwrap_or(machine), machine)
        } else {
            let agent = input.agent.ok_or_else(|| MasterError::missing("agent"))?;
            (agent, input.machine.unwrap_or(agent))
        };

        if let Some(group) = input.group {
            let found = self.groups.get(user, group).await?;
            if found.is_none() {
                return Err(MasterError::invalid(format!(
                    "probe group {group} does not exist"
                )));
            }
        }

        for urn in &input.contacts {
            crate::model::contact::parse_urn(urn)?;
        }

        let config = input.config.unwrap_or(Value::Null);
        kind.validate_config(&config)
            .map_err(|e| MasterError::invalid(e.to_string()))?;
        let config = match config {
            Value::Null => None,
            other => Some(other),
        };

        Ok((
            Probe {
                uuid,
                user,
                name: input.name,
                kind: kind_name,
                agent,
                machine,
                group: input.group,
                contacts: input.contacts,
                config,
                disabled: input.disabled,
                run_in_vm_host: kind.runs_in_vm_host(),
            },
            kind,
        ))
    }

    /// The write-authorization decision tree; the first matching rule
    /// authorizes. Collaborator lookup failures are internal errors,
    /// never denials.
    async fn authorize_put(
        &self,
        actor: &User,
        probe: &mut Probe,
        kind: &dyn ProbeKind,
        skip_authz: bool,
    ) -> Result<(), MasterError> {
        // Rule 1: the bootstrap escape hatch, admin only.
        if skip_authz && self.admin_uuid == Some(actor.uuid) {
            tracing::warn!(user = %actor.uuid, probe = %probe.uuid, "skipauthz honored");
            return Ok(());
        }

        // Rule 2: probes on physical servers are operator territory.
        if self.inventory.server_exists(probe.agent).await? {
            return if actor.operator {
                Ok(())
            } else {
                Err(MasterError::invalid(format!(
                    "agent {} is a physical server: operator access required",
                    probe.agent
                )))
            };
        }

        let vm = self.vm_metadata.get_vm(probe.machine).await?;

        // Rules 3 and 4.
        let authorized = match &vm {
            Some(vm) if vm.owner_uuid == actor.uuid => true,
            Some(_) if kind.runs_in_vm_host() && actor.operator => true,
            _ => false,
        };
        if !authorized {
            // Rule 5.
            return Err(MasterError::invalid(format!(
                "machine {} does not exist or is not owned by user {}",
                probe.machine, actor.uuid
            )));
        }

        // A vm-host probe executes on the machine's physical server.
        if kind.runs_in_vm_host() {
            if let Some(vm) = vm {
                probe.agent = vm.server_uuid;
            }
        }
        Ok(())
    }
}
