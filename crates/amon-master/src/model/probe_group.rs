//! Probe groups: named collections of probes sharing a contact list.

use crate::model::{probe_group_dn, user_dn, Caches};
use amon_common::error::MasterError;
use amon_storage::{Directory, Entry, SearchScope};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_NAME_LEN: usize = 512;

#[derive(Debug, Clone)]
pub struct ProbeGroup {
    pub uuid: Uuid,
    pub user: Uuid,
    pub name: String,
    pub contacts: Vec<String>,
    pub disabled: bool,
}

/// Wire input for create/put.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeGroupInput {
    pub name: Option<String>,
    #[serde(default)]
    pub contacts: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl ProbeGroup {
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "uuid": self.uuid,
            "user": self.user,
            "name": self.name,
            "contacts": self.contacts,
            "disabled": self.disabled,
        })
    }

    fn to_entry(&self, base_dn: &str) -> Entry {
        Entry::new(probe_group_dn(base_dn, self.user, self.uuid))
            .with_attr("objectclass", vec!["amonprobegroup".into()])
            .with_attr("uuid", vec![self.uuid.to_string()])
            .with_attr("user", vec![self.user.to_string()])
            .with_attr("name", vec![self.name.clone()])
            .with_attr("contacts", self.contacts.clone())
            .with_attr("disabled", vec![self.disabled.to_string()])
    }

    fn from_entry(entry: &Entry) -> Result<ProbeGroup, MasterError> {
        let bad = |what: &str| {
            tracing::error!(dn = %entry.dn, what = what, "bad probe group entry in directory");
            MasterError::internal("bad probe group entry in directory")
        };
        Ok(ProbeGroup {
            uuid: entry
                .first("uuid")
                .and_then(|v| Uuid::parse_str(v).ok())
                .ok_or_else(|| bad("uuid"))?,
            user: entry
                .first("user")
                .and_then(|v| Uuid::parse_str(v).ok())
                .ok_or_else(|| bad("user"))?,
            name: entry.first("name").ok_or_else(|| bad("name"))?.to_string(),
            contacts: entry.values("contacts").to_vec(),
            disabled: entry.first("disabled") == Some("true"),
        })
    }
}

pub struct ProbeGroupModel {
    dir: Arc<dyn Directory>,
    caches: Arc<Caches>,
    base_dn: String,
}

impl ProbeGroupModel {
    pub fn new(dir: Arc<dyn Directory>, caches: Arc<Caches>, base_dn: &str) -> Self {
        Self {
            dir,
            caches,
            base_dn: base_dn.to_string(),
        }
    }

    pub async fn list(&self, user: Uuid) -> Result<Vec<ProbeGroup>, MasterError> {
        let cache_key = user.to_string();
        if let Some(groups) = self.caches.group_list.get(&cache_key) {
            return Ok(groups);
        }

        let entries = self
            .dir
            .search(
                &user_dn(&self.base_dn, user),
                SearchScope::One,
                "(objectclass=amonprobegroup)",
            )
            .await
            .map_err(|e| {
                tracing::error!(user = %user, error = %e, "probe group list failed");
                MasterError::internal("probe group list failed")
            })?;

        let mut groups = Vec::with_capacity(entries.len());
        for entry in &entries {
            groups.push(ProbeGroup::from_entry(entry)?);
        }
        groups.sort_by_key(|g| g.uuid);
        self.caches.group_list.set(&cache_key, groups.clone());
        Ok(groups)
    }

    pub async fn get(&self, user: Uuid, uuid: Uuid) -> Result<Option<ProbeGroup>, MasterError> {
        let dn = probe_group_dn(&self.base_dn, user, uuid);
        if let Some(cached) = self.caches.group_get.get(&dn) {
            return Ok(cached);
        }

        let found = self.dir.get(&dn).await.map_err(|e| {
            tracing::error!(user = %user, group = %uuid, error = %e, "probe group get failed");
            MasterError::internal("probe group get failed")
        })?;
        let group = match found {
            Some(entry) => Some(ProbeGroup::from_entry(&entry)?),
            None => None,
        };
        self.caches.group_get.set(&dn, group.clone());
        Ok(group)
    }

    /// Create or replace; the acting user is the owner.
    pub async fn put(
        &self,
        user: Uuid,
        uuid: Uuid,
        input: ProbeGroupInput,
    ) -> Result<ProbeGroup, MasterError> {
        let name = input.name.ok_or_else(|| MasterError::missing("name"))?;
        if name.len() > MAX_NAME_LEN {
            return Err(MasterError::invalid(format!(
                "\"name\" is longer than {MAX_NAME_LEN} characters"
            )));
        }
        for urn in &input.contacts {
            crate::model::contact::parse_urn(urn)?;
        }

        let group = ProbeGroup {
            uuid,
            user,
            name,
            contacts: input.contacts,
            disabled: input.disabled,
        };
        let entry = group.to_entry(&self.base_dn);
        self.dir.put(&entry).await.map_err(|e| {
            tracing::error!(user = %user, group = %uuid, error = %e, "probe group write failed");
            MasterError::internal("probe group write failed")
        })?;

        self.caches.invalidate_probe_group(&entry.dn);
        tracing::info!(user = %user, group = %uuid, name = %group.name, "Probe group written");
        Ok(group)
    }

    pub async fn delete(&self, user: Uuid, uuid: Uuid) -> Result<(), MasterError> {
        let dn = probe_group_dn(&self.base_dn, user, uuid);
        if self.get(user, uuid).await?.is_none() {
            return Err(MasterError::ResourceNotFound(format!(
                "probe group {uuid} not found"
            )));
        }

        self.dir.del(&dn).await.map_err(|e| {
            tracing::error!(user = %user, group = %uuid, error = %e, "probe group delete failed");
            MasterError::internal("probe group delete failed")
        })?;

        self.caches.invalidate_probe_group(&dn);
        tracing::info!(user = %user, group = %uuid, "Probe group deleted");
        Ok(())
    }
}
