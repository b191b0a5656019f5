//! Clients for the external services the authorization rules consult:
//! the VM metadata service (who owns which VM, and on which physical
//! host it runs) and the server inventory (which UUIDs are physical
//! servers).
//!
//! A clean not-found is part of the contract; anything else is a fatal
//! internal error, never an authorization denial.

use amon_common::error::MasterError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

/// A virtual machine as the metadata service describes it.
#[derive(Debug, Clone, Deserialize)]
pub struct Vm {
    pub uuid: Uuid,
    pub owner_uuid: Uuid,
    /// Physical host the VM runs on.
    pub server_uuid: Uuid,
}

#[async_trait]
pub trait VmMetadata: Send + Sync {
    async fn get_vm(&self, machine: Uuid) -> Result<Option<Vm>, MasterError>;
}

#[async_trait]
pub trait ServerInventory: Send + Sync {
    async fn server_exists(&self, server: Uuid) -> Result<bool, MasterError>;
}

// ── HTTP backends ───────────────────────────────────────────────────

pub struct HttpVmMetadata {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVmMetadata {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl VmMetadata for HttpVmMetadata {
    async fn get_vm(&self, machine: Uuid) -> Result<Option<Vm>, MasterError> {
        let url = format!("{}/vms/{machine}", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!(machine = %machine, error = %e, "VM metadata lookup failed");
            MasterError::internal("VM metadata lookup failed")
        })?;

        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            tracing::error!(machine = %machine, status = %resp.status(), "VM metadata lookup failed");
            return Err(MasterError::internal("VM metadata lookup failed"));
        }
        let vm: Vm = resp.json().await.map_err(|e| {
            tracing::error!(machine = %machine, error = %e, "VM metadata returned bad body");
            MasterError::internal("VM metadata lookup failed")
        })?;
        Ok(Some(vm))
    }
}

pub struct HttpServerInventory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpServerInventory {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ServerInventory for HttpServerInventory {
    async fn server_exists(&self, server: Uuid) -> Result<bool, MasterError> {
        let url = format!("{}/servers/{server}", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!(server = %server, error = %e, "Server inventory lookup failed");
            MasterError::internal("server inventory lookup failed")
        })?;

        if resp.status().as_u16() == 404 {
            Ok(false)
        } else if resp.status().is_success() {
            Ok(true)
        } else {
            tracing::error!(server = %server, status = %resp.status(), "Server inventory lookup failed");
            Err(MasterError::internal("server inventory lookup failed"))
        }
    }
}

// ── In-memory fakes (tests, standalone development) ─────────────────

#[derive(Default)]
pub struct MemVmMetadata {
    vms: Mutex<HashMap<Uuid, Vm>>,
}

impl MemVmMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vm(&self, vm: Vm) {
        self.vms.lock().unwrap().insert(vm.uuid, vm);
    }
}

#[async_trait]
impl VmMetadata for MemVmMetadata {
    async fn get_vm(&self, machine: Uuid) -> Result<Option<Vm>, MasterError> {
        Ok(self.vms.lock().unwrap().get(&machine).cloned())
    }
}

#[derive(Default)]
pub struct MemServerInventory {
    servers: Mutex<HashSet<Uuid>>,
}

impl MemServerInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_server(&self, server: Uuid) {
        self.servers.lock().unwrap().insert(server);
    }
}

#[async_trait]
impl ServerInventory for MemServerInventory {
    async fn server_exists(&self, server: Uuid) -> Result<bool, MasterError> {
        Ok(self.servers.lock().unwrap().contains(&server))
    }
}
