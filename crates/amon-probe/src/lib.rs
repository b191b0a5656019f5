//! Probe-kind capability registry.
//!
//! A probe's `type` field selects a [`ProbeKind`]: the capability object
//! that validates the probe's type-specific `config` and declares where
//! the probe may run. The master never executes probes — agents do — so a
//! kind here is pure metadata plus validation.

pub mod kinds;


use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;

/// Capabilities of one probe kind.
///
/// `runs_locally` kinds must target the agent's own machine (`agent` and
/// `machine` are the same UUID). `runs_in_vm_host` kinds watch a VM from
/// its physical host, so the probe's `agent` is the host server rather
/// than the VM itself. A kind is never both.
pub trait ProbeKind: Send + Sync {
    /// The wire name of this kind (the probe `type` field).
    fn name(&self) -> &str;

    fn runs_locally(&self) -> bool {
        false
    }

    fn runs_in_vm_host(&self) -> bool {
        false
    }

    /// Validate the probe's type-specific `config` object. Error messages
    /// surface verbatim to the API caller.
    fn validate_config(&self, config: &Value) -> Result<()>;
}

pub struct KindRegistry {
    kinds: HashMap<String, Box<dyn ProbeKind>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: Box<dyn ProbeKind>) {
        let name = kind.name().to_string();
        self.kinds.insert(name, kind);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ProbeKind> {
        self.kinds.get(name).map(Box::as_ref)
    }

    pub fn has_kind(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn kind_names(&self) -> Vec<&str> {
        self.kinds.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(kinds::log_scan::LogScanKind));
        registry.register(Box::new(kinds::icmp::IcmpKind));
        registry.register(Box::new(kinds::http::HttpKind));
        registry.register(Box::new(kinds::process::ProcessKind));
        registry.register(Box::new(kinds::machine_up::MachineUpKind));
        registry
    }
}
