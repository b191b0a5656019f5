use crate::ProbeKind;
use anyhow::Result;
use serde_json::Value;

/// Liveness of a whole VM, observed from its physical host. Takes no
/// configuration.
pub struct MachineUpKind;

impl ProbeKind for MachineUpKind {
    fn name(&self) -> &str {
        "machine-up"
    }

    fn runs_in_vm_host(&self) -> bool {
        true
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        match config {
            Value::Null => Ok(()),
            Value::Object(map) if map.is_empty() => Ok(()),
            _ => anyhow::bail!("machine-up probes take no config"),
        }
    }
}
