use crate::ProbeKind;
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

/// Watches a named process (or a pidfile) on the agent's own machine.
#[derive(Deserialize)]
struct ProcessConfig {
    name: Option<String>,
    pid_file: Option<String>,
}

pub struct ProcessKind;

impl ProbeKind for ProcessKind {
    fn name(&self) -> &str {
        "process"
    }

    fn runs_locally(&self) -> bool {
        true
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let cfg: ProcessConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("invalid process config: {e}"))?;
        match (&cfg.name, &cfg.pid_file) {
            (None, None) => {
                anyhow::bail!("invalid process config: one of \"name\" or \"pid_file\" is required")
            }
            (Some(n), _) if n.is_empty() => {
                anyhow::bail!("invalid process config: \"name\" is empty")
            }
            (_, Some(p)) if p.is_empty() => {
                anyhow::bail!("invalid process config: \"pid_file\" is empty")
            }
            _ => Ok(()),
        }
    }
}
