use crate::ProbeKind;
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

/// Pings a host from wherever the probe's agent runs.
#[derive(Deserialize)]
struct IcmpConfig {
    host: String,
    /// Pings per check (default 3).
    count: Option<u32>,
}

pub struct IcmpKind;

impl ProbeKind for IcmpKind {
    fn name(&self) -> &str {
        "icmp"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let cfg: IcmpConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("invalid icmp config: {e}"))?;
        if cfg.host.is_empty() {
            anyhow::bail!("invalid icmp config: \"host\" is empty");
        }
        if cfg.count == Some(0) {
            anyhow::bail!("invalid icmp config: \"count\" must be >= 1");
        }
        Ok(())
    }
}
