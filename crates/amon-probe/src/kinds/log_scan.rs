use crate::ProbeKind;
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

/// Scans a log file for a pattern; fires when the match count in a period
/// crosses the threshold. Runs on the machine that owns the log.
#[derive(Deserialize)]
struct LogScanConfig {
    path: String,
    regex: String,
    /// Matches per period before the probe fires (default 1).
    threshold: Option<u32>,
    /// Scan period in seconds (default 60).
    period: Option<u64>,
}

pub struct LogScanKind;

impl ProbeKind for LogScanKind {
    fn name(&self) -> &str {
        "log-scan"
    }

    fn runs_locally(&self) -> bool {
        true
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let cfg: LogScanConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("invalid log-scan config: {e}"))?;
        if cfg.path.is_empty() {
            anyhow::bail!("invalid log-scan config: \"path\" is empty");
        }
        regex::Regex::new(&cfg.regex)
            .map_err(|e| anyhow::anyhow!("invalid log-scan config: bad \"regex\": {e}"))?;
        if cfg.threshold == Some(0) {
            anyhow::bail!("invalid log-scan config: \"threshold\" must be >= 1");
        }
        if cfg.period == Some(0) {
            anyhow::bail!("invalid log-scan config: \"period\" must be >= 1");
        }
        Ok(())
    }
}
