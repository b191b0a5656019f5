use crate::ProbeKind;
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct HttpConfig {
    url: String,
    method: Option<String>,
    /// Expected status (default: any 2xx).
    status_code: Option<u16>,
    /// Regex the response body must match.
    body_match: Option<String>,
}

pub struct HttpKind;

impl ProbeKind for HttpKind {
    fn name(&self) -> &str {
        "http"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let cfg: HttpConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("invalid http config: {e}"))?;
        url::Url::parse(&cfg.url)
            .map_err(|e| anyhow::anyhow!("invalid http config: bad \"url\": {e}"))?;
        if let Some(method) = &cfg.method {
            match method.as_str() {
                "GET" | "HEAD" | "POST" | "PUT" | "DELETE" | "OPTIONS" => {}
                other => anyhow::bail!("invalid http config: unsupported method \"{other}\""),
            }
        }
        if let Some(code) = cfg.status_code {
            if !(100..=599).contains(&code) {
                anyhow::bail!("invalid http config: \"status_code\" {code} out of range");
            }
        }
        if let Some(pattern) = &cfg.body_match {
            regex::Regex::new(pattern)
                .map_err(|e| anyhow::anyhow!("invalid http config: bad \"body_match\": {e}"))?;
        }
        Ok(())
    }
}
