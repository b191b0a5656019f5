use crate::NotificationPlugin;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct SmsConfig {
    gateway_url: String,
    api_key: String,
}

/// Delivers through an HTTP SMS gateway: `POST {gateway_url}` with a
/// bearer key and a `{to, message}` JSON body.
pub struct SmsPlugin {
    name: String,
    client: reqwest::Client,
    gateway_url: String,
    api_key: String,
}

impl SmsPlugin {
    pub fn from_config(name: &str, config: &Value) -> Result<Self> {
        let cfg: SmsConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("invalid sms config: {e}"))?;
        if cfg.gateway_url.is_empty() {
            anyhow::bail!("invalid sms config: \"gateway_url\" is empty");
        }
        Ok(Self {
            name: name.to_string(),
            client: reqwest::Client::new(),
            gateway_url: cfg.gateway_url,
            api_key: cfg.api_key,
        })
    }
}

#[async_trait]
impl NotificationPlugin for SmsPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts_medium(&self, attr_name: &str) -> bool {
        let lower = attr_name.to_ascii_lowercase();
        lower == "sms" || lower.contains("phone")
    }

    async fn notify(&self, probe_name: &str, address: &str, message: &str) -> Result<()> {
        let payload = serde_json::json!({
            "to": address,
            "message": format!("[amon] {probe_name}: {message}"),
        });

        let mut last_err = None;
        for attempt in 0..3u32 {
            match self
                .client
                .post(&self.gateway_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    last_err = None;
                    break;
                }
                Ok(resp) => {
                    let status = resp.status();
                    tracing::warn!(
                        attempt = attempt + 1,
                        to = %address,
                        status = %status,
                        "SMS gateway returned error, retrying"
                    );
                    last_err = Some(anyhow::anyhow!("HTTP {status}"));
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        to = %address,
                        error = %e,
                        "SMS send failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt < 2 {
                tokio::time::sleep(std::time::Duration::from_millis(100 * 2u64.pow(attempt))).await;
            }
        }

        match last_err {
            None => {
                tracing::info!(plugin = %self.name, to = %address, probe = %probe_name, "SMS sent");
                Ok(())
            }
            Some(e) => Err(e),
        }
    }
}
