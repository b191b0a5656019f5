use crate::NotificationPlugin;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct WebhookConfig {
    /// Optional template; `{{probe}}` and `{{message}}` are substituted.
    body_template: Option<String>,
}

/// POSTs the rendered message to the contact address itself — for this
/// plugin the user-record attribute holds the target URL.
pub struct WebhookPlugin {
    name: String,
    client: reqwest::Client,
    body_template: Option<String>,
}

impl WebhookPlugin {
    pub fn from_config(name: &str, config: &Value) -> Result<Self> {
        let cfg: WebhookConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("invalid webhook config: {e}"))?;
        Ok(Self {
            name: name.to_string(),
            client: reqwest::Client::new(),
            body_template: cfg.body_template,
        })
    }

    pub(crate) fn render_body(&self, probe_name: &str, message: &str) -> String {
        if let Some(template) = &self.body_template {
            template
                .replace("{{probe}}", probe_name)
                .replace("{{message}}", message)
        } else {
            serde_json::json!({
                "probe": probe_name,
                "message": message,
            })
            .to_string()
        }
    }
}

#[async_trait]
impl NotificationPlugin for WebhookPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts_medium(&self, attr_name: &str) -> bool {
        attr_name.to_ascii_lowercase().contains("webhook")
    }

    async fn notify(&self, probe_name: &str, address: &str, message: &str) -> Result<()> {
        let body = self.render_body(probe_name, message);

        let mut last_err = None;
        for attempt in 0..3u32 {
            match self
                .client
                .post(address)
                .header("Content-Type", "application/json")
                .body(body.clone())
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
                        url = %address,
                        status = %status,
                        "Webhook returned non-success status, retrying"
                    );
                    last_err = Some(anyhow::anyhow!("HTTP {status}"));
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %address,
                        error = %e,
                        "Webhook send failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt < 2 {
                tokio::time::sleep(std::time::Duration::from_millis(100 * 2u64.pow(attempt))).await;
            }
        }

        match last_err {
            None => Ok(()),
            Some(e) => {
                tracing::error!(url = %address, error = %e, "Webhook failed after 3 retries");
                Err(e)
            }
        }
    }
}
