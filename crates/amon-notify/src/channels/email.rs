use crate::NotificationPlugin;
use anyhow::Result;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct EmailConfig {
    smtp_host: String,
    smtp_port: Option<u16>,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    from: String,
}

pub struct EmailPlugin {
    name: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl EmailPlugin {
    pub fn from_config(name: &str, config: &Value) -> Result<Self> {
        let cfg: EmailConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("invalid email config: {e}"))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)?;
        if let Some(port) = cfg.smtp_port {
            builder = builder.port(port);
        }
        if let (Some(user), Some(pass)) = (&cfg.smtp_username, &cfg.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            name: name.to_string(),
            transport: builder.build(),
            from: cfg.from,
        })
    }
}

#[async_trait]
impl NotificationPlugin for EmailPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts_medium(&self, attr_name: &str) -> bool {
        // "email" itself plus secondary address attributes like
        // "secondaryemail" or "opsemail".
        attr_name.eq_ignore_ascii_case("email")
            || attr_name.to_ascii_lowercase().ends_with("email")
    }

    async fn notify(&self, probe_name: &str, address: &str, message: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(address.parse()?)
            .subject(format!("[amon] {probe_name}"))
            .header(ContentType::TEXT_PLAIN)
            .body(message.to_string())?;

        self.transport.send(email).await?;
        tracing::info!(plugin = %self.name, to = %address, probe = %probe_name, "Email sent");
        Ok(())
    }
}
