use crate::channels::{email::EmailPlugin, sms::SmsPlugin, webhook::WebhookPlugin};
use crate::NotificationPlugin;
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// One `[[plugins]]` entry from the master config.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    /// Implementation selector: `email`, `sms` or `webhook`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Value,
}

/// The ordered plugin registry.
///
/// Order matters: medium resolution walks the list and the first plugin
/// whose `accepts_medium` returns true wins, so the configuration order
/// fixes the attribute → medium mapping for the life of the process.
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn NotificationPlugin>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    pub fn register(&mut self, plugin: Arc<dyn NotificationPlugin>) {
        self.plugins.push(plugin);
    }

    /// Instantiate every configured plugin, in configuration order.
    pub fn from_config(specs: &[PluginSpec]) -> Result<Self> {
        let mut registry = Self::new();
        for spec in specs {
            let plugin: Arc<dyn NotificationPlugin> = match spec.kind.as_str() {
                "email" => Arc::new(EmailPlugin::from_config(&spec.name, &spec.config)?),
                "sms" => Arc::new(SmsPlugin::from_config(&spec.name, &spec.config)?),
                "webhook" => Arc::new(WebhookPlugin::from_config(&spec.name, &spec.config)?),
                other => anyhow::bail!("unknown notification plugin type: {other}"),
            };
            tracing::info!(name = %spec.name, kind = %spec.kind, "Loaded notification plugin");
            registry.register(plugin);
        }
        Ok(registry)
    }

    /// The first registered plugin that accepts `attr_name` as a medium.
    pub fn plugin_for_medium(&self, attr_name: &str) -> Option<Arc<dyn NotificationPlugin>> {
        self.plugins
            .iter()
            .find(|p| p.accepts_medium(attr_name))
            .cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn NotificationPlugin>> {
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
