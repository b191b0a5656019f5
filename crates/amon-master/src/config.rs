use amon_notify::plugin::PluginSpec;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct MasterConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// The bootstrap admin. Only this user may use the `skipauthz` escape
    /// hatch on probe writes.
    pub admin_uuid: Option<Uuid>,

    pub directory: DirectoryConfig,
    #[serde(default)]
    pub kv: KvConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub vm_metadata: CollaboratorConfig,
    pub server_inventory: CollaboratorConfig,

    /// Notification plugin registry; order fixes medium resolution.
    #[serde(default)]
    pub plugins: Vec<PluginSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    pub url: String,
    pub bind_dn: String,
    pub bind_password: String,
    #[serde(default = "default_base_dn")]
    pub base_dn: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KvConfig {
    #[serde(default = "default_kv_host")]
    pub host: String,
    #[serde(default = "default_kv_port")]
    pub port: u16,
    /// Numbered logical database, selected once at startup.
    #[serde(default = "default_kv_db")]
    pub db: u32,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            host: default_kv_host(),
            port: default_kv_port(),
            db: default_kv_db(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Sentinel: when true every cache get is a miss and every set a no-op.
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_user_capacity")]
    pub user_capacity: usize,
    #[serde(default = "default_ttl_secs")]
    pub user_ttl_secs: u64,
    #[serde(default = "default_ttl_secs")]
    pub probe_ttl_secs: u64,
    #[serde(default = "default_ttl_secs")]
    pub agent_probes_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            user_capacity: default_user_capacity(),
            user_ttl_secs: default_ttl_secs(),
            probe_ttl_secs: default_ttl_secs(),
            agent_probes_ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollaboratorConfig {
    pub url: String,
}

fn default_http_port() -> u16 {
    8080
}

fn default_base_dn() -> String {
    "o=smartdc".to_string()
}

fn default_kv_host() -> String {
    "127.0.0.1".to_string()
}

fn default_kv_port() -> u16 {
    6379
}

fn default_kv_db() -> u32 {
    1
}

fn default_user_capacity() -> usize {
    1000
}

fn default_ttl_secs() -> u64 {
    300
}

impl MasterConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
