use amon_master::app;
use amon_master::collaborators::{HttpServerInventory, HttpVmMetadata};
use amon_master::config::MasterConfig;
use amon_master::state::AppState;
use amon_notify::plugin::PluginRegistry;
use amon_storage::{Directory, Kv, LdapDirectory, RedisKv};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  amon-master [config.toml]    Start the master (default config/master.toml)");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("amon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if matches!(args.get(1).map(String::as_str), Some("--help" | "-h")) {
        print_usage();
        return Ok(());
    }
    let config_path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("config/master.toml");
    let config = MasterConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        directory = %config.directory.url,
        kv = %format!("{}:{}/{}", config.kv.host, config.kv.port, config.kv.db),
        plugins = config.plugins.len(),
        "amon-master starting"
    );

    // Backends: directory, KV, collaborator services.
    let dir: Arc<dyn Directory> = Arc::new(
        LdapDirectory::connect(
            &config.directory.url,
            &config.directory.bind_dn,
            &config.directory.bind_password,
        )
        .await?,
    );
    let kv: Arc<dyn Kv> =
        Arc::new(RedisKv::connect(&config.kv.host, config.kv.port, config.kv.db).await?);
    let vm_metadata = Arc::new(HttpVmMetadata::new(&config.vm_metadata.url));
    let inventory = Arc::new(HttpServerInventory::new(&config.server_inventory.url));

    let plugins = Arc::new(
        PluginRegistry::from_config(&config.plugins)
            .map_err(|e| anyhow::anyhow!("notification plugin setup failed: {e}"))?,
    );
    if plugins.is_empty() {
        tracing::warn!("No notification plugins configured; events will route to nowhere");
    }

    let http_port = config.http_port;
    let state = AppState::assemble(config, dir, kv, vm_metadata, inventory, plugins);

    // Point the expiry reaper at whatever is already in the store.
    state.maintenance.poke();

    let addr: SocketAddr = format!("0.0.0.0:{http_port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = app::build_http_app(state);
    tracing::info!(http = %addr, "Master started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
        })
        .await?;

    tracing::info!("Master stopped");
    Ok(())
}
