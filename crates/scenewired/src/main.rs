//! scenewired — scene streaming render daemon.

use anyhow::Result;

use scenewire_core::config::ScenewireConfig;
use scenewired::Daemon;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = ScenewireConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = ScenewireConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        ScenewireConfig::default()
    });

    tracing::info!(
        listen_addr = %config.network.listen_addr,
        port = config.network.port,
        max_message_bytes = config.limits.max_message_bytes,
        max_blob_bytes = config.limits.max_blob_bytes,
        "scenewired starting"
    );

    let daemon = Daemon::bind(&config)?;
    daemon.run()
}
