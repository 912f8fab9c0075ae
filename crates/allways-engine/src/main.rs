//! AllWays engine binary.
//!
//! Wires the persistence backend, status channel, core, observer server
//! and NATS field bridge together and runs until the process is stopped.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `allways-config.yaml` (or `ALLWAYS_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Open the persistence backend and run migrations
//! 4. Create the status channel and assemble the core
//! 5. Start the observer API server
//! 6. Start the NATS bridge, or wait on the observer if it is disabled

mod error;
mod nats_bridge;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use allways_core::config::{LoggingConfig, StorageConfig};
use allways_core::{AllwaysConfig, AllwaysCore, StorageBackend};
use allways_db::{MemoryStore, PostgresOptions, PostgresStore, Store};
use allways_events::StatusChannel;
use allways_observer::{AppState, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::nats_bridge::NatsBridge;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("allways-engine starting");
    match &config_path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }

    // 3. Open the persistence backend.
    let store = open_store(&config.storage).await?;

    // 4. Status channel and core.
    let channel = StatusChannel::with_capacity(config.channel.capacity);
    let core = AllwaysCore::new(store, channel)
        .with_recent_log_limit(config.monitor.recent_log_limit);
    info!(
        channel_capacity = config.channel.capacity,
        recent_log_limit = config.monitor.recent_log_limit,
        "Core assembled"
    );

    // 5. Observer API server.
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let observer = allways_observer::spawn_observer(
        server_config,
        Arc::new(AppState::new(core.clone())),
    )
    .map_err(|e| EngineError::Observer {
        message: format!("{e}"),
    })?;
    info!(port = config.server.port, "Observer API server started");

    // 6. NATS bridge.
    if config.realtime.enabled {
        info!(
            nats_url = config.realtime.nats_url,
            subject_prefix = config.realtime.subject_prefix,
            "Connecting to NATS"
        );
        let bridge = NatsBridge::connect(
            &config.realtime.nats_url,
            &config.realtime.subject_prefix,
            core,
        )
        .await?;
        let _outbound = bridge.spawn_outbound();
        info!("NATS bridge connected");
        bridge.run_inbound().await?;
        warn!("NATS inbound subscriptions ended");
    } else {
        info!("Realtime bridge disabled");
    }

    observer.await.map_err(|e| EngineError::Observer {
        message: format!("observer task failed: {e}"),
    })?;
    info!("allways-engine shutdown complete");
    Ok(())
}

/// Load configuration from `ALLWAYS_CONFIG` or `allways-config.yaml` in the
/// working directory. Without a file, defaults plus environment overrides
/// are used.
fn load_config() -> Result<(AllwaysConfig, Option<PathBuf>), EngineError> {
    let path = std::env::var_os("ALLWAYS_CONFIG")
        .map_or_else(|| PathBuf::from("allways-config.yaml"), PathBuf::from);
    if path.exists() {
        let config = AllwaysConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        let mut config = AllwaysConfig::default();
        config.apply_env_overrides()?;
        Ok((config, None))
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Build the configured [`Store`].
async fn open_store(storage: &StorageConfig) -> Result<Arc<dyn Store>, EngineError> {
    match storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let mut options = PostgresOptions::new(&storage.postgres_url)
                .with_max_connections(storage.max_connections)
                .with_acquire_timeout(Duration::from_millis(storage.connect_timeout_ms));
            if !storage.run_migrations {
                options = options.without_migrations();
            }
            Ok(Arc::new(PostgresStore::open(&options).await?))
        }
    }
}
