//! scribe-daemon: the document ingestion and anchoring daemon.
//!
//! Single OS process running a Tokio async runtime. Operators and the
//! request layer talk to it via JSON-RPC over a Unix socket.

mod commands;
mod config;
mod rpc;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use scribe_anchor::remote::{RemoteAnchorConfig, RemoteAnchorService};
use scribe_anchor::simulated::SimulatedAnchorService;
use scribe_anchor::AnchorService;
use scribe_pipeline::custody::{CustodyMode, KeyCustody};
use scribe_pipeline::events::EventBus;
use scribe_pipeline::Pipeline;
use scribe_storage::backend::DisabledBackend;
use scribe_storage::pinning::{PinningConfig, PinningServiceBackend};
use scribe_storage::simulated::SimulatedBackend;
use scribe_storage::{StorageAdapter, StorageBackend};

use crate::config::{AnchorBackendKind, DaemonConfig, StorageBackendKind};
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    pub pipeline: Pipeline,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("scribe={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!("Scribe daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open databases
    let db_path = data_dir.join("scribe.db");
    let conn = scribe_db::open(&db_path).with_context(|| format!("opening {db_path:?}"))?;
    let db = Arc::new(tokio::sync::Mutex::new(conn));
    let custody = open_custody(&config, &data_dir)?;

    // 3. Backends
    let storage = StorageAdapter::new(build_storage(&config)?);
    let anchor = build_anchor(&config)?;
    info!(
        storage = storage.backend_name(),
        anchor = anchor.name(),
        custody = ?custody.mode(),
        "backends ready"
    );

    // 4. Event bus, forwarded to the log
    let event_bus = EventBus::default();
    spawn_event_logger(&event_bus);

    // 5. Pipeline
    let pipeline = Pipeline::new(
        db,
        storage,
        anchor,
        custody,
        event_bus,
        config.pipeline_config(),
    );

    // 6. Resume reconcilers for anything left pending
    match pipeline.reconcilers().resume_all_pending().await {
        Ok(0) => {}
        Ok(n) => info!(count = n, "resumed reconcilers for pending documents"),
        Err(e) => error!(error = %e, "failed to resume pending reconcilers"),
    }

    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
    let state = Arc::new(DaemonState {
        pipeline,
        shutdown_tx: shutdown_tx.clone(),
    });

    // 7. Start IPC server
    let socket_path = data_dir.join("scribe.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());
    info!("Starting JSON-RPC server on {:?}", socket_path);

    // 8. Run the RPC server until shutdown
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    let running = state.pipeline.reconcilers().active().await.len();
    if running > 0 {
        info!(count = running, "reconcilers will resume on next start");
    }

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}

fn open_custody(config: &DaemonConfig, data_dir: &Path) -> anyhow::Result<KeyCustody> {
    Ok(match config.custody.mode {
        CustodyMode::ClientHeld => KeyCustody::ClientHeld,
        CustodyMode::Vault => {
            let vault_path = data_dir.join("keys.db");
            let vault = scribe_db::vault::open(&vault_path)
                .with_context(|| format!("opening key vault {vault_path:?}"))?;
            KeyCustody::Vault(Arc::new(tokio::sync::Mutex::new(vault)))
        }
    })
}

fn build_storage(config: &DaemonConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    let storage = &config.storage;
    Ok(match storage.backend {
        StorageBackendKind::Pinning => {
            let pinning = PinningServiceBackend::new(PinningConfig {
                api_url: storage.api_url.clone(),
                gateway_url: storage.gateway_url.clone(),
                api_key: storage.api_key.clone(),
                secret_key: storage.secret_key.clone(),
                upload_timeout: Duration::from_secs(storage.upload_timeout_secs),
            });
            match pinning {
                Ok(backend) => Arc::new(backend),
                Err(scribe_storage::StorageError::Unconfigured) => {
                    warn!("pinning credentials missing, uploads will receive placeholder references");
                    Arc::new(DisabledBackend)
                }
                Err(e) => return Err(e.into()),
            }
        }
        StorageBackendKind::Simulated => {
            warn!("simulated storage backend selected (dev only)");
            Arc::new(SimulatedBackend::new())
        }
        StorageBackendKind::Disabled => Arc::new(DisabledBackend),
    })
}

fn build_anchor(config: &DaemonConfig) -> anyhow::Result<Arc<dyn AnchorService>> {
    let anchor = &config.anchor;
    Ok(match anchor.backend {
        AnchorBackendKind::Remote => {
            let service = RemoteAnchorService::new(RemoteAnchorConfig {
                base_url: anchor.base_url.clone(),
                api_key: anchor.api_key.clone(),
                ..RemoteAnchorConfig::default()
            })
            .with_context(|| {
                format!(
                    "anchor.backend = \"remote\" needs a token; set {} or choose \"simulated\"",
                    crate::config::ENV_ANCHOR_API_KEY
                )
            })?;
            Arc::new(service)
        }
        AnchorBackendKind::Simulated => {
            warn!("simulated anchoring service selected (dev only)");
            Arc::new(SimulatedAnchorService::new())
        }
    })
}

fn spawn_event_logger(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => info!(
                    event = ?event.event_type,
                    payload = %event.payload,
                    "pipeline event"
                ),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
