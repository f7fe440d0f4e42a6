#![cfg(feature = "daemon")]

use async_std::channel::Sender;
use clap::Parser;
use dcserver::config::{DEFAULT_CONFIG_DIR, DEFAULT_RUNTIME_CONFIG};
use dcserver::dispatch::{CommandListener, PendingQueue};
use dcserver::registry::{ListenDefaults, RegistryOptions, ServerRegistry};
use dcserver::utils::tracing::setup_tracing;
use dcserver::{DcsError, RuntimeConfig};
use futures::StreamExt;
use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook_async_std::Signals;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Command endpoint daemon for one DCS
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Name of the server this process hosts
    #[arg(short, long)]
    server: String,

    /// Runtime configuration file
    #[arg(short, long, default_value_os_t = Path::new(DEFAULT_CONFIG_DIR).join(DEFAULT_RUNTIME_CONFIG))]
    config: PathBuf,

    /// Server configuration document
    #[arg(long)]
    servers: Option<PathBuf>,

    /// Append logs to this file as well as the console
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Default log filter when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Forward the first termination signal to the shutdown channel
async fn handle_signals(mut signals: Signals, shutdown_tx: Sender<()>) {
    if let Some(signal) = signals.next().await {
        info!(signal, "Shutdown signal received");
        if shutdown_tx.send(()).await.is_err() {
            warn!("Shutdown channel already closed");
        }
    }
}

#[async_std::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(args.log_file.as_deref(), &args.log_level)?;

    let runtime = if args.config.is_file() {
        RuntimeConfig::load(&args.config)?
    } else {
        warn!("Runtime configuration not found: {}", args.config.display());
        RuntimeConfig::new()
    };

    let mut registry = ServerRegistry::new(RegistryOptions {
        config_file: args.servers.clone(),
        specific_server: Some(args.server.clone()),
        ..RegistryOptions::default()
    });
    registry.init(&runtime, &mut ListenDefaults::default());
    for err in registry.load_errors() {
        error!("{}", err);
    }

    let dcs = registry
        .get_server_config(&args.server)
        .cloned()
        .ok_or_else(|| DcsError::NotFound(format!("DCServer '{}'", args.server)))?;
    info!("Starting {}", dcs);

    let queue = Arc::new(PendingQueue::with_capacity(runtime.pending_per_device()));
    let listener = CommandListener::bind(dcs, queue)
        .await?
        .with_read_timeout(runtime.dispatch_timeout());

    let signals = Signals::new([SIGTERM, SIGINT, SIGQUIT])?;
    let signals_handle = signals.handle();
    let (shutdown_tx, shutdown_rx) = async_std::channel::bounded(1);
    let signals_task = async_std::task::spawn(handle_signals(signals, shutdown_tx));

    let result = listener.run(shutdown_rx).await;

    signals_handle.close();
    signals_task.await;
    info!("Daemon stopped");
    Ok(result?)
}
