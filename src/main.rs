use std::path::Path;

use delect::utils::file_io::open_file_for_append;
use delect::Error;
use delect::NodeBuilder;
use delect::Result;
use delect::Settings;
use delect::SystemError;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = Settings::load(None)?;

    let holder_ids: Vec<String> = (0..settings.cluster.local_agents)
        .map(|_| delect::generate_holder_id(settings.cluster.holder_id_prefix.as_deref()))
        .collect();

    // One log directory per process, named after its first holder.
    let log_name = holder_ids.first().cloned().unwrap_or_else(|| "d-elect".to_string());
    let _guard = init_observability(&log_name, &settings.cluster.log_dir)?;

    let (graceful_tx, graceful_rx) = watch::channel(());

    let node = NodeBuilder::new(settings, graceful_rx)
        .holder_ids(holder_ids)
        .build()?;
    let node_holders = node.handles().len();

    info!(holders = node_holders, "election node assembled; waiting for shutdown signal");
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("shutdown listener failed: {:?}", e);
        }
    });

    if let Err(e) = node.run().await {
        error!("election node exited with error: {:?}", e);
    }

    info!("d-elect stopped");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("stopping election agents");
    graceful_tx.send(()).map_err(|e| {
        error!("no receiver left for shutdown signal: {}", e);
        Error::System(SystemError::SignalSenderClosed(e.to_string()))
    })?;

    info!("shutdown signal delivered");
    Ok(())
}

pub fn init_observability(
    holder_id: &str,
    log_dir: &Path,
) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(&log_dir.join(holder_id).join("d-elect.log"))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(EnvFilter::from_default_env());
    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(guard)
}
