//! CLI entry point: parse launch parameters, then run either the process
//! supervisor (cluster mode) or a single worker.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use feria::supervisor::{self, Mode};
use feria::{FileStore, Result, Server, ServerConfig};

#[derive(Parser)]
#[command(
    name = "feria",
    about = "Multi-worker real-time catalog and chat broadcast server",
    version
)]
struct Cli {
    /// Port shared by every worker
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Process topology
    #[arg(long, value_enum, default_value_t = Mode::Fork, ignore_case = true)]
    mode: Mode,

    /// Worker count for cluster mode (default: one per CPU core)
    #[arg(long)]
    workers: Option<usize>,

    /// Keep collections in JSON files under this directory instead of memory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Internal: run as a cluster worker child
    #[arg(long, hide = true)]
    worker: bool,
}

// Each worker multiplexes its connections over one thread; concurrency
// beyond that is process-level.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if cli.mode == Mode::Cluster && !cli.worker {
        let workers = cli.workers.unwrap_or_else(supervisor::default_workers);
        info!("starting {workers} workers on port {}", cli.port);
        return supervisor::run(cli.port, workers, cli.data_dir.as_deref()).await;
    }

    run_worker(&cli).await
}

async fn run_worker(cli: &Cli) -> Result<()> {
    let config = match &cli.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            ServerConfig {
                products: Arc::new(FileStore::new(dir.join("products.json"))),
                chat: Arc::new(FileStore::new(dir.join("messages.json"))),
                ..ServerConfig::default()
            }
        }
        None => ServerConfig::default(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = bind(addr, cli.mode).map_err(|e| {
        // Bind failure is fatal for this worker; the supervisor's restart
        // policy (none, by design) decides what happens next.
        error!("failed to bind {addr}: {e}");
        e
    })?;
    info!("worker listening on {addr} (pid {})", std::process::id());

    let server = Server::with_config(config);
    tokio::select! {
        result = server.serve_listener(listener) => result.map_err(Into::into),
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            Ok(())
        }
    }
}

fn bind(addr: SocketAddr, mode: Mode) -> std::io::Result<tokio::net::TcpListener> {
    let listener = match mode {
        // Cluster workers share the port with their siblings.
        Mode::Cluster => supervisor::bind_shared(addr)?,
        Mode::Fork => {
            let listener = std::net::TcpListener::bind(addr)?;
            listener.set_nonblocking(true)?;
            listener
        }
    };
    tokio::net::TcpListener::from_std(listener)
}
