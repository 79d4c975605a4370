//! Courier daemon: composition root and HTTP server.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use courier_core::dispatch::Dispatcher;
use courier_core::leads::LeadStore;
use courier_core::provider::local::LocalProvider;
use courier_core::session::SessionManager;
use courier_core::status::StatusBus;
use courier_http::SharedState;

/// Multi-session outbound messaging backend.
#[derive(Parser)]
#[command(name = "courier-daemon", version)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Directory holding per-session credential and cache artifacts.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // The simulated provider links sessions instantly; production
    // deployments plug a real transport in behind ProviderFactory.
    let provider = Arc::new(LocalProvider::auto_linking());
    let bus = Arc::new(StatusBus::new());
    let sessions = Arc::new(SessionManager::new(
        provider,
        Arc::clone(&bus),
        args.data_dir,
    ));
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&sessions), Arc::clone(&bus)));
    let leads = Arc::new(LeadStore::new());

    let app = courier_http::router(SharedState {
        sessions,
        dispatcher,
        leads,
        bus,
    });

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("courier listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("shutting down"),
        Err(err) => {
            log::warn!("failed to install ctrl-c handler: {err}");
            std::future::pending::<()>().await;
        }
    }
}
