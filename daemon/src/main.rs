mod config;
mod error;
mod properties;
mod server;
mod stats;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use log::info;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use modemtrace::at_channel::AtChannel;
use modemtrace::controller::ModemController;
use modemtrace::mts::LoggingServiceSelector;

use crate::config::{parse_args, parse_config};
use crate::error::DaemonError;
use crate::properties::AndroidPropertyStore;
use crate::server::{ServerState, apply_config, generate_coredump, get_state, restart_modem};
use crate::stats::get_system_stats;

type AppRouter = Router<Arc<ServerState>>;

fn get_router() -> AppRouter {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/apply", post(apply_config))
        .route("/api/coredump", post(generate_coredump))
        .route("/api/restart-modem", post(restart_modem))
        .route("/api/system-stats", get(get_system_stats))
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl-c");
    info!("shutdown signal received, cancelling in-flight modem operations");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    env_logger::init();
    let args = parse_args();
    let config = parse_config(&args.config_path).await?;

    let store = Arc::new(AndroidPropertyStore);
    let selector = LoggingServiceSelector::new(store, &config.platform);
    let channel = AtChannel::open(
        &config.at_device,
        Duration::from_millis(config.at_timeout_ms),
    )
    .await?;
    let mut controller = ModemController::new(channel, selector, config.platform.clone());
    // The control device opened, so the modem is reachable.
    controller.on_modem_up();
    let cancel = controller.cancellation_token();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(ServerState {
        config,
        controller: Mutex::new(controller),
    });
    let listener = TcpListener::bind(&addr).await?;
    info!("modemtraced listening on {addr}");
    let app = get_router().with_state(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;
    Ok(())
}
