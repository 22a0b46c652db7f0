//! rigbridge server binary.
#![allow(unreachable_pub, dead_code, clippy::missing_const_for_fn, clippy::option_if_let_else)]
//!
//! Serves the status channel between the test-rig web UI and the rig
//! controller:
//! - `POST /api/taskcsv` writes the desired rig state to the status file
//! - `GET /api/taskcsv` streams the completed-cycle counter while running
//! - Optional simulated controller advancing cycles without hardware
//!
//! ## Usage
//!
//! ```bash
//! # Start with default settings
//! rigbridge
//!
//! # Use a different status file and bind address
//! rigbridge --status-file /var/lib/rig/status.csv --bind-addr 0.0.0.0:3000
//!
//! # Start with config file
//! rigbridge --config rigbridge.toml
//! ```

mod config;
mod health;
mod rpc;

use rigbridge::{
    ControllerConfig, CsvFileStore, ProgressStreamer, RunStateHandle, SimulatedController,
    StatusWriter, seed_defaults,
};
use tokio::{signal, sync::watch};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{config::Config, health::HealthState, rpc::create_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    info!(?config, "loaded configuration");

    // Status file shared with the rig controller
    let store = CsvFileStore::new(&config.status_file);
    seed_defaults(&store).await?;

    // Single run state shared by writer, streamer and health
    let run_state = RunStateHandle::default();
    let writer = StatusWriter::new(store.clone(), run_state.clone());
    let streamer =
        ProgressStreamer::new(store.clone(), run_state.clone(), config.stream_interval());
    let health_state = HealthState::new(store.path().display().to_string(), run_state);

    // Spawn the simulated controller if requested
    let _controller_handle = config.simulate_controller.then(|| {
        let controller_config = ControllerConfig { cycle_interval: config.controller_cycle() };
        SimulatedController::new(store.clone(), controller_config).spawn()
    });

    // Create router
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let router = create_router(writer, streamer, health_state, shutdown_rx);

    // Start HTTP server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, status_file = %store.path().display(), "starting HTTP server");

    // Serve with graceful shutdown
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Close open progress streams so connections can drain.
            let _ = shutdown_tx.send(true);
        })
        .await?;

    info!("rigbridge stopped");

    Ok(())
}

/// Waits for SIGINT or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C, shutting down");
        }
        () = terminate => {
            info!("received SIGTERM, shutting down");
        }
    }
}
