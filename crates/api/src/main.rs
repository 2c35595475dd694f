use std::net::{IpAddr, SocketAddr};

use avatar_core::{Orchestrator, OrchestratorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avatar_api::config::ServerConfig;
use avatar_api::router::build_app_router;
use avatar_api::state::AppState;

const DEFAULT_LOG_FILTER: &str = "avatar_api=debug,avatar_core=debug,tower_http=debug";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid server configuration: {e}");
            std::process::exit(1);
        }
    };

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let orchestrator_config = match OrchestratorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid orchestrator configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        app_root = %orchestrator_config.app_root.display(),
        output_root = %orchestrator_config.output_root.display(),
        "Loaded orchestrator configuration",
    );

    // --- Orchestrator ---
    let orchestrator = Orchestrator::new(orchestrator_config);
    let missing = orchestrator.missing_assets();
    if missing.is_empty() {
        tracing::info!("All model directories present");
    } else {
        for path in &missing {
            tracing::warn!(path = %path.display(), "Model directory missing");
        }
        tracing::warn!(
            count = missing.len(),
            "Generations will be refused until models are mounted",
        );
    }

    let acceleration = orchestrator.acceleration_status().await;
    tracing::info!(
        gpu = %acceleration.gpu,
        flash_attention = %acceleration.flash_attention,
        "Acceleration status",
    );

    // --- Start server ---
    let host: IpAddr = match config.host.parse() {
        Ok(host) => host,
        Err(e) => {
            tracing::error!(host = %config.host, error = %e, "Invalid HOST address");
            std::process::exit(1);
        }
    };
    let addr = SocketAddr::new(host, config.port);

    let state = AppState::new(config, orchestrator);
    let app = build_app_router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "Starting server");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
