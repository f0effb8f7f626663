mod acceptor;
mod arena;
mod battle;
mod config;
mod error;
mod registry;
mod router;
mod state;
mod timer;

use crate::config::Config;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STATS_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
/// Wires up logging, reads the environment-derived config, starts the
/// background stats log, and serves the arena/battle/health routes until a
/// termination signal asks it to stop accepting new connections.
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let config = Config::from_env().unwrap_or_else(|err| {
        tracing::error!(%err, "invalid startup configuration");
        panic!("invalid startup configuration: {}", err);
    });
    let port = config.port;
    let state = Arc::new(AppState::new(config));

    let stats_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_LOG_INTERVAL);
        loop {
            interval.tick().await;
            tracing::info!(
                arena_rooms = stats_state.arena_room_count(),
                battle_rooms = stats_state.battle_room_count(),
                players = stats_state
                    .player_count
                    .load(std::sync::atomic::Ordering::Relaxed),
                "stats"
            );
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/", get(acceptor::root_handler))
        .route("/battle", get(acceptor::battle_handler))
        .route("/health", get(acceptor::health_handler))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap_or_else(|err| panic!("failed to bind port {}: {}", port, err));
    tracing::info!(port, "relay-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

/// Waits for ctrl-c or, on unix, SIGTERM. Letting either stop the listener
/// is what satisfies spec.md §6's "stop accepting new connections, close
/// all open sockets, then exit" on process termination signals.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
