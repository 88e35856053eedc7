use std::sync::Arc;

use battle_core::UnitCatalog;
use relay_server::config::reload_config;
use relay_server::state::AppState;
use relay_server::{build_router, cleanup_dead_rooms};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
/// Activates structured tracing, spawns a watchdog to sweep out rooms whose
/// actor task has died, then serves matchmaking, listing, and websocket
/// routes until a shutdown signal arrives.
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true) // module path (e.g. relay_server::room_actor)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let catalog = Arc::new(UnitCatalog::default_catalog());
    let app_state = Arc::new(AppState::new(catalog));

    match reload_config(&app_state).await {
        Ok(_) => tracing::info!("loaded ServerConfig.json"),
        Err(message) => tracing::warn!(message, "no ServerConfig.json found, using defaults"),
    }

    let watchdog_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(1200)); // 20 min
        loop {
            interval.tick().await;
            cleanup_dead_rooms(&watchdog_state).await;
        }
    });

    let app = build_router(app_state);

    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(2567);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await.unwrap();
    tracing::info!(port, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
