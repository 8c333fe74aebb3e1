//! HTTP surface of the event relay: routing, controllers, extractors, and the
//! mapping from core errors onto response codes.

use log::*;

pub mod controller;
mod error;
pub(crate) mod extractors;
pub mod router;

pub use error::Error;
pub(crate) use service::AppState;

/// Binds the configured listen address and serves the router until a shutdown
/// signal arrives.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let listen_addr = app_state.config.listen_addr();
    let router = router::define_routes(app_state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("Server starting... on {listen_addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received shutdown signal, draining event streams");
}
