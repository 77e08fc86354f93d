//! HTTP server for markerd.
//!
//! Exposes the version manager to the map editor: load and save the
//! current markers, browse backups and restore one.

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use tracing::info;

/// Serve `state` on `addr` until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
}
