use std::net::SocketAddr;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    crate::routes::configure_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the health endpoints until shutdown is requested.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Health endpoint on http://{}", addr);

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
