// HTTP surface: routing, shared state, serving
pub mod routes;

use std::future::Future;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::feed::Broadcaster;

#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self { broadcaster }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/stockInfo", get(routes::stock_info))
        .route("/ws/prices", get(routes::prices_ws))
        .route("/ws/orderbook", get(routes::order_book_ws))
        .fallback(routes::reject)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
