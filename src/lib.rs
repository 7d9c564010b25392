// Library exports for geofeed
// Integration tests and the binary build on these modules

pub mod auth;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod routes;
pub mod social;
pub mod state;

use axum::http::Method;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The complete app: JSON routes, request tracing and CORS for the mobile client.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
