//! clipcat-api library - HTTP read surface for the clip catalog
//!
//! Public: `/health`, `/openapi.json`. Protected by bearer token when a JWKS
//! URL is configured: `/clips`, `/clips/:reference`.

use std::sync::Arc;

use axum::Router;
use clipcat_common::ClipCatalog;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cli;
pub mod error;
pub mod jwks;

pub use error::{ApiError, ApiResult};
pub use jwks::JwksVerifier;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: ClipCatalog,
    /// `None` disables authentication
    pub verifier: Option<Arc<JwksVerifier>>,
}

impl AppState {
    pub fn new(catalog: ClipCatalog, verifier: Option<Arc<JwksVerifier>>) -> Self {
        Self { catalog, verifier }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::get;

    let protected = Router::new()
        .route("/clips", get(api::list_clips))
        .route("/clips/:reference", get(api::get_clip))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .route("/openapi.json", get(api::openapi_document))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
