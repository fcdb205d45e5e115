//! HTTP API handlers for clipcat-api

pub mod auth;
pub mod clips;
pub mod health;
pub mod openapi;

pub use auth::auth_middleware;
pub use clips::{get_clip, list_clips};
pub use health::health_routes;
pub use openapi::openapi_document;
