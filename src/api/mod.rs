//! HTTP API and dashboard hosting.
//!
//! | Method | Path | |
//! |--------|------|-|
//! | GET | `/api/logs` | event log, newest first |
//! | GET | `/api/stores` | releases with access URLs |
//! | POST | `/api/stores` | queue a new store |
//! | DELETE | `/api/stores/{id}` | tear a store down |
//! | PUT | `/api/stores/{id}/upgrade` | upgrade to the current chart |
//! | PUT | `/api/stores/{id}/rollback` | revert to the previous revision |
//! | POST | `/api/stores/{id}/domain` | label the store with a custom domain |
//!
//! Any other path is served from the static dashboard directory.

pub mod error;
pub mod handlers;

pub use error::{AppError, AppResult};

use crate::service::StoreService;
use axum::routing::{get, post, put};
use axum::Router;
use std::path::Path;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn router(service: StoreService, public_dir: impl AsRef<Path>) -> Router {
    let api = Router::new()
        .route("/logs", get(handlers::get_logs))
        .route(
            "/stores",
            get(handlers::list_stores).post(handlers::create_store),
        )
        .route("/stores/{id}", axum::routing::delete(handlers::delete_store))
        .route("/stores/{id}/upgrade", put(handlers::upgrade_store))
        .route("/stores/{id}/rollback", put(handlers::rollback_store))
        .route("/stores/{id}/domain", post(handlers::link_domain))
        .fallback(handlers::api_not_found);

    Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new(public_dir.as_ref()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
