//! HTTP API server with observability for the observation moderation service.
//!
//! Provides REST endpoints for assembling observation drafts, submitting
//! them and moderating them, with structured logging (tracing) and
//! Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::ObservationService;
use metrics_exporter_prometheus::PrometheusHandle;
use store::ObservationStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::observations::{self, AppState};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: ObservationStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/observations", get(observations::list::<S>))
        .route("/observations/draft", get(observations::draft::<S>))
        .route("/observations/draft/items", post(observations::add_item::<S>))
        .route(
            "/observations/{id}",
            get(observations::get::<S>)
                .put(observations::update_comment::<S>)
                .delete(observations::delete::<S>),
        )
        .route("/observations/{id}/submit", put(observations::submit::<S>))
        .route(
            "/observations/{id}/moderate",
            put(observations::moderate::<S>),
        )
        .route(
            "/observations/{id}/items/{day_id}",
            put(observations::update_item::<S>).delete(observations::remove_item::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over the given store.
pub fn create_default_state<S: ObservationStore + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        service: ObservationService::new(store),
    })
}
