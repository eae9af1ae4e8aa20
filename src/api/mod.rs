//! HTTP surface of the catalog.
//!
//! Routes are grouped by API version; `common` holds what the versions
//! share. Metrics are layered on in `main` since the recorder is global.

pub mod common;
pub mod v1;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::system::create_system_router;
use crate::InnerState;

#[tracing::instrument(name = "create_api_router", skip(state))]
pub fn create_api_router(state: InnerState) -> Router {
    tracing::info!("Creating API router with versioned endpoints");

    Router::new()
        .merge(create_system_router(state.clone()))
        .merge(v1::create_v1_router(state))
        .fallback(common::not_found)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(common::tracing::make_request_span)
                .on_request(common::tracing::on_request)
                .on_response(common::tracing::on_response)
                .on_failure(common::tracing::on_failure),
        )
}
