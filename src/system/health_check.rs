use axum::extract::State;
use serde::Serialize;

use crate::api::common::ApiResponse;
use crate::InnerState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: String,
}

pub async fn health_check(State(inner): State<InnerState>) -> ApiResponse<Health> {
    ApiResponse::success(Health {
        status: "healthy",
        database: inner.store.dialect().to_string(),
    })
}
