//! Version 1 of the catalog API: public read endpoints under `/api` and
//! maintenance endpoints under `/api/admin`.

pub mod admin;
pub mod videos;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;

use crate::InnerState;

/// Text dumps can be far larger than ordinary JSON bodies.
const TEXT_DUMP_BODY_LIMIT: usize = 64 * 1024 * 1024;

#[tracing::instrument(name = "create_v1_router", skip(state))]
pub fn create_v1_router(state: InnerState) -> Router {
    tracing::info!("Creating V1 API router");

    Router::new()
        .route("/api/videos", get(videos::list_videos))
        .route("/api/videos/search", get(videos::search_videos))
        .route("/api/videos/category", get(videos::videos_by_category))
        .route("/api/videos/top", get(videos::top_videos))
        .route("/api/videos/:video_id", get(videos::get_video))
        .route("/api/videos/:video_id/play", post(videos::record_play))
        .route("/api/categories", get(videos::categories))
        .route("/api/statistics", get(videos::statistics))
        .route("/api/admin/videos", post(admin::create_video))
        .route(
            "/api/admin/videos/:video_id",
            put(admin::update_video).delete(admin::delete_video),
        )
        .route("/api/admin/duplicates", get(admin::duplicates))
        .route("/api/admin/category-stats", get(admin::category_stats))
        .route("/api/admin/collection-status", get(admin::collection_status))
        .route(
            "/api/admin/nav-categories",
            get(admin::get_nav_categories).put(admin::put_nav_categories),
        )
        .route("/api/admin/import/collector", post(admin::import_collector))
        .route(
            "/api/admin/import/text-dump",
            post(admin::import_text_dump).layer(DefaultBodyLimit::max(TEXT_DUMP_BODY_LIMIT)),
        )
        .route("/api/admin/collect", post(admin::collect))
        .route(
            "/api/admin/collector/categories",
            get(admin::collector_categories),
        )
        .route(
            "/api/admin/collector/detail/:vod_id",
            get(admin::collector_detail),
        )
        .with_state(state)
}
