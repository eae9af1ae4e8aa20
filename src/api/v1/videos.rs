use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::api::common::utils::{clamp_limit, required_param, timeout_store};
use crate::api::common::{ApiResponse, PaginationParams};
use crate::db::{CategoryCount, Statistics, VideoRecord};
use crate::errors::AppError;
use crate::InnerState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_TOP_SIZE: i64 = 10;
const MAX_TOP_SIZE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub keyword: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryParams {
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TopParams {
    pub limit: Option<i64>,
}

#[tracing::instrument(name = "List videos", skip(inner))]
pub async fn list_videos(
    State(inner): State<InnerState>,
    Query(params): Query<PaginationParams>,
) -> Result<ApiResponse<Vec<VideoRecord>>, AppError> {
    let InnerState { store, .. } = inner;

    let limit = clamp_limit(params.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0).max(0);

    let videos = timeout_store(store.videos().list_all(Some(limit), offset)).await?;

    Ok(ApiResponse::success(videos))
}

#[tracing::instrument(name = "Get video", skip(inner))]
pub async fn get_video(
    State(inner): State<InnerState>,
    Path(video_id): Path<i64>,
) -> Result<ApiResponse<VideoRecord>, AppError> {
    let InnerState { store, .. } = inner;

    let video = timeout_store(store.videos().get(video_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;

    Ok(ApiResponse::success(video))
}

#[tracing::instrument(name = "Search videos", skip(inner))]
pub async fn search_videos(
    State(inner): State<InnerState>,
    Query(params): Query<SearchParams>,
) -> Result<ApiResponse<Vec<VideoRecord>>, AppError> {
    let InnerState { store, .. } = inner;

    let keyword = required_param(params.keyword.as_deref(), "keyword")?;
    let limit = clamp_limit(params.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0).max(0);

    let videos = timeout_store(store.videos().search(&keyword, Some(limit), offset)).await?;

    Ok(ApiResponse::success(videos))
}

#[tracing::instrument(name = "Videos by category", skip(inner))]
pub async fn videos_by_category(
    State(inner): State<InnerState>,
    Query(params): Query<CategoryParams>,
) -> Result<ApiResponse<Vec<VideoRecord>>, AppError> {
    let InnerState { store, .. } = inner;

    let category = required_param(params.category.as_deref(), "category")?;
    let limit = clamp_limit(params.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0).max(0);

    let videos =
        timeout_store(store.videos().list_by_category(&category, Some(limit), offset)).await?;

    Ok(ApiResponse::success(videos))
}

#[tracing::instrument(name = "Top videos", skip(inner))]
pub async fn top_videos(
    State(inner): State<InnerState>,
    Query(params): Query<TopParams>,
) -> Result<ApiResponse<Vec<VideoRecord>>, AppError> {
    let InnerState { store, .. } = inner;

    let limit = clamp_limit(params.limit, DEFAULT_TOP_SIZE, MAX_TOP_SIZE);
    let videos = timeout_store(store.videos().top_by_play_count(limit)).await?;

    Ok(ApiResponse::success(videos))
}

#[tracing::instrument(name = "Record play", skip(inner))]
pub async fn record_play(
    State(inner): State<InnerState>,
    Path(video_id): Path<i64>,
) -> Result<ApiResponse<()>, AppError> {
    let InnerState { store, .. } = inner;

    if !timeout_store(store.videos().update_play_count(video_id, 1)).await? {
        return Err(AppError::NotFound(format!("Video {} not found", video_id)));
    }

    Ok(ApiResponse::message("Play count updated"))
}

pub async fn categories(
    State(inner): State<InnerState>,
) -> Result<ApiResponse<Vec<CategoryCount>>, AppError> {
    let InnerState { store, .. } = inner;

    let categories = timeout_store(store.videos().categories()).await?;

    Ok(ApiResponse::success(categories))
}

pub async fn statistics(
    State(inner): State<InnerState>,
) -> Result<ApiResponse<Statistics>, AppError> {
    let InnerState { store, .. } = inner;

    let stats = timeout_store(store.videos().statistics()).await?;

    Ok(ApiResponse::success(stats))
}
