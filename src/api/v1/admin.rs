use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::common::utils::timeout_store;
use crate::api::common::ApiResponse;
use crate::collector::{CollectFilter, CollectorCategory};
use crate::db::{CategoryCount, CollectionStatus, NavCategory, NewVideo, VideoRecord};
use crate::duplicates::{DuplicateGroup, DuplicateMode};
use crate::errors::AppError;
use crate::ingest::{self, ImportReport, RawItem};
use crate::InnerState;

const DEFAULT_STATUS_HOURS: i64 = 24;

/// Served when no navigation taxonomy has been saved yet.
pub fn default_nav_categories() -> Vec<NavCategory> {
    [
        ("recommend", "推荐", &[][..]),
        ("movie", "电影", &["动作片", "喜剧片", "爱情片", "科幻片"][..]),
        ("tv", "电视剧", &["国产剧", "港台剧", "日韩剧", "欧美剧"][..]),
        ("variety", "综艺", &[][..]),
        ("anime", "动漫", &[][..]),
    ]
    .into_iter()
    .map(|(key, label, subcategories)| NavCategory {
        key: key.to_string(),
        label: label.to_string(),
        subcategories: subcategories.iter().map(|s| s.to_string()).collect(),
    })
    .collect()
}

#[derive(Debug, Deserialize)]
pub struct CreateVideoRequest {
    pub video_id: Option<i64>,
    pub video_url: String,
    pub video_title: String,
    pub video_image: Option<String>,
    pub video_category: Option<String>,
    #[serde(default)]
    pub play_count: i64,
    pub upload_time: Option<String>,
    pub video_duration: Option<String>,
    #[serde(default)]
    pub video_coins: i64,
}

#[derive(Debug, Deserialize)]
pub struct DuplicateParams {
    #[serde(rename = "type")]
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CollectorImportRequest {
    pub items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
pub struct CollectRequest {
    #[serde(flatten)]
    pub filter: CollectFilter,
    pub start_page: Option<i64>,
    pub max_pages: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CollectResponse {
    pub collected: usize,
    pub report: ImportReport,
}

#[tracing::instrument(name = "Create video", skip(inner, body))]
pub async fn create_video(
    State(inner): State<InnerState>,
    Json(body): Json<CreateVideoRequest>,
) -> Result<ApiResponse<VideoRecord>, AppError> {
    let InnerState { store, .. } = inner;
    let videos = store.videos();

    let video = NewVideo {
        video_id: body.video_id.unwrap_or_else(|| videos.next_id()),
        video_url: body.video_url,
        video_image: body.video_image,
        video_title: body.video_title,
        video_category: body.video_category,
        play_count: body.play_count,
        upload_time: body.upload_time,
        video_duration: body.video_duration,
        video_coins: body.video_coins,
    };

    if let Err(reason) = video.validate() {
        return Err(AppError::Validation(reason));
    }
    if !timeout_store(videos.insert(&video)).await? {
        return Err(AppError::Validation("Video record was rejected".to_string()));
    }

    let stored = timeout_store(videos.get(video.video_id))
        .await?
        .ok_or_else(|| {
            AppError::Unexpected(anyhow::anyhow!(
                "Video {} vanished after insert",
                video.video_id
            ))
        })?;

    tracing::info!(video_id = stored.video_id, "Video created");
    Ok(ApiResponse::success(stored).with_status(StatusCode::CREATED))
}

#[tracing::instrument(name = "Update video fields", skip(inner, fields))]
pub async fn update_video(
    State(inner): State<InnerState>,
    Path(video_id): Path<i64>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<ApiResponse<VideoRecord>, AppError> {
    let InnerState { store, .. } = inner;
    let videos = store.videos();

    if timeout_store(videos.get(video_id)).await?.is_none() {
        return Err(AppError::NotFound(format!("Video {} not found", video_id)));
    }
    if !timeout_store(videos.update(video_id, &fields)).await? {
        return Err(AppError::Validation(
            "No valid updatable fields were supplied".to_string(),
        ));
    }

    let updated = timeout_store(videos.get(video_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;

    Ok(ApiResponse::success(updated))
}

#[tracing::instrument(name = "Remove video", skip(inner))]
pub async fn delete_video(
    State(inner): State<InnerState>,
    Path(video_id): Path<i64>,
) -> Result<ApiResponse<()>, AppError> {
    let InnerState { store, .. } = inner;

    if !timeout_store(store.videos().delete(video_id)).await? {
        return Err(AppError::NotFound(format!("Video {} not found", video_id)));
    }

    tracing::info!(video_id, "Video deleted");
    Ok(ApiResponse::message("Video deleted"))
}

#[tracing::instrument(name = "List duplicates", skip(inner))]
pub async fn duplicates(
    State(inner): State<InnerState>,
    Query(params): Query<DuplicateParams>,
) -> Result<ApiResponse<Vec<DuplicateGroup>>, AppError> {
    let InnerState { store, .. } = inner;

    let mode = match params.mode.as_deref() {
        None | Some("") => DuplicateMode::Title,
        Some(raw) => raw.parse::<DuplicateMode>().map_err(AppError::Validation)?,
    };

    let groups = timeout_store(store.videos().find_duplicates(mode)).await?;

    Ok(ApiResponse::success(groups))
}

pub async fn category_stats(
    State(inner): State<InnerState>,
) -> Result<ApiResponse<Vec<CategoryCount>>, AppError> {
    let InnerState { store, .. } = inner;

    let stats = timeout_store(store.videos().category_stats()).await?;

    Ok(ApiResponse::success(stats))
}

pub async fn collection_status(
    State(inner): State<InnerState>,
    Query(params): Query<StatusParams>,
) -> Result<ApiResponse<CollectionStatus>, AppError> {
    let InnerState { store, .. } = inner;

    let hours = params.hours.unwrap_or(DEFAULT_STATUS_HOURS).max(1);
    let status = timeout_store(store.videos().collection_status(hours)).await?;

    Ok(ApiResponse::success(status))
}

pub async fn get_nav_categories(
    State(inner): State<InnerState>,
) -> Result<ApiResponse<Vec<NavCategory>>, AppError> {
    let InnerState { store, .. } = inner;

    let saved = timeout_store(store.nav_categories().list()).await?;
    if saved.is_empty() {
        return Ok(ApiResponse::success(default_nav_categories()));
    }

    Ok(ApiResponse::success(saved))
}

#[tracing::instrument(name = "Save nav categories", skip(inner, categories))]
pub async fn put_nav_categories(
    State(inner): State<InnerState>,
    Json(categories): Json<Vec<NavCategory>>,
) -> Result<ApiResponse<Vec<NavCategory>>, AppError> {
    let InnerState { store, .. } = inner;

    if let Some(bad) = categories
        .iter()
        .find(|c| c.key.trim().is_empty() || c.label.trim().is_empty())
    {
        return Err(AppError::Validation(format!(
            "Navigation category '{}' needs a key and a label",
            bad.key
        )));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = categories.iter().find(|c| !seen.insert(c.key.as_str())) {
        return Err(AppError::Validation(format!(
            "Navigation category key '{}' is used twice",
            dup.key
        )));
    }

    let nav = store.nav_categories();
    timeout_store(nav.replace_all(&categories)).await?;
    let saved = timeout_store(nav.list()).await?;

    Ok(ApiResponse::success(saved))
}

#[tracing::instrument(
    name = "Import collector items",
    skip(inner, body),
    fields(items = body.items.len())
)]
pub async fn import_collector(
    State(inner): State<InnerState>,
    Json(body): Json<CollectorImportRequest>,
) -> Result<ApiResponse<ImportReport>, AppError> {
    let InnerState {
        store,
        host_rewrites,
        ..
    } = inner;

    let report =
        ingest::import_from_collector(&store.videos(), &body.items, &host_rewrites).await;

    Ok(ApiResponse::success(report))
}

#[tracing::instrument(
    name = "Import text dump",
    skip(inner, content),
    fields(bytes = content.len())
)]
pub async fn import_text_dump(
    State(inner): State<InnerState>,
    content: String,
) -> Result<ApiResponse<ImportReport>, AppError> {
    let InnerState { store, .. } = inner;

    if content.trim().is_empty() {
        return Err(AppError::Validation("Request body is empty".to_string()));
    }

    let report = ingest::import_from_text_dump(&store.videos(), &content).await;

    Ok(ApiResponse::success(report))
}

#[tracing::instrument(name = "Collect and import", skip(inner))]
pub async fn collect(
    State(inner): State<InnerState>,
    Json(request): Json<CollectRequest>,
) -> Result<ApiResponse<CollectResponse>, AppError> {
    let InnerState {
        store,
        collector,
        host_rewrites,
    } = inner;

    let items = collector
        .collect_all(&request.filter, request.start_page.unwrap_or(1), request.max_pages)
        .await;
    let report = ingest::import_from_collector(&store.videos(), &items, &host_rewrites).await;

    Ok(ApiResponse::success(CollectResponse {
        collected: items.len(),
        report,
    }))
}

pub async fn collector_categories(
    State(inner): State<InnerState>,
) -> ApiResponse<Vec<CollectorCategory>> {
    let InnerState { collector, .. } = inner;

    ApiResponse::success(collector.fetch_categories().await)
}

pub async fn collector_detail(
    State(inner): State<InnerState>,
    Path(vod_id): Path<i64>,
) -> Result<ApiResponse<RawItem>, AppError> {
    let InnerState { collector, .. } = inner;

    collector
        .fetch_detail(vod_id)
        .await
        .map(ApiResponse::success)
        .ok_or_else(|| AppError::NotFound(format!("Collector item {} not found", vod_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_navigation_starts_with_recommend() {
        let defaults = default_nav_categories();

        assert_eq!(defaults[0].key, "recommend");
        assert!(defaults.iter().all(|c| !c.label.is_empty()));
        assert_eq!(defaults[1].subcategories.len(), 4);
    }
}
