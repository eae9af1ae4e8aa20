//! Import pipeline: turns raw items from the collector API or from legacy
//! text dumps into [`NewVideo`] rows and bulk-upserts them.

mod text_dump;

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::HostRewrite;
use crate::db::{NewVideo, VideoStore};

pub use text_dump::parse_text_dump;

/// One untyped item as received from a feed or dump.
pub type RawItem = Map<String, Value>;

/// Outcome of one import. `received = skipped + rejected + imported`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub received: usize,
    /// Items without a usable id or title.
    pub skipped: usize,
    /// Items filtered out or refused by the store.
    pub rejected: usize,
    pub imported: usize,
}

/// Maps collector (`vod_*`) items and stores them.
///
/// Items whose cover image is a `.txt` file are placeholders and rejected.
#[tracing::instrument(name = "Import from collector", skip_all, fields(received = items.len()))]
pub async fn import_from_collector(
    videos: &VideoStore<'_>,
    items: &[RawItem],
    host_rewrites: &[HostRewrite],
) -> ImportReport {
    let mut report = ImportReport {
        received: items.len(),
        ..ImportReport::default()
    };
    let mut batch = Vec::with_capacity(items.len());

    for item in items {
        let Some(video_id) = positive_id(item.get("vod_id")) else {
            tracing::warn!(vod_id = ?item.get("vod_id"), "Skipping collector item without vod_id");
            report.skipped += 1;
            continue;
        };
        let Some(title) = text(item.get("vod_name")) else {
            tracing::warn!(video_id, "Skipping collector item without vod_name");
            report.skipped += 1;
            continue;
        };

        let image = text(item.get("vod_pic"));
        if image.as_deref().is_some_and(is_text_file) {
            tracing::debug!(video_id, "Rejecting collector item with .txt cover");
            report.rejected += 1;
            continue;
        }

        let url = text(item.get("vod_play_url"))
            .map(|url| apply_host_rewrites(&url, host_rewrites))
            .unwrap_or_default();

        batch.push(NewVideo {
            video_id,
            video_url: url,
            video_image: image,
            video_title: title,
            video_category: text(item.get("type_name")),
            play_count: integer(item.get("vod_hits")).unwrap_or(0),
            upload_time: text(item.get("vod_time")),
            video_duration: text(first_present(item, &["vod_duration", "vod_remarks"])),
            video_coins: 0,
        });
    }

    store_batch(videos, batch, report).await
}

/// Parses `content` with [`parse_text_dump`], reconciles the many key
/// spellings old dumps use, and stores the result.
#[tracing::instrument(name = "Import from text dump", skip_all, fields(bytes = content.len()))]
pub async fn import_from_text_dump(videos: &VideoStore<'_>, content: &str) -> ImportReport {
    let items = parse_text_dump(content);
    let mut report = ImportReport {
        received: items.len(),
        ..ImportReport::default()
    };
    let mut batch = Vec::with_capacity(items.len());

    for item in &items {
        match reconcile(item) {
            Some(video) => batch.push(video),
            None => report.skipped += 1,
        }
    }

    if report.skipped > 0 {
        tracing::info!("Skipped {} dump items without id or title", report.skipped);
    }

    store_batch(videos, batch, report).await
}

/// Reads a dump from disk. An unreadable file is logged and imports nothing.
pub async fn import_text_dump_file(
    videos: &VideoStore<'_>,
    path: impl AsRef<Path>,
) -> ImportReport {
    let path = path.as_ref();
    match tokio::fs::read_to_string(path).await {
        Ok(content) => import_from_text_dump(videos, &content).await,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read text dump");
            ImportReport::default()
        }
    }
}

async fn store_batch(
    videos: &VideoStore<'_>,
    batch: Vec<NewVideo>,
    mut report: ImportReport,
) -> ImportReport {
    report.imported = videos.insert_many(&batch).await;
    report.rejected += batch.len() - report.imported;

    tracing::info!(
        received = report.received,
        skipped = report.skipped,
        rejected = report.rejected,
        imported = report.imported,
        "Import finished"
    );
    report
}

fn reconcile(item: &RawItem) -> Option<NewVideo> {
    let video_id = positive_id(first_present(item, &["video_id", "vod_id", "id"]))?;
    let video_title = text(first_present(item, &["video_title", "vod_name", "title", "name"]))?;

    Some(NewVideo {
        video_id,
        video_url: text(first_present(item, &["video_url", "vod_play_url", "url", "play_url"]))
            .unwrap_or_default(),
        video_image: text(first_present(item, &["video_image", "vod_pic", "pic", "thumb"])),
        video_title,
        video_category: text(first_present(item, &["video_category", "type_name", "category"])),
        play_count: integer(first_present(item, &["play_count", "vod_hits", "hits"])).unwrap_or(0),
        upload_time: text(first_present(item, &["upload_time", "vod_time", "time"])),
        video_duration: text(first_present(
            item,
            &["video_duration", "vod_duration", "duration", "vod_remarks"],
        )),
        video_coins: integer(first_present(item, &["video_coins", "coins", "gold"])).unwrap_or(0),
    })
}

/// First value among `keys` that is present and not null.
fn first_present<'a>(item: &'a RawItem, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| item.get(*key))
        .find(|value| !value.is_null())
}

/// Non-empty text; numbers are rendered as text.
fn text(value: Option<&Value>) -> Option<String> {
    let rendered = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!rendered.is_empty()).then_some(rendered)
}

/// Integer from a JSON number or a numeric string.
pub(crate) fn integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn positive_id(value: Option<&Value>) -> Option<i64> {
    integer(value).filter(|id| *id > 0)
}

fn is_text_file(url: &str) -> bool {
    url.len() >= 4
        && url
            .get(url.len() - 4..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(".txt"))
}

fn apply_host_rewrites(url: &str, rewrites: &[HostRewrite]) -> String {
    rewrites
        .iter()
        .fold(url.to_string(), |acc, rewrite| acc.replace(&rewrite.from, &rewrite.to))
}
