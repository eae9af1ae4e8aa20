use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{AnyPool, FromRow};

use super::{now_timestamp, Dialect};
use crate::errors::StoreError;

pub const MAX_TITLE_CHARS: usize = 500;

/// Ceiling for `play_count` and `video_coins`. Low enough that `SUM` over
/// millions of rows stays within `i64` on both backends.
pub const MAX_COUNTER: i64 = 1_000_000_000_000;

const VIDEO_COLUMNS: &str = "video_id, video_url, video_image, video_title, video_category, \
     play_count, upload_time, video_duration, video_coins, created_at, updated_at";

const UPSERT_COLUMNS: [&str; 11] = [
    "video_id",
    "video_url",
    "video_image",
    "video_title",
    "video_category",
    "play_count",
    "upload_time",
    "video_duration",
    "video_coins",
    "created_at",
    "updated_at",
];

/// A persisted catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct VideoRecord {
    pub video_id: i64,
    pub video_url: String,
    pub video_image: Option<String>,
    pub video_title: String,
    pub video_category: Option<String>,
    pub play_count: i64,
    pub upload_time: Option<String>,
    pub video_duration: Option<String>,
    pub video_coins: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// A row as supplied by a caller; timestamps are assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVideo {
    pub video_id: i64,
    pub video_url: String,
    #[serde(default)]
    pub video_image: Option<String>,
    pub video_title: String,
    #[serde(default)]
    pub video_category: Option<String>,
    #[serde(default)]
    pub play_count: i64,
    #[serde(default)]
    pub upload_time: Option<String>,
    #[serde(default)]
    pub video_duration: Option<String>,
    #[serde(default)]
    pub video_coins: i64,
}

/// Member shape of a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct VideoSummary {
    pub video_id: i64,
    pub video_title: String,
    pub video_image: Option<String>,
    pub video_category: Option<String>,
    pub upload_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CategoryCount {
    pub video_category: Option<String>,
    pub video_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_videos: i64,
    pub total_plays: i64,
    pub category_count: i64,
    /// Same value as `category_count`; older clients read this name.
    pub total_categories: i64,
    pub average_plays: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStatus {
    pub total_videos: i64,
    pub total_categories: i64,
    pub latest_collection_time: Option<String>,
    pub category_breakdown: Vec<CategoryCount>,
    pub hours_checked: i64,
}

#[derive(Debug, FromRow)]
struct TotalsRow {
    total_videos: i64,
    total_plays: i64,
    category_count: i64,
}

impl NewVideo {
    /// Checks the invariants every persisted row must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        if self.video_id <= 0 {
            return Err("video_id is required".to_string());
        }
        if self.video_url.trim().is_empty() {
            return Err("video_url is required".to_string());
        }
        if self.video_title.trim().is_empty() {
            return Err("video_title is required".to_string());
        }
        if self.video_title.chars().count() > MAX_TITLE_CHARS {
            return Err(format!("video_title exceeds {} characters", MAX_TITLE_CHARS));
        }
        if self.play_count < 0 || self.video_coins < 0 {
            return Err("play_count and video_coins must not be negative".to_string());
        }
        if self.play_count > MAX_COUNTER || self.video_coins > MAX_COUNTER {
            return Err(format!(
                "play_count and video_coins must not exceed {}",
                MAX_COUNTER
            ));
        }
        Ok(())
    }
}

impl From<&VideoRecord> for NewVideo {
    fn from(record: &VideoRecord) -> Self {
        Self {
            video_id: record.video_id,
            video_url: record.video_url.clone(),
            video_image: record.video_image.clone(),
            video_title: record.video_title.clone(),
            video_category: record.video_category.clone(),
            play_count: record.play_count,
            upload_time: record.upload_time.clone(),
            video_duration: record.video_duration.clone(),
            video_coins: record.video_coins,
        }
    }
}

/// Columns a caller may change through [`VideoStore::update`]. Column names in
/// UPDATE statements come from here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoField {
    Url,
    Image,
    Title,
    Category,
    PlayCount,
    UploadTime,
    Duration,
    Coins,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldValue {
    Text(Option<String>),
    Integer(i64),
}

impl VideoField {
    const ALL: [VideoField; 8] = [
        VideoField::Url,
        VideoField::Image,
        VideoField::Title,
        VideoField::Category,
        VideoField::PlayCount,
        VideoField::UploadTime,
        VideoField::Duration,
        VideoField::Coins,
    ];

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.column() == key)
    }

    fn column(self) -> &'static str {
        match self {
            VideoField::Url => "video_url",
            VideoField::Image => "video_image",
            VideoField::Title => "video_title",
            VideoField::Category => "video_category",
            VideoField::PlayCount => "play_count",
            VideoField::UploadTime => "upload_time",
            VideoField::Duration => "video_duration",
            VideoField::Coins => "video_coins",
        }
    }

    fn parse(self, value: &Value) -> Result<FieldValue, String> {
        let column = self.column();
        match self {
            VideoField::PlayCount | VideoField::Coins => {
                let number = match value {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                }
                .ok_or_else(|| format!("{} must be an integer", column))?;
                if number < 0 {
                    return Err(format!("{} must not be negative", column));
                }
                if number > MAX_COUNTER {
                    return Err(format!("{} must not exceed {}", column, MAX_COUNTER));
                }
                Ok(FieldValue::Integer(number))
            }
            VideoField::Url | VideoField::Title => {
                let text = match value {
                    Value::String(s) if !s.trim().is_empty() => s.clone(),
                    _ => return Err(format!("{} must be a non-empty string", column)),
                };
                if self == VideoField::Title && text.chars().count() > MAX_TITLE_CHARS {
                    return Err(format!("{} exceeds {} characters", column, MAX_TITLE_CHARS));
                }
                Ok(FieldValue::Text(Some(text)))
            }
            _ => match value {
                Value::Null => Ok(FieldValue::Text(None)),
                Value::String(s) => Ok(FieldValue::Text(Some(s.clone()))),
                Value::Number(n) => Ok(FieldValue::Text(Some(n.to_string()))),
                _ => Err(format!("{} must be a string", column)),
            },
        }
    }
}

/// Typed CRUD over the `videos` table.
pub struct VideoStore<'a> {
    pool: &'a AnyPool,
    dialect: Dialect,
}

impl<'a> VideoStore<'a> {
    pub(crate) fn new(pool: &'a AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    fn ph(&self, index: usize) -> String {
        self.dialect.placeholder(index)
    }

    /// Upserts `video` by replacing every data column of an existing row with
    /// the same id. `created_at` survives the replace.
    ///
    /// Returns `Ok(false)` when the record fails validation.
    #[tracing::instrument(
        name = "Insert video",
        skip(self, video),
        fields(video_id = video.video_id)
    )]
    pub async fn insert(&self, video: &NewVideo) -> Result<bool, StoreError> {
        if let Err(reason) = video.validate() {
            tracing::warn!("Rejected video {}: {}", video.video_id, reason);
            return Ok(false);
        }

        let sql = self
            .dialect
            .upsert_statement("videos", &UPSERT_COLUMNS, "video_id", &["created_at"]);
        let now = now_timestamp();

        sqlx::query(&sql)
            .bind(video.video_id)
            .bind(video.video_url.as_str())
            .bind(video.video_image.as_deref())
            .bind(video.video_title.as_str())
            .bind(video.video_category.as_deref())
            .bind(video.play_count)
            .bind(video.upload_time.as_deref())
            .bind(video.video_duration.as_deref())
            .bind(video.video_coins)
            .bind(now.as_str())
            .bind(now.as_str())
            .execute(self.pool)
            .await?;

        Ok(true)
    }

    /// Inserts each record independently; failures are logged and skipped.
    #[tracing::instrument(name = "Insert videos", skip(self, videos), fields(count = videos.len()))]
    pub async fn insert_many(&self, videos: &[NewVideo]) -> usize {
        let mut inserted = 0;

        for video in videos {
            match self.insert(video).await {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        video_id = video.video_id,
                        error = %e,
                        "Failed to insert video"
                    );
                }
            }
        }

        tracing::info!("Batch insert finished: {}/{} stored", inserted, videos.len());
        inserted
    }

    pub async fn get(&self, video_id: i64) -> Result<Option<VideoRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM videos WHERE video_id = {}",
            VIDEO_COLUMNS,
            self.ph(1)
        );

        let video = sqlx::query_as::<_, VideoRecord>(&sql)
            .bind(video_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(video)
    }

    /// Newest first by `upload_time`. The column is free text, so this is a
    /// plain string comparison: callers wanting chronological order must store
    /// a sortable format such as `YYYY-MM-DD HH:MM:SS`.
    pub async fn list_all(
        &self,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<VideoRecord>, StoreError> {
        let (page, page_args) = self.page_clause(limit, offset, 1);
        let sql = format!(
            "SELECT {} FROM videos ORDER BY upload_time DESC, video_id DESC{}",
            VIDEO_COLUMNS, page
        );

        let mut query = sqlx::query_as::<_, VideoRecord>(&sql);
        for arg in page_args {
            query = query.bind(arg);
        }

        Ok(query.fetch_all(self.pool).await?)
    }

    pub async fn list_by_category(
        &self,
        category: &str,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<VideoRecord>, StoreError> {
        let (page, page_args) = self.page_clause(limit, offset, 2);
        let sql = format!(
            "SELECT {} FROM videos WHERE video_category = {} \
             ORDER BY upload_time DESC, video_id DESC{}",
            VIDEO_COLUMNS,
            self.ph(1),
            page
        );

        let mut query = sqlx::query_as::<_, VideoRecord>(&sql).bind(category);
        for arg in page_args {
            query = query.bind(arg);
        }

        Ok(query.fetch_all(self.pool).await?)
    }

    /// Substring match on the title, most played first.
    ///
    /// Case sensitivity depends on the backend: SQLite `LIKE` folds ASCII
    /// letters only, MySQL follows the table collation (case-insensitive).
    pub async fn search(
        &self,
        keyword: &str,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<VideoRecord>, StoreError> {
        let pattern = format!("%{}%", escape_like(keyword));
        let (page, page_args) = self.page_clause(limit, offset, 2);
        let sql = format!(
            "SELECT {} FROM videos WHERE video_title LIKE {} ESCAPE '!' \
             ORDER BY play_count DESC, video_id DESC{}",
            VIDEO_COLUMNS,
            self.ph(1),
            page
        );

        let mut query = sqlx::query_as::<_, VideoRecord>(&sql).bind(pattern);
        for arg in page_args {
            query = query.bind(arg);
        }

        Ok(query.fetch_all(self.pool).await?)
    }

    pub async fn top_by_play_count(&self, limit: i64) -> Result<Vec<VideoRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM videos ORDER BY play_count DESC, video_id DESC LIMIT {}",
            VIDEO_COLUMNS,
            self.ph(1)
        );

        let videos = sqlx::query_as::<_, VideoRecord>(&sql)
            .bind(limit.max(0))
            .fetch_all(self.pool)
            .await?;

        Ok(videos)
    }

    /// Adds `increment` (possibly negative) to the play count in a single
    /// statement. The count saturates at zero and at [`MAX_COUNTER`].
    #[tracing::instrument(name = "Update play count", skip(self))]
    pub async fn update_play_count(
        &self,
        video_id: i64,
        increment: i64,
    ) -> Result<bool, StoreError> {
        let increment = increment.clamp(-MAX_COUNTER, MAX_COUNTER);
        let current = self.dialect.least(&MAX_COUNTER.to_string(), "play_count");
        let new_count = self.dialect.least(
            &MAX_COUNTER.to_string(),
            &self
                .dialect
                .greatest("0", &format!("{} + {}", current, self.ph(1))),
        );
        let sql = format!(
            "UPDATE videos SET play_count = {}, updated_at = {} WHERE video_id = {}",
            new_count,
            self.ph(2),
            self.ph(3)
        );

        let result = sqlx::query(&sql)
            .bind(increment)
            .bind(now_timestamp())
            .bind(video_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies the allow-listed keys of `fields`; any other key is ignored.
    ///
    /// Returns `Ok(false)` when nothing updatable was supplied, when a value
    /// would break a row invariant, or when no row has `video_id`.
    #[tracing::instrument(name = "Update video", skip(self, fields))]
    pub async fn update(
        &self,
        video_id: i64,
        fields: &Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let mut assignments = Vec::new();
        let mut values = Vec::new();

        for (key, value) in fields {
            let Some(field) = VideoField::from_key(key) else {
                tracing::debug!("Ignoring non-updatable field '{}'", key);
                continue;
            };
            match field.parse(value) {
                Ok(parsed) => {
                    let placeholder = self.ph(values.len() + 1);
                    assignments.push(format!("{} = {}", field.column(), placeholder));
                    values.push(parsed);
                }
                Err(reason) => {
                    tracing::warn!("Rejected update of video {}: {}", video_id, reason);
                    return Ok(false);
                }
            }
        }

        if values.is_empty() {
            return Ok(false);
        }

        assignments.push(format!("updated_at = {}", self.ph(values.len() + 1)));
        let sql = format!(
            "UPDATE videos SET {} WHERE video_id = {}",
            assignments.join(", "),
            self.ph(values.len() + 2)
        );

        let mut query = sqlx::query(&sql);
        for value in &values {
            query = match value {
                FieldValue::Text(text) => query.bind(text.as_deref()),
                FieldValue::Integer(number) => query.bind(*number),
            };
        }
        let result = query
            .bind(now_timestamp())
            .bind(video_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(name = "Delete video", skip(self))]
    pub async fn delete(&self, video_id: i64) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM videos WHERE video_id = {}", self.ph(1));

        let result = sqlx::query(&sql).bind(video_id).execute(self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    /// Video count per category, largest first. Uncategorised rows are
    /// reported under a null/empty category.
    pub async fn categories(&self) -> Result<Vec<CategoryCount>, StoreError> {
        let categories = sqlx::query_as::<_, CategoryCount>(
            "SELECT video_category, COUNT(*) AS video_count FROM videos \
             GROUP BY video_category ORDER BY video_count DESC, video_category ASC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// Like [`VideoStore::categories`] without the uncategorised bucket.
    pub async fn category_stats(&self) -> Result<Vec<CategoryCount>, StoreError> {
        let categories = sqlx::query_as::<_, CategoryCount>(
            "SELECT video_category, COUNT(*) AS video_count FROM videos \
             WHERE video_category IS NOT NULL AND video_category != '' \
             GROUP BY video_category ORDER BY video_count DESC, video_category ASC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn statistics(&self) -> Result<Statistics, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) AS total_videos, {} AS total_plays, \
             COUNT(DISTINCT video_category) AS category_count FROM videos",
            self.dialect.integer_cast("COALESCE(SUM(play_count), 0)")
        );

        let totals = sqlx::query_as::<_, TotalsRow>(&sql)
            .fetch_one(self.pool)
            .await?;

        Ok(Statistics {
            total_videos: totals.total_videos,
            total_plays: totals.total_plays,
            category_count: totals.category_count,
            total_categories: totals.category_count,
            average_plays: average_plays(totals.total_plays, totals.total_videos),
        })
    }

    pub async fn collection_status(&self, hours: i64) -> Result<CollectionStatus, StoreError> {
        let total_videos = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM videos")
            .fetch_one(self.pool)
            .await?;

        let total_categories = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT video_category) FROM videos \
             WHERE video_category IS NOT NULL AND video_category != ''",
        )
        .fetch_one(self.pool)
        .await?;

        let latest_collection_time =
            sqlx::query_scalar::<_, Option<String>>("SELECT MAX(created_at) FROM videos")
                .fetch_one(self.pool)
                .await?;

        let mut category_breakdown = self.category_stats().await?;
        category_breakdown.truncate(10);

        Ok(CollectionStatus {
            total_videos,
            total_categories,
            latest_collection_time,
            category_breakdown,
            hours_checked: hours,
        })
    }

    /// Time-prefixed id: `YYMMDDHHMM` followed by a random 4-digit suffix.
    /// Two calls in the same minute can collide.
    pub fn next_id(&self) -> i64 {
        generate_video_id(Local::now().naive_local(), &mut rand::thread_rng())
    }

    /// Rows eligible for duplicate grouping, lowest id first.
    pub(crate) async fn duplicate_candidates(
        &self,
        column: &'static str,
    ) -> Result<Vec<VideoSummary>, StoreError> {
        let sql = format!(
            "SELECT video_id, video_title, video_image, video_category, upload_time FROM videos \
             WHERE {column} IS NOT NULL AND {column} != '' ORDER BY video_id ASC"
        );

        let rows = sqlx::query_as::<_, VideoSummary>(&sql)
            .fetch_all(self.pool)
            .await?;

        Ok(rows)
    }

    /// `LIMIT`/`OFFSET` suffix whose placeholders start at `next`, plus the
    /// values to bind for them in order.
    fn page_clause(&self, limit: Option<i64>, offset: i64, next: usize) -> (String, Vec<i64>) {
        let offset = offset.max(0);
        match limit {
            Some(limit) => (
                format!(" LIMIT {} OFFSET {}", self.ph(next), self.ph(next + 1)),
                vec![limit.max(0), offset],
            ),
            None if offset > 0 => (
                format!(
                    " LIMIT {} OFFSET {}",
                    self.dialect.unbounded_limit(),
                    self.ph(next)
                ),
                vec![offset],
            ),
            None => (String::new(), Vec::new()),
        }
    }
}

pub fn generate_video_id<R: Rng>(now: NaiveDateTime, rng: &mut R) -> i64 {
    let prefix = i64::from(now.year().rem_euclid(100)) * 100_000_000
        + i64::from(now.month()) * 1_000_000
        + i64::from(now.day()) * 10_000
        + i64::from(now.hour()) * 100
        + i64::from(now.minute());
    let suffix: i64 = rng.gen_range(1000..=9999);
    prefix * 10_000 + suffix
}

fn average_plays(total_plays: i64, total_videos: i64) -> f64 {
    if total_videos == 0 {
        return 0.0;
    }
    let average = total_plays as f64 / total_videos as f64;
    (average * 100.0).round() / 100.0
}

/// Escapes `LIKE` wildcards with `!` so the keyword matches literally.
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store;
    use chrono::NaiveDate;
    use rand::rngs::mock::StepRng;
    use serde_json::json;

    fn video(id: i64, title: &str, upload_time: &str) -> NewVideo {
        NewVideo {
            video_id: id,
            video_url: format!("https://cdn.example.com/{id}.m3u8"),
            video_image: Some(format!("https://img.example.com/{id}.jpg")),
            video_title: title.to_string(),
            video_category: Some("电影".to_string()),
            play_count: 0,
            upload_time: Some(upload_time.to_string()),
            video_duration: Some("01:30:00".to_string()),
            video_coins: 0,
        }
    }

    fn fields(value: serde_json::Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = memory_store().await;
        let videos = store.videos();
        let input = NewVideo {
            play_count: 42,
            video_coins: 3,
            ..video(1, "示例视频", "2026-01-30 10:00:00")
        };

        assert!(videos.insert(&input).await.unwrap());

        let stored = videos.get(1).await.unwrap().unwrap();
        assert_eq!(NewVideo::from(&stored), input);
        assert!(stored.created_at.is_some());
        assert!(stored.updated_at.is_some());
    }

    #[tokio::test]
    async fn optional_fields_round_trip_as_none() {
        let store = memory_store().await;
        let input = NewVideo {
            video_id: 2,
            video_url: "https://cdn.example.com/2.mp4".into(),
            video_title: "bare".into(),
            ..NewVideo::default()
        };

        assert!(store.videos().insert(&input).await.unwrap());

        let stored = store.videos().get(2).await.unwrap().unwrap();
        assert_eq!(NewVideo::from(&stored), input);
    }

    #[tokio::test]
    async fn reinsert_replaces_whole_row_but_keeps_created_at() {
        let store = memory_store().await;
        let videos = store.videos();
        videos.insert(&NewVideo { play_count: 9, ..video(7, "first", "2024") }).await.unwrap();
        let before = videos.get(7).await.unwrap().unwrap();

        let replacement = NewVideo {
            video_category: None,
            ..video(7, "second", "2025")
        };
        assert!(videos.insert(&replacement).await.unwrap());

        let after = videos.get(7).await.unwrap().unwrap();
        assert_eq!(after.video_title, "second");
        assert_eq!(after.play_count, 0);
        assert_eq!(after.video_category, None);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(videos.list_all(None, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn identical_reinsert_is_idempotent() {
        let store = memory_store().await;
        let input = video(3, "same", "2024-01-01");

        store.videos().insert(&input).await.unwrap();
        store.videos().insert(&input).await.unwrap();

        let all = store.videos().list_all(None, 0).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(NewVideo::from(&all[0]), input);
    }

    #[tokio::test]
    async fn missing_required_fields_return_false() {
        let store = memory_store().await;
        let videos = store.videos();

        let rejected = [
            NewVideo { video_url: String::new(), ..video(1, "t", "") },
            video(2, "   ", ""),
            video(0, "no id", ""),
            video(3, &"x".repeat(MAX_TITLE_CHARS + 1), ""),
            NewVideo { play_count: -1, ..video(4, "neg", "") },
            NewVideo { play_count: i64::MAX, ..video(5, "huge", "") },
            NewVideo { video_coins: MAX_COUNTER + 1, ..video(6, "rich", "") },
        ];
        for input in &rejected {
            assert!(!videos.insert(input).await.unwrap(), "{:?}", input);
        }

        assert!(videos.list_all(None, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_many_counts_successes_and_keeps_going() {
        let store = memory_store().await;
        let batch = vec![
            video(1, "a", "1"),
            video(2, "", "2"),
            video(3, "c", "3"),
        ];

        assert_eq!(store.videos().insert_many(&batch).await, 2);
        assert!(store.videos().get(3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = memory_store().await;
        assert!(store.videos().get(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn play_count_increments_are_exact() {
        let store = memory_store().await;
        let videos = store.videos();
        videos.insert(&NewVideo { play_count: 10, ..video(5, "t", "") }).await.unwrap();

        for _ in 0..7 {
            assert!(videos.update_play_count(5, 1).await.unwrap());
        }

        assert_eq!(videos.get(5).await.unwrap().unwrap().play_count, 17);
    }

    #[tokio::test]
    async fn negative_increment_never_goes_below_zero() {
        let store = memory_store().await;
        let videos = store.videos();
        videos.insert(&NewVideo { play_count: 3, ..video(5, "t", "") }).await.unwrap();

        assert!(videos.update_play_count(5, -2).await.unwrap());
        assert_eq!(videos.get(5).await.unwrap().unwrap().play_count, 1);

        assert!(videos.update_play_count(5, -10).await.unwrap());
        assert_eq!(videos.get(5).await.unwrap().unwrap().play_count, 0);
    }

    #[tokio::test]
    async fn play_count_saturates_at_ceiling() {
        let store = memory_store().await;
        let videos = store.videos();
        videos
            .insert(&NewVideo { play_count: MAX_COUNTER, ..video(1, "hit", "") })
            .await
            .unwrap();
        videos.insert(&NewVideo { play_count: 5, ..video(2, "t", "") }).await.unwrap();

        assert!(videos.update_play_count(1, 1).await.unwrap());
        assert!(videos.update_play_count(2, i64::MAX).await.unwrap());
        assert!(videos.update_play_count(2, i64::MIN).await.unwrap());
        assert!(videos.update_play_count(2, 3).await.unwrap());

        assert_eq!(videos.get(1).await.unwrap().unwrap().play_count, MAX_COUNTER);
        assert_eq!(videos.get(2).await.unwrap().unwrap().play_count, 3);
        assert_eq!(videos.list_all(None, 0).await.unwrap().len(), 2);
        assert_eq!(videos.top_by_play_count(1).await.unwrap()[0].video_id, 1);
        assert_eq!(
            videos.statistics().await.unwrap().total_plays,
            MAX_COUNTER + 3
        );
    }

    #[tokio::test]
    async fn play_count_on_missing_video_is_false() {
        let store = memory_store().await;
        assert!(!store.videos().update_play_count(99, 1).await.unwrap());
    }

    #[tokio::test]
    async fn list_all_pages_by_upload_time() {
        let store = memory_store().await;
        let videos = store.videos();
        for day in 1..=5 {
            videos
                .insert(&video(day, &format!("v{day}"), &format!("2024-01-0{day} 00:00:00")))
                .await
                .unwrap();
        }

        let page: Vec<i64> = videos
            .list_all(Some(2), 1)
            .await
            .unwrap()
            .iter()
            .map(|v| v.video_id)
            .collect();
        assert_eq!(page, vec![4, 3]);

        let rest: Vec<i64> = videos
            .list_all(None, 3)
            .await
            .unwrap()
            .iter()
            .map(|v| v.video_id)
            .collect();
        assert_eq!(rest, vec![2, 1]);
    }

    #[tokio::test]
    async fn upload_time_sorts_as_text() {
        let store = memory_store().await;
        let videos = store.videos();
        videos.insert(&video(1, "october", "2024-10-01")).await.unwrap();
        videos.insert(&video(2, "september", "2024-9-1")).await.unwrap();

        let order: Vec<i64> = videos
            .list_all(None, 0)
            .await
            .unwrap()
            .iter()
            .map(|v| v.video_id)
            .collect();

        assert_eq!(order, vec![2, 1]);
    }

    #[tokio::test]
    async fn list_by_category_is_exact_match() {
        let store = memory_store().await;
        let videos = store.videos();
        videos.insert(&video(1, "a", "1")).await.unwrap();
        videos
            .insert(&NewVideo { video_category: Some("电影2".into()), ..video(2, "b", "2") })
            .await
            .unwrap();

        let found = videos.list_by_category("电影", None, 0).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].video_id, 1);
    }

    #[tokio::test]
    async fn search_orders_by_play_count_and_escapes_wildcards() {
        let store = memory_store().await;
        let videos = store.videos();
        for (id, title, plays) in [(1, "海绵宝宝 第一集", 5), (2, "海绵宝宝 第二集", 50)] {
            videos
                .insert(&NewVideo { play_count: plays, ..video(id, title, "") })
                .await
                .unwrap();
        }
        videos.insert(&video(3, "100% real", "")).await.unwrap();
        videos.insert(&video(4, "1000 real", "")).await.unwrap();

        let hits: Vec<i64> = videos
            .search("海绵宝宝", None, 0)
            .await
            .unwrap()
            .iter()
            .map(|v| v.video_id)
            .collect();
        assert_eq!(hits, vec![2, 1]);

        let literal = videos.search("0%", None, 0).await.unwrap();
        assert_eq!(literal.len(), 1);
        assert_eq!(literal[0].video_id, 3);

        assert_eq!(videos.search("海绵宝宝", Some(1), 1).await.unwrap()[0].video_id, 1);
    }

    #[tokio::test]
    async fn top_by_play_count_limits_results() {
        let store = memory_store().await;
        let videos = store.videos();
        for (id, plays) in [(1, 10), (2, 30), (3, 20)] {
            videos.insert(&NewVideo { play_count: plays, ..video(id, "t", "") }).await.unwrap();
        }

        let top: Vec<i64> = videos
            .top_by_play_count(2)
            .await
            .unwrap()
            .iter()
            .map(|v| v.video_id)
            .collect();

        assert_eq!(top, vec![2, 3]);
    }

    #[tokio::test]
    async fn update_ignores_fields_outside_allow_list() {
        let store = memory_store().await;
        let videos = store.videos();
        let original = video(8, "before", "2024");
        videos.insert(&original).await.unwrap();

        let updated = videos
            .update(8, &fields(json!({"video_title": "x", "malicious_field": "y"})))
            .await
            .unwrap();

        assert!(updated);
        let stored = videos.get(8).await.unwrap().unwrap();
        assert_eq!(stored.video_title, "x");
        assert_eq!(
            NewVideo { video_title: "x".into(), ..original },
            NewVideo::from(&stored)
        );
    }

    #[tokio::test]
    async fn update_accepts_numbers_and_nulls() {
        let store = memory_store().await;
        let videos = store.videos();
        videos.insert(&video(8, "t", "2024")).await.unwrap();

        let updated = videos
            .update(
                8,
                &fields(json!({"play_count": "12", "video_coins": 4, "video_image": null})),
            )
            .await
            .unwrap();

        assert!(updated);
        let stored = videos.get(8).await.unwrap().unwrap();
        assert_eq!(stored.play_count, 12);
        assert_eq!(stored.video_coins, 4);
        assert_eq!(stored.video_image, None);
    }

    #[tokio::test]
    async fn update_rejections_are_false() {
        let store = memory_store().await;
        let videos = store.videos();
        videos.insert(&video(8, "t", "2024")).await.unwrap();

        assert!(!videos.update(8, &fields(json!({"unknown": 1}))).await.unwrap());
        assert!(!videos.update(8, &fields(json!({"video_title": ""}))).await.unwrap());
        assert!(!videos.update(8, &fields(json!({"play_count": -4}))).await.unwrap());
        assert!(!videos.update(8, &fields(json!({"video_coins": "lots"}))).await.unwrap());
        assert!(!videos
            .update(8, &fields(json!({"play_count": i64::MAX})))
            .await
            .unwrap());
        assert!(!videos.update(404, &fields(json!({"video_title": "y"}))).await.unwrap());

        assert_eq!(videos.get(8).await.unwrap().unwrap().video_title, "t");
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_went_away() {
        let store = memory_store().await;
        let videos = store.videos();
        videos.insert(&video(1, "t", "")).await.unwrap();

        assert!(videos.delete(1).await.unwrap());
        assert!(!videos.delete(1).await.unwrap());
        assert!(videos.get(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn categories_are_counted_largest_first() {
        let store = memory_store().await;
        let videos = store.videos();
        videos.insert(&video(1, "a", "")).await.unwrap();
        videos.insert(&video(2, "b", "")).await.unwrap();
        videos
            .insert(&NewVideo { video_category: Some("动漫".into()), ..video(3, "c", "") })
            .await
            .unwrap();
        videos
            .insert(&NewVideo { video_category: None, ..video(4, "d", "") })
            .await
            .unwrap();

        let all = videos.categories().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(
            all[0],
            CategoryCount { video_category: Some("电影".into()), video_count: 2 }
        );

        let named = videos.category_stats().await.unwrap();
        assert_eq!(named.len(), 2);
        assert!(named.iter().all(|c| c.video_category.is_some()));
    }

    #[tokio::test]
    async fn statistics_on_empty_store_are_zero() {
        let store = memory_store().await;

        let stats = store.videos().statistics().await.unwrap();

        assert_eq!(stats.total_videos, 0);
        assert_eq!(stats.total_plays, 0);
        assert_eq!(stats.category_count, 0);
        assert_eq!(stats.average_plays, 0.0);
    }

    #[tokio::test]
    async fn statistics_round_average_to_two_decimals() {
        let store = memory_store().await;
        let videos = store.videos();
        for (id, plays) in [(1, 1), (2, 1), (3, 0)] {
            videos.insert(&NewVideo { play_count: plays, ..video(id, "t", "") }).await.unwrap();
        }

        let stats = videos.statistics().await.unwrap();

        assert_eq!(stats.total_videos, 3);
        assert_eq!(stats.total_plays, 2);
        assert_eq!(stats.category_count, 1);
        assert_eq!(stats.total_categories, 1);
        assert_eq!(stats.average_plays, 0.67);
    }

    #[tokio::test]
    async fn collection_status_summarises_catalog() {
        let store = memory_store().await;
        let videos = store.videos();
        videos.insert(&video(1, "a", "")).await.unwrap();
        videos
            .insert(&NewVideo { video_category: Some(String::new()), ..video(2, "b", "") })
            .await
            .unwrap();

        let status = videos.collection_status(24).await.unwrap();

        assert_eq!(status.total_videos, 2);
        assert_eq!(status.total_categories, 1);
        assert_eq!(status.hours_checked, 24);
        assert!(status.latest_collection_time.is_some());
        assert_eq!(status.category_breakdown.len(), 1);
    }

    #[test]
    fn generated_ids_carry_minute_prefix_and_four_digit_suffix() {
        let now = NaiveDate::from_ymd_opt(2026, 1, 30)
            .unwrap()
            .and_hms_opt(10, 5, 59)
            .unwrap();
        let mut rng = StepRng::new(0, 0);

        let id = generate_video_id(now, &mut rng);

        assert_eq!(id / 10_000, 2601301005);
        assert!((1000..=9999).contains(&(id % 10_000)));
    }

    #[tokio::test]
    async fn next_id_has_fourteen_digits() {
        let store = memory_store().await;
        let id = store.videos().next_id();
        assert_eq!(id.to_string().len(), 14);
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("100%_!"), "100!%!_!!");
        assert_eq!(escape_like("plain"), "plain");
    }
}
