//! Duplicate detection over the catalog.
//!
//! Grouping happens here rather than in SQL so that both backends produce the
//! same groups regardless of their collation rules.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::{VideoStore, VideoSummary};
use crate::errors::StoreError;

pub const MAX_GROUPS: usize = 100;

const TITLE_NOISE: [char; 5] = [' ', '\u{3000}', '-', '_', '.'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateMode {
    Title,
    Image,
}

impl fmt::Display for DuplicateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateMode::Title => write!(f, "title"),
            DuplicateMode::Image => write!(f, "image"),
        }
    }
}

impl FromStr for DuplicateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(DuplicateMode::Title),
            "image" => Ok(DuplicateMode::Image),
            other => Err(format!("Unknown duplicate type '{}', expected title or image", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub duplicate_value: String,
    pub duplicate_type: DuplicateMode,
    pub count: usize,
    pub videos: Vec<VideoSummary>,
}

/// Removes spacing and separator characters. Case is kept as-is.
pub fn normalize_title(title: &str) -> String {
    title.chars().filter(|c| !TITLE_NOISE.contains(c)).collect()
}

impl<'a> VideoStore<'a> {
    #[tracing::instrument(name = "Find duplicates", skip(self))]
    pub async fn find_duplicates(
        &self,
        mode: DuplicateMode,
    ) -> Result<Vec<DuplicateGroup>, StoreError> {
        let column = match mode {
            DuplicateMode::Title => "video_title",
            DuplicateMode::Image => "video_image",
        };
        let rows = self.duplicate_candidates(column).await?;
        let groups = group_duplicates(rows, mode);

        tracing::debug!("Found {} {} duplicate groups", groups.len(), mode);
        Ok(groups)
    }
}

/// Groups `rows` (expected in ascending `video_id` order) by their duplicate
/// key and keeps groups with more than one member.
pub fn group_duplicates(rows: Vec<VideoSummary>, mode: DuplicateMode) -> Vec<DuplicateGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<Vec<VideoSummary>> = Vec::new();

    for row in rows {
        let key = match mode {
            DuplicateMode::Title => normalize_title(&row.video_title),
            DuplicateMode::Image => row.video_image.clone().unwrap_or_default(),
        };
        if key.is_empty() {
            continue;
        }
        match index.get(&key) {
            Some(&slot) => buckets[slot].push(row),
            None => {
                index.insert(key, buckets.len());
                buckets.push(vec![row]);
            }
        }
    }

    let mut groups: Vec<DuplicateGroup> = buckets
        .into_iter()
        .filter(|members| members.len() > 1)
        .map(|mut members| {
            members.sort_by_key(|m| m.video_id);
            let first = &members[0];
            let duplicate_value = match mode {
                DuplicateMode::Title => first.video_title.clone(),
                DuplicateMode::Image => first.video_image.clone().unwrap_or_default(),
            };
            DuplicateGroup {
                duplicate_value,
                duplicate_type: mode,
                count: members.len(),
                videos: members,
            }
        })
        .collect();

    groups.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.videos[0].video_id.cmp(&b.videos[0].video_id))
    });
    groups.truncate(MAX_GROUPS);
    groups
}
