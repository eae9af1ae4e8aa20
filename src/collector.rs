//! HTTP client for CMS-style `provide/vod` catalog feeds.
//!
//! Every fetch is best-effort: a network, status or decode failure is logged
//! and comes back as an empty result. Nothing is retried.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::CollectorConfig;
use crate::errors::AppError;
use crate::ingest::{integer, RawItem};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Optional narrowing of a collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectFilter {
    pub type_id: Option<i64>,
    pub keyword: Option<String>,
    /// Only items updated within this many hours.
    pub hours: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorCategory {
    pub type_id: i64,
    pub type_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectorPage {
    pub total: i64,
    pub page: i64,
    pub page_count: i64,
    pub list: Vec<RawItem>,
}

impl CollectorPage {
    fn empty(page: i64) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    /// Reads a `?ac=detail` response. Counters may arrive as strings.
    fn from_response(body: &Value, page: i64) -> Self {
        let list = body
            .get("list")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_object().cloned())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            total: integer(body.get("total")).unwrap_or(0),
            page: integer(body.get("page")).unwrap_or(page),
            page_count: integer(body.get("pagecount")).unwrap_or(1),
            list,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorClient {
    http_client: Client,
    base_url: Url,
    page_delay: Duration,
}

impl CollectorClient {
    pub fn new(config: &CollectorConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid collector URL '{}': {}", config.base_url, e))?;
        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            page_delay: config.page_delay,
        })
    }

    #[tracing::instrument(name = "Fetch collector categories", skip(self))]
    pub async fn fetch_categories(&self) -> Vec<CollectorCategory> {
        let url = self.url_with(&[("ac", "list".to_string())]);

        match self.get_json(url).await {
            Ok(body) => body
                .get("class")
                .and_then(Value::as_array)
                .map(|classes| classes.iter().filter_map(parse_category).collect())
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch collector categories");
                Vec::new()
            }
        }
    }

    #[tracing::instrument(name = "Fetch collector page", skip(self, filter))]
    pub async fn fetch_page(&self, page: i64, filter: &CollectFilter) -> CollectorPage {
        let mut params = vec![("ac", "detail".to_string()), ("pg", page.to_string())];
        if let Some(type_id) = filter.type_id {
            params.push(("t", type_id.to_string()));
        }
        if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.is_empty()) {
            params.push(("wd", keyword.to_string()));
        }
        if let Some(hours) = filter.hours {
            params.push(("h", hours.to_string()));
        }

        match self.get_json(self.url_with(&params)).await {
            Ok(body) => {
                let result = CollectorPage::from_response(&body, page);
                tracing::debug!(
                    "Page {}/{}: {} items",
                    result.page,
                    result.page_count,
                    result.list.len()
                );
                result
            }
            Err(e) => {
                tracing::warn!(page, error = %e, "Failed to fetch collector page");
                CollectorPage::empty(page)
            }
        }
    }

    /// Looks up one item by its feed id. `None` when the feed has no such
    /// item or cannot be reached.
    #[tracing::instrument(name = "Fetch collector detail", skip(self))]
    pub async fn fetch_detail(&self, vod_id: i64) -> Option<RawItem> {
        let params = [("ac", "detail".to_string()), ("ids", vod_id.to_string())];

        match self.get_json(self.url_with(&params)).await {
            Ok(body) => CollectorPage::from_response(&body, 1)
                .list
                .into_iter()
                .find(|item| integer(item.get("vod_id")) == Some(vod_id)),
            Err(e) => {
                tracing::warn!(vod_id, error = %e, "Failed to fetch collector detail");
                None
            }
        }
    }

    /// Walks pages from `start_page` up to the advertised page count, capped
    /// by `max_pages`, pausing between requests. Stops at the first empty page.
    #[tracing::instrument(name = "Collect catalog", skip(self))]
    pub async fn collect_all(
        &self,
        filter: &CollectFilter,
        start_page: i64,
        max_pages: Option<i64>,
    ) -> Vec<RawItem> {
        let start_page = start_page.max(1);
        let first = self.fetch_page(start_page, filter).await;
        if first.list.is_empty() {
            tracing::warn!("Collector returned no items");
            return Vec::new();
        }

        let mut last_page = first.page_count;
        if let Some(max_pages) = max_pages.filter(|m| *m > 0) {
            last_page = last_page.min(start_page + max_pages - 1);
        }
        tracing::info!(
            "Collector reports {} pages, fetching {}",
            first.page_count,
            (last_page - start_page + 1).max(1)
        );

        let mut collected = first.list;
        for page in start_page + 1..=last_page {
            tokio::time::sleep(self.page_delay).await;

            let next = self.fetch_page(page, filter).await;
            if next.list.is_empty() {
                tracing::warn!("Page {} is empty, stopping", page);
                break;
            }
            collected.extend(next.list);
        }

        tracing::info!("Collected {} items", collected.len());
        collected
    }

    fn url_with(&self, params: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        url
    }

    async fn get_json(&self, url: Url) -> Result<Value, AppError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<Value>().await?)
    }
}

fn parse_category(value: &Value) -> Option<CollectorCategory> {
    Some(CollectorCategory {
        type_id: integer(value.get("type_id"))?,
        type_name: value.get("type_name")?.as_str()?.to_string(),
    })
}
