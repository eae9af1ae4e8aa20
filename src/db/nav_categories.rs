use serde::{Deserialize, Serialize};
use sqlx::{AnyPool, FromRow};

use super::{now_timestamp, Dialect};
use crate::errors::StoreError;

/// One entry of the site navigation taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavCategory {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub subcategories: Vec<String>,
}

#[derive(Debug, FromRow)]
struct NavCategoryRow {
    category_key: String,
    label: String,
    subcategories: Option<String>,
}

impl From<NavCategoryRow> for NavCategory {
    fn from(row: NavCategoryRow) -> Self {
        let subcategories = row
            .subcategories
            .as_deref()
            .and_then(|raw| match serde_json::from_str::<Vec<String>>(raw) {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!(
                        category_key = %row.category_key,
                        error = %e,
                        "Unreadable subcategories, using an empty list"
                    );
                    None
                }
            })
            .unwrap_or_default();

        Self {
            key: row.category_key,
            label: row.label,
            subcategories,
        }
    }
}

pub struct NavCategoryStore<'a> {
    pool: &'a AnyPool,
    dialect: Dialect,
}

impl<'a> NavCategoryStore<'a> {
    pub(crate) fn new(pool: &'a AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    pub async fn list(&self) -> Result<Vec<NavCategory>, StoreError> {
        let rows = sqlx::query_as::<_, NavCategoryRow>(
            "SELECT category_key, label, subcategories FROM nav_categories \
             ORDER BY sort_order ASC, id ASC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(NavCategory::from).collect())
    }

    /// Swaps the whole taxonomy for `categories` inside one transaction.
    /// `sort_order` follows the slice order. On any failure the transaction
    /// is dropped uncommitted and the previous set stays in place.
    #[tracing::instrument(
        name = "Replace nav categories",
        skip(self, categories),
        fields(count = categories.len())
    )]
    pub async fn replace_all(&self, categories: &[NavCategory]) -> Result<usize, StoreError> {
        let encoded = categories
            .iter()
            .map(|c| serde_json::to_string(&c.subcategories))
            .collect::<Result<Vec<_>, _>>()?;

        let insert = format!(
            "INSERT INTO nav_categories \
             (category_key, label, subcategories, sort_order, created_at, updated_at) \
             VALUES ({})",
            self.dialect.placeholders(1, 6)
        );
        let now = now_timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM nav_categories")
            .execute(&mut *tx)
            .await?;

        for (position, (category, subcategories)) in categories.iter().zip(&encoded).enumerate() {
            sqlx::query(&insert)
                .bind(category.key.as_str())
                .bind(category.label.as_str())
                .bind(subcategories.as_str())
                .bind(position as i64)
                .bind(now.as_str())
                .bind(now.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!("Saved {} navigation categories", categories.len());
        Ok(categories.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store;

    fn category(key: &str, subs: &[&str]) -> NavCategory {
        NavCategory {
            key: key.to_string(),
            label: key.to_uppercase(),
            subcategories: subs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let store = memory_store().await;
        assert!(store.nav_categories().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_all_keeps_given_order() {
        let store = memory_store().await;
        let nav = store.nav_categories();
        let saved = vec![
            category("recommend", &[]),
            category("movie", &["action", "comedy"]),
            category("anime", &["japan"]),
        ];

        assert_eq!(nav.replace_all(&saved).await.unwrap(), 3);

        assert_eq!(nav.list().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn replace_all_drops_previous_entries() {
        let store = memory_store().await;
        let nav = store.nav_categories();
        nav.replace_all(&[category("old", &["x"])]).await.unwrap();

        nav.replace_all(&[category("new", &[])]).await.unwrap();

        assert_eq!(nav.list().await.unwrap(), vec![category("new", &[])]);
    }

    #[tokio::test]
    async fn failed_save_leaves_prior_set_intact() {
        let store = memory_store().await;
        let nav = store.nav_categories();
        let prior = vec![category("movie", &["action"])];
        nav.replace_all(&prior).await.unwrap();

        let duplicate_keys = vec![category("tv", &[]), category("tv", &[])];
        assert!(nav.replace_all(&duplicate_keys).await.is_err());

        assert_eq!(nav.list().await.unwrap(), prior);
    }

    #[tokio::test]
    async fn unreadable_subcategories_become_empty() {
        let store = memory_store().await;
        sqlx::query(
            "INSERT INTO nav_categories (category_key, label, subcategories, sort_order) \
             VALUES ('broken', 'Broken', 'not json', 0)",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let listed = store.nav_categories().list().await.unwrap();

        assert_eq!(listed.len(), 1);
        assert!(listed[0].subcategories.is_empty());
    }
}
