//! Storage backend adapter.
//!
//! [`Store`] owns a pooled connection to either MySQL or an SQLite file and
//! knows which [`Dialect`] to speak. Every operation borrows one pooled
//! connection for its duration and gives it back on drop, on every exit path.
//! An in-memory SQLite store is pinned to a single connection since each
//! SQLite memory connection is its own database.

pub mod dialect;
pub mod nav_categories;
pub mod videos;

use std::path::Path;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use url::Url;

use crate::config::DatabaseConfig;
use crate::errors::StoreError;

pub use dialect::Dialect;
pub use nav_categories::{NavCategory, NavCategoryStore};
pub use videos::{
    CategoryCount, CollectionStatus, NewVideo, Statistics, VideoRecord, VideoStore, VideoSummary,
};

const SQLITE_MEMORY: &str = ":memory:";

const VIDEO_INDEXES: [(&str, &str); 3] = [
    ("idx_video_category", "video_category"),
    ("idx_video_upload_time", "upload_time"),
    ("idx_video_play_count", "play_count"),
];

#[derive(Debug, Clone)]
pub struct Store {
    pool: AnyPool,
    dialect: Dialect,
    verbose: bool,
}

impl Store {
    /// Connects to the configured backend and makes sure the schema exists.
    ///
    /// A MySQL connection failure is not fatal: it is logged and the store
    /// comes up on the embedded SQLite file instead. Schema failures are.
    #[tracing::instrument(
        name = "Open video store",
        skip(config),
        fields(use_mysql = config.use_mysql)
    )]
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        sqlx::any::install_default_drivers();

        if config.use_mysql {
            match connect_mysql(config).await {
                Ok(pool) => {
                    let store = Store {
                        pool,
                        dialect: Dialect::MySql,
                        verbose: config.verbose,
                    };
                    store.ensure_schema().await?;
                    store.log_lifecycle(&format!(
                        "MySQL database ready: {}@{}:{}",
                        config.mysql.database, config.mysql.host, config.mysql.port
                    ));
                    return Ok(store);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        host = %config.mysql.host,
                        port = config.mysql.port,
                        "MySQL connection failed, falling back to SQLite"
                    );
                }
            }
        }

        let pool = connect_sqlite(&config.sqlite_path).await?;
        let store = Store {
            pool,
            dialect: Dialect::Sqlite,
            verbose: config.verbose,
        };
        store.ensure_schema().await?;
        store.log_lifecycle(&format!("SQLite database ready: {}", config.sqlite_path));
        Ok(store)
    }

    /// Creates tables and indexes. Safe to run on every start: "already
    /// exists" failures are swallowed, anything else is a [`StoreError::Schema`].
    #[tracing::instrument(name = "Ensure schema", skip(self), fields(dialect = %self.dialect))]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut statements = vec![
            self.dialect.create_videos_table().to_string(),
            self.dialect.create_nav_categories_table().to_string(),
        ];
        statements.extend(
            VIDEO_INDEXES
                .iter()
                .map(|(name, column)| self.dialect.create_index_if_absent(name, "videos", column)),
        );

        for statement in &statements {
            match sqlx::query(statement).execute(&self.pool).await {
                Ok(_) => {}
                Err(e) if self.dialect.is_already_exists(&e) => {
                    tracing::debug!("Schema object already present: {}", e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Schema creation failed");
                    return Err(StoreError::Schema(e));
                }
            }
        }

        Ok(())
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn placeholder(&self, index: usize) -> String {
        self.dialect.placeholder(index)
    }

    pub fn videos(&self) -> VideoStore<'_> {
        VideoStore::new(&self.pool, self.dialect)
    }

    pub fn nav_categories(&self) -> NavCategoryStore<'_> {
        NavCategoryStore::new(&self.pool, self.dialect)
    }

    /// Closes every pooled connection. Calling it again is a no-op.
    pub async fn close(&self) {
        if self.pool.is_closed() {
            return;
        }
        self.pool.close().await;
        self.log_lifecycle("Database connection closed");
    }

    fn log_lifecycle(&self, message: &str) {
        if self.verbose {
            tracing::info!("{}", message);
        } else {
            tracing::debug!("{}", message);
        }
    }
}

async fn connect_mysql(config: &DatabaseConfig) -> Result<AnyPool, StoreError> {
    let mysql = &config.mysql;

    let mut url = Url::parse("mysql://localhost")
        .map_err(|e| StoreError::Connection(sqlx::Error::Configuration(Box::new(e))))?;
    url.set_host(Some(&mysql.host))
        .map_err(|e| StoreError::Connection(sqlx::Error::Configuration(Box::new(e))))?;
    let _ = url.set_port(Some(mysql.port));
    let _ = url.set_username(&mysql.user);
    if !mysql.password.is_empty() {
        let _ = url.set_password(Some(&mysql.password));
    }
    url.set_path(&mysql.database);
    url.query_pairs_mut().append_pair("charset", "utf8mb4");

    let options = AnyPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(mysql.connect_timeout);

    match tokio::time::timeout(mysql.connect_timeout, options.connect(url.as_str())).await {
        Ok(Ok(pool)) => Ok(pool),
        Ok(Err(e)) => Err(StoreError::Connection(e)),
        Err(_) => Err(StoreError::Connection(sqlx::Error::PoolTimedOut)),
    }
}

async fn connect_sqlite(path: &str) -> Result<AnyPool, StoreError> {
    if path == SQLITE_MEMORY {
        return AnyPoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::Connection);
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
            tracing::info!("Created database directory: {}", parent.display());
        }
    }

    AnyPoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite://{}?mode=rwc", path))
        .await
        .map_err(StoreError::Connection)
}

/// Server-assigned timestamp stored in `created_at` / `updated_at`.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
pub(crate) async fn memory_store() -> Store {
    Store::open(&DatabaseConfig::sqlite_memory())
        .await
        .expect("in-memory store")
}
