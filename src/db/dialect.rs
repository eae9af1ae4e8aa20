//! SQL differences between the embedded (SQLite) and networked (MySQL)
//! backends.
//!
//! Every statement the store issues is assembled from fixed column names and
//! the fragments produced here. Caller input only ever reaches the database
//! as bound parameters.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    MySql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Sqlite => write!(f, "SQLite"),
            Dialect::MySql => write!(f, "MySQL"),
        }
    }
}

impl Dialect {
    /// Positional parameter token for the 1-based `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{}", index),
            Dialect::MySql => "?".to_string(),
        }
    }

    /// `count` comma-separated placeholders starting at `first`.
    pub fn placeholders(&self, first: usize, count: usize) -> String {
        (first..first + count)
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Insert-or-replace keyed on `key`. Columns listed in `preserve` keep
    /// their stored value when the row already exists.
    pub fn upsert_statement(
        &self,
        table: &str,
        columns: &[&str],
        key: &str,
        preserve: &[&str],
    ) -> String {
        let column_list = columns.join(", ");
        let values = self.placeholders(1, columns.len());
        let updated = columns
            .iter()
            .filter(|c| **c != key && !preserve.contains(*c));

        match self {
            Dialect::Sqlite => {
                let assignments = updated
                    .map(|c| format!("{c} = excluded.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "INSERT INTO {table} ({column_list}) VALUES ({values}) \
                     ON CONFLICT({key}) DO UPDATE SET {assignments}"
                )
            }
            Dialect::MySql => {
                let assignments = updated
                    .map(|c| format!("{c} = VALUES({c})"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "INSERT INTO {table} ({column_list}) VALUES ({values}) \
                     ON DUPLICATE KEY UPDATE {assignments}"
                )
            }
        }
    }

    /// MySQL has no `IF NOT EXISTS` for indexes; the duplicate-name error is
    /// filtered out by [`Dialect::is_already_exists`] instead.
    pub fn create_index_if_absent(&self, name: &str, table: &str, column: &str) -> String {
        match self {
            Dialect::Sqlite => format!("CREATE INDEX IF NOT EXISTS {name} ON {table}({column})"),
            Dialect::MySql => format!("CREATE INDEX {name} ON {table}({column})"),
        }
    }

    pub fn greatest(&self, a: &str, b: &str) -> String {
        match self {
            Dialect::Sqlite => format!("MAX({a}, {b})"),
            Dialect::MySql => format!("GREATEST({a}, {b})"),
        }
    }

    pub fn least(&self, a: &str, b: &str) -> String {
        match self {
            Dialect::Sqlite => format!("MIN({a}, {b})"),
            Dialect::MySql => format!("LEAST({a}, {b})"),
        }
    }

    /// Forces an aggregate back to a 64-bit integer column so both backends
    /// decode it the same way (MySQL `SUM` yields DECIMAL otherwise).
    pub fn integer_cast(&self, expr: &str) -> String {
        match self {
            Dialect::Sqlite => format!("CAST({expr} AS INTEGER)"),
            Dialect::MySql => format!("CAST({expr} AS SIGNED)"),
        }
    }

    /// Literal `LIMIT` value meaning "no limit", for offset-only pagination.
    pub fn unbounded_limit(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "-1",
            Dialect::MySql => "18446744073709551615",
        }
    }

    /// Whether `err` only says that a table or index is already there.
    pub fn is_already_exists(&self, err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => is_already_exists_message(db_err.message()),
            _ => false,
        }
    }

    pub fn create_videos_table(&self) -> &'static str {
        match self {
            Dialect::Sqlite => {
                r#"CREATE TABLE IF NOT EXISTS videos (
                    video_id INTEGER PRIMARY KEY,
                    video_url TEXT NOT NULL,
                    video_image TEXT,
                    video_title TEXT NOT NULL,
                    video_category TEXT,
                    play_count INTEGER NOT NULL DEFAULT 0,
                    upload_time TEXT,
                    video_duration TEXT,
                    video_coins INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT,
                    updated_at TEXT
                )"#
            }
            // VARCHAR rather than TEXT: the any-driver decodes MySQL TEXT as a blob.
            Dialect::MySql => {
                r#"CREATE TABLE IF NOT EXISTS videos (
                    video_id BIGINT PRIMARY KEY,
                    video_url VARCHAR(2048) NOT NULL,
                    video_image VARCHAR(2048),
                    video_title VARCHAR(500) NOT NULL,
                    video_category VARCHAR(100),
                    play_count BIGINT NOT NULL DEFAULT 0,
                    upload_time VARCHAR(50),
                    video_duration VARCHAR(50),
                    video_coins BIGINT NOT NULL DEFAULT 0,
                    created_at VARCHAR(32),
                    updated_at VARCHAR(32)
                ) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci"#
            }
        }
    }

    pub fn create_nav_categories_table(&self) -> &'static str {
        match self {
            Dialect::Sqlite => {
                r#"CREATE TABLE IF NOT EXISTS nav_categories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    category_key TEXT UNIQUE NOT NULL,
                    label TEXT NOT NULL,
                    subcategories TEXT,
                    sort_order INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT,
                    updated_at TEXT
                )"#
            }
            Dialect::MySql => {
                r#"CREATE TABLE IF NOT EXISTS nav_categories (
                    id BIGINT AUTO_INCREMENT PRIMARY KEY,
                    category_key VARCHAR(100) NOT NULL UNIQUE,
                    label VARCHAR(255) NOT NULL,
                    subcategories VARCHAR(4096),
                    sort_order BIGINT NOT NULL DEFAULT 0,
                    created_at VARCHAR(32),
                    updated_at VARCHAR(32)
                ) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci"#
            }
        }
    }
}

fn is_already_exists_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("already exists") || message.contains("duplicate key name")
}
