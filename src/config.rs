//! Process configuration, resolved once at startup from the environment.
//!
//! Nothing here is read lazily: `main` builds a [`Settings`] and hands the
//! pieces to the store, the collector and the HTTP server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5000";
pub const DEFAULT_COLLECTOR_URL: &str = "https://api.sq03.shop/api.php/provide/vod/";
pub const DOCKER_DATA_DIR: &str = "/app/data";
pub const LOCAL_SQLITE_PATH: &str = "data/videos.db";

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_address: String,
    pub database: DatabaseConfig,
    pub collector: CollectorConfig,
    /// Text dump imported once at startup, if set.
    pub seed_dump_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub use_mysql: bool,
    pub mysql: MySqlConfig,
    pub sqlite_path: String,
    /// Lifecycle messages go out at `info` when set, `debug` otherwise.
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub page_delay: Duration,
    pub host_rewrites: Vec<HostRewrite>,
}

/// A plain substring substitution applied to collected play URLs.
///
/// The list comes from `COLLECTOR_HOST_REWRITES` only. When it is unset the
/// list is empty and play URLs are stored exactly as the feed sends them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRewrite {
    pub from: String,
    pub to: String,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: "videos".to_string(),
            user: "root".to_string(),
            password: String::new(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl DatabaseConfig {
    /// Embedded-only configuration, mostly useful for tests and tooling.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            use_mysql: false,
            mysql: MySqlConfig::default(),
            sqlite_path: path.into(),
            verbose: false,
        }
    }

    pub fn sqlite_memory() -> Self {
        Self::sqlite(":memory:")
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COLLECTOR_URL.to_string(),
            timeout: Duration::from_secs(30),
            page_delay: Duration::from_millis(1000),
            host_rewrites: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_var_string, |path| path.is_dir())
    }

    /// Builds settings from an arbitrary key lookup. `dir_exists` decides
    /// whether the Docker data directory is present.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        dir_exists: impl Fn(&Path) -> bool,
    ) -> Result<Self> {
        let mysql_defaults = MySqlConfig::default();

        let mysql = MySqlConfig {
            host: lookup("MYSQL_HOST").unwrap_or(mysql_defaults.host),
            port: parse_or("MYSQL_PORT", &lookup, mysql_defaults.port)?,
            database: lookup("MYSQL_DATABASE").unwrap_or(mysql_defaults.database),
            user: lookup("MYSQL_USER").unwrap_or(mysql_defaults.user),
            password: lookup("MYSQL_PASSWORD").unwrap_or_default(),
            connect_timeout: Duration::from_secs(parse_or(
                "MYSQL_CONNECT_TIMEOUT_SECS",
                &lookup,
                mysql_defaults.connect_timeout.as_secs(),
            )?),
        };

        let database = DatabaseConfig {
            use_mysql: parse_flag("USE_MYSQL", &lookup, true),
            mysql,
            sqlite_path: default_sqlite_path(&lookup, &dir_exists)
                .to_string_lossy()
                .into_owned(),
            verbose: parse_flag("DB_VERBOSE", &lookup, true),
        };

        let collector_defaults = CollectorConfig::default();
        let collector = CollectorConfig {
            base_url: lookup("COLLECTOR_API_URL").unwrap_or(collector_defaults.base_url),
            timeout: Duration::from_secs(parse_or(
                "COLLECTOR_TIMEOUT_SECS",
                &lookup,
                collector_defaults.timeout.as_secs(),
            )?),
            page_delay: Duration::from_millis(parse_or(
                "COLLECTOR_DELAY_MS",
                &lookup,
                collector_defaults.page_delay.as_millis() as u64,
            )?),
            host_rewrites: match lookup("COLLECTOR_HOST_REWRITES") {
                Some(raw) => parse_host_rewrites(&raw)?,
                None => Vec::new(),
            },
        };

        Ok(Self {
            bind_address: lookup("BIND_ADDRESS")
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            database,
            collector,
            seed_dump_path: lookup("SEED_DUMP_PATH").map(PathBuf::from),
        })
    }
}

/// `SQLITE_DB_PATH` wins when set, then the Docker volume when its directory
/// exists, then a path relative to the working directory.
fn default_sqlite_path(
    lookup: &impl Fn(&str) -> Option<String>,
    dir_exists: &impl Fn(&Path) -> bool,
) -> PathBuf {
    if let Some(path) = lookup("SQLITE_DB_PATH") {
        return PathBuf::from(path);
    }
    let docker_dir = Path::new(DOCKER_DATA_DIR);
    if dir_exists(docker_dir) {
        return docker_dir.join("videos.db");
    }
    PathBuf::from(LOCAL_SQLITE_PATH)
}

/// Parses `old=new,old2=new2`.
pub fn parse_host_rewrites(raw: &str) -> Result<Vec<HostRewrite>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (from, to) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid host rewrite '{}', expected old=new", pair))?;
            let from = from.trim();
            if from.is_empty() {
                return Err(anyhow!("Invalid host rewrite '{}', empty source host", pair));
            }
            Ok(HostRewrite {
                from: from.to_string(),
                to: to.trim().to_string(),
            })
        })
        .collect()
}

fn parse_flag(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: bool) -> bool {
    match lookup(key) {
        Some(value) => matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        None => default,
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value '{}'", key, value)),
        None => Ok(default),
    }
}

fn env_var_string(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_any_variables() {
        let settings = Settings::from_lookup(lookup_from(&[]), |_| false).unwrap();

        assert!(settings.database.use_mysql);
        assert_eq!(settings.database.mysql.host, "localhost");
        assert_eq!(settings.database.mysql.port, 3306);
        assert_eq!(settings.database.mysql.database, "videos");
        assert_eq!(settings.database.sqlite_path, LOCAL_SQLITE_PATH);
        assert_eq!(settings.bind_address, DEFAULT_BIND_ADDRESS);
        assert!(settings.collector.host_rewrites.is_empty());
        assert!(settings.seed_dump_path.is_none());
    }

    #[test]
    fn docker_directory_is_preferred_when_present() {
        let settings =
            Settings::from_lookup(lookup_from(&[]), |p| p == Path::new(DOCKER_DATA_DIR)).unwrap();

        assert_eq!(settings.database.sqlite_path, "/app/data/videos.db");
    }

    #[test]
    fn explicit_sqlite_path_beats_docker_directory() {
        let settings = Settings::from_lookup(
            lookup_from(&[("SQLITE_DB_PATH", "/tmp/catalog.db")]),
            |_| true,
        )
        .unwrap();

        assert_eq!(settings.database.sqlite_path, "/tmp/catalog.db");
    }

    #[test]
    fn mysql_flag_and_parameters_are_read() {
        let settings = Settings::from_lookup(
            lookup_from(&[
                ("USE_MYSQL", "false"),
                ("MYSQL_HOST", "db.internal"),
                ("MYSQL_PORT", "3307"),
                ("MYSQL_PASSWORD", "p@ss"),
            ]),
            |_| false,
        )
        .unwrap();

        assert!(!settings.database.use_mysql);
        assert_eq!(settings.database.mysql.host, "db.internal");
        assert_eq!(settings.database.mysql.port, 3307);
        assert_eq!(settings.database.mysql.password, "p@ss");
    }

    #[test]
    fn invalid_port_is_an_error() {
        let result = Settings::from_lookup(lookup_from(&[("MYSQL_PORT", "not-a-port")]), |_| false);

        assert!(result.is_err());
    }

    #[test]
    fn host_rewrites_parse_in_order() {
        let rewrites = parse_host_rewrites("old.cdn.com=new.cdn.com, a.example=b.example").unwrap();

        assert_eq!(
            rewrites,
            vec![
                HostRewrite { from: "old.cdn.com".into(), to: "new.cdn.com".into() },
                HostRewrite { from: "a.example".into(), to: "b.example".into() },
            ]
        );
        assert!(parse_host_rewrites("missing-separator").is_err());
    }
}
