use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{DEFAULT_CLEANUP_INTERVAL, DEFAULT_TABLE_NAME};

/// Store options in a form that can be loaded from a configuration file.
///
/// Field names follow the camelCase keys used by existing deployments
/// (`table`, `concurrentDb`, ...). Missing keys take their defaults.
///
/// ```rust
/// use sqlite_sessions::store::sqlite::SqliteStoreConfig;
///
/// let config: SqliteStoreConfig =
///     serde_json::from_str(r#"{"table": "sessions", "concurrentDb": true}"#).unwrap();
/// assert_eq!(config.table, "sessions");
/// assert!(config.concurrent_db);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SqliteStoreConfig {
    pub table: String,
    pub concurrent_db: bool,
    pub cleanup_interval_ms: u64,
    pub filter_expired: bool,
}

impl SqliteStoreConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE_NAME.to_string(),
            concurrent_db: false,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL.as_millis() as u64,
            filter_expired: false,
        }
    }
}
