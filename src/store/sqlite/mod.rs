mod config;
pub use config::SqliteStoreConfig;

use crate::session::unix_millis;
use crate::store::{Error, SessionStore, deserialize_session, serialize_session};
use crate::{Id, Session};
use sqlx::SqlitePool;
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

// Re-export Duration
pub use tokio::time::Duration;

pub const DEFAULT_TABLE_NAME: &str = "server_sessions";

/// How often expired sessions are swept when no interval is configured.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_millis(ONE_DAY_MILLIS as u64);

/// Lifetime of a session whose cookie carries no `maxAge`.
const ONE_DAY_MILLIS: i64 = 86_400_000;

type OnConnect = Box<dyn FnOnce() + Send + 'static>;

/// A builder for creating a `SqliteStore`.
///
/// The pool is borrowed from the application: the store never closes it.
pub struct SqliteStoreBuilder {
    pool: SqlitePool,
    table_name: String,
    concurrent_db: bool,
    cleanup_interval: Option<Duration>,
    filter_expired: bool,
    on_connect: Option<OnConnect>,
}

impl fmt::Debug for SqliteStoreBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStoreBuilder")
            .field("table_name", &self.table_name)
            .field("concurrent_db", &self.concurrent_db)
            .field("cleanup_interval", &self.cleanup_interval)
            .field("filter_expired", &self.filter_expired)
            .field("on_connect", &self.on_connect.is_some())
            .finish_non_exhaustive()
    }
}

impl SqliteStoreBuilder {
    /// Creates a new builder with a database pool and default settings.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            concurrent_db: false,
            cleanup_interval: None,
            filter_expired: false,
            on_connect: None,
        }
    }

    /// Creates a builder seeded from a [`SqliteStoreConfig`].
    pub fn from_config(pool: SqlitePool, config: SqliteStoreConfig) -> Self {
        Self::new(pool)
            .table_name(config.table.clone())
            .concurrent_db(config.concurrent_db)
            .cleanup_interval(config.cleanup_interval())
            .filter_expired(config.filter_expired)
    }

    /// Sets a custom table name for the session store. Defaults to "server_sessions".
    ///
    /// `schema.table` addresses a table in an attached schema, e.g. `main.server_sessions`.
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Switches the database to write-ahead-log journaling before the table is created,
    /// so readers are not blocked by a concurrent writer.
    pub fn concurrent_db(mut self, enabled: bool) -> Self {
        self.concurrent_db = enabled;
        self
    }

    /// Sets the interval for the background task that cleans up expired sessions.
    ///
    /// If this is not set (or set to zero), the cleanup task runs once a day.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Makes [`SessionStore::all`] and [`SessionStore::length`] skip expired sessions.
    ///
    /// Off by default: both report every row until the cleanup task removes it.
    pub fn filter_expired(mut self, enabled: bool) -> Self {
        self.filter_expired = enabled;
        self
    }

    /// Registers a callback invoked once the table is ready.
    pub fn on_connect(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_connect = Some(Box::new(callback));
        self
    }

    /// Builds the `SqliteStore`, creating the table if it doesn't exist.
    ///
    /// Expired sessions are swept once before this returns, then on every
    /// cleanup interval until the store is closed or dropped.
    #[tracing::instrument(name = "building sqlite session store", skip(self), fields(table = %self.table_name))]
    pub async fn build(self) -> Result<SqliteStore, sqlx::Error> {
        let table_name = quote_identifier(&self.table_name);
        let journal_mode = if self.concurrent_db {
            "PRAGMA journal_mode = wal; "
        } else {
            ""
        };

        sqlx::raw_sql(&format!(
            r#"
            {journal_mode}create table if not exists {table_name} (
                session_id text primary key,
                expires integer,
                data text
            );
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(|err| {
            tracing::error!(err = %err, "failed to create session table");
            err
        })?;

        tracing::debug!("session store connected");
        if let Some(on_connect) = self.on_connect {
            on_connect();
        }

        sweep(&self.pool, &table_name).await;

        let interval = self
            .cleanup_interval
            .filter(|interval| !interval.is_zero())
            .unwrap_or(DEFAULT_CLEANUP_INTERVAL);
        let shutdown = CancellationToken::new();
        spawn_sweeper(
            self.pool.clone(),
            table_name.clone(),
            interval,
            shutdown.clone(),
        );

        Ok(SqliteStore {
            pool: self.pool,
            table_name,
            filter_expired: self.filter_expired,
            _sweeper: Arc::new(shutdown.clone().drop_guard()),
            shutdown,
        })
    }
}

/// A SQLite-backed session store.
///
/// Each session is one row of `(session_id, expires, data)`, where `expires` is in
/// epoch milliseconds and `data` is the session encoded as JSON.
///
/// Clones share the cleanup task; it stops when [`SqliteStore::close`] is called
/// or the last clone is dropped.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    table_name: String,
    filter_expired: bool,
    shutdown: CancellationToken,
    _sweeper: Arc<DropGuard>,
}

impl SqliteStore {
    /// Shorthand for [`SqliteStoreBuilder::new`].
    pub fn builder(pool: SqlitePool) -> SqliteStoreBuilder {
        SqliteStoreBuilder::new(pool)
    }

    /// The quoted name of the table holding the sessions.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The pool the store runs its queries on.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Stops the background cleanup task.
    ///
    /// The store stays usable; expired sessions are simply no longer swept.
    pub fn close(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::debug!(table = %self.table_name, "stopping session cleanup");
            self.shutdown.cancel();
        }
    }

    /// Whether [`SqliteStore::close`] has stopped the cleanup task.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Deletes every expired session now, returning how many were removed.
    pub async fn cleanup(&self) -> Result<u64, Error> {
        Ok(delete_expired(&self.pool, &self.table_name).await?)
    }
}

impl SessionStore for SqliteStore {
    #[tracing::instrument(name = "getting session from store", skip_all, fields(session_id = %session_id))]
    async fn get(&self, session_id: &Id) -> Result<Option<Session>, Error> {
        let query = format!(
            "select data from {} where session_id = ? and ? <= expires",
            self.table_name
        );

        let data: Option<String> = sqlx::query_scalar(&query)
            .bind(session_id.as_str())
            .bind(now_millis())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| {
                tracing::error!(err = %err, "failed to get session from store");
                Error::from(err)
            })?;

        data.map(|data| deserialize_session(&data))
            .transpose()
            .map_err(|err| {
                tracing::error!(err = %err, "failed to decode stored session");
                err
            })
    }

    #[tracing::instrument(name = "saving session to store", skip_all, fields(session_id = %session_id))]
    async fn set(&self, session_id: &Id, session: &Session) -> Result<(), Error> {
        let expires = expires_at(session, now_millis());
        let data = serialize_session(session).map_err(|err| {
            tracing::error!(err = %err, "failed to encode session");
            err
        })?;

        let query = format!(
            "insert or replace into {} (session_id, expires, data) values (?, ?, ?)",
            self.table_name
        );
        sqlx::query(&query)
            .bind(session_id.as_str())
            .bind(expires)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                tracing::error!(err = %err, "failed to save session to store");
                err
            })?;

        Ok(())
    }

    #[tracing::instrument(name = "deleting session from store", skip_all, fields(session_id = %session_id))]
    async fn destroy(&self, session_id: &Id) -> Result<(), Error> {
        let query = format!("delete from {} where session_id = ?", self.table_name);
        sqlx::query(&query)
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|err| {
                tracing::error!(err = %err, "failed to delete session from store");
                err
            })?;

        Ok(())
    }

    #[tracing::instrument(name = "getting all sessions from store", skip(self))]
    async fn all(&self) -> Result<Vec<Session>, Error> {
        let query = if self.filter_expired {
            format!("select data from {} where ? <= expires", self.table_name)
        } else {
            format!("select data from {}", self.table_name)
        };

        let mut qb = sqlx::query_scalar(&query);
        if self.filter_expired {
            qb = qb.bind(now_millis());
        }

        let rows: Vec<String> = qb.fetch_all(&self.pool).await.map_err(|err| {
            tracing::error!(err = %err, "failed to get sessions from store");
            err
        })?;

        rows.iter()
            .map(|data| deserialize_session(data))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                tracing::error!(err = %err, "failed to decode stored session");
                err
            })
    }

    #[tracing::instrument(name = "counting sessions in store", skip(self))]
    async fn length(&self) -> Result<u64, Error> {
        let query = if self.filter_expired {
            format!("select count(*) from {} where ? <= expires", self.table_name)
        } else {
            format!("select count(*) from {}", self.table_name)
        };

        let mut qb = sqlx::query_scalar(&query);
        if self.filter_expired {
            qb = qb.bind(now_millis());
        }

        let count: i64 = qb.fetch_one(&self.pool).await.map_err(|err| {
            tracing::error!(err = %err, "failed to count sessions in store");
            err
        })?;

        Ok(count.max(0) as u64)
    }

    #[tracing::instrument(name = "clearing session store", skip(self))]
    async fn clear(&self) -> Result<(), Error> {
        let query = format!("delete from {}", self.table_name);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                tracing::error!(err = %err, "failed to clear session store");
                err
            })?;

        Ok(())
    }

    #[tracing::instrument(name = "touching session in store", skip_all, fields(session_id = %session_id))]
    async fn touch(&self, session_id: &Id, session: Option<&Session>) -> Result<bool, Error> {
        let Some(expires) = session.and_then(|session| session.cookie.expires_millis()) else {
            tracing::debug!("session has no cookie expiry, nothing to touch");
            return Ok(true);
        };

        // The liveness guard is checked against the stored expiry, not the new one.
        let query = format!(
            "update {} set expires = ? where session_id = ? and ? <= expires",
            self.table_name
        );
        sqlx::query(&query)
            .bind(expires)
            .bind(session_id.as_str())
            .bind(now_millis())
            .execute(&self.pool)
            .await
            .map_err(|err| {
                tracing::error!(err = %err, "failed to touch session in store");
                err
            })?;

        Ok(true)
    }
}

fn spawn_sweeper(
    pool: SqlitePool,
    table_name: String,
    interval: Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => sweep(&pool, &table_name).await,
                _ = shutdown.cancelled() => break,
            }
        }

        tracing::debug!(table = %table_name, "session cleanup stopped");
    });
}

/// Deletes expired sessions. Failures are logged and dropped so the
/// cleanup schedule keeps running.
async fn sweep(pool: &SqlitePool, table_name: &str) {
    match delete_expired(pool, table_name).await {
        Ok(removed) => {
            tracing::debug!(table = %table_name, removed, "swept expired sessions")
        }
        Err(err) => {
            tracing::warn!(table = %table_name, err = %err, "failed to sweep expired sessions")
        }
    }
}

async fn delete_expired(pool: &SqlitePool, table_name: &str) -> Result<u64, sqlx::Error> {
    let query = format!("delete from {table_name} where ? > expires");
    let result = sqlx::query(&query).bind(now_millis()).execute(pool).await?;
    Ok(result.rows_affected())
}

fn expires_at(session: &Session, now: i64) -> i64 {
    match session.cookie.max_age {
        Some(max_age) if max_age != 0 => now.saturating_add(max_age),
        _ => now.saturating_add(ONE_DAY_MILLIS),
    }
}

/// Quotes each `.`-separated part, so `main.sessions` names table `sessions` in
/// schema `main`.
fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

fn now_millis() -> i64 {
    unix_millis(OffsetDateTime::now_utc())
}
