#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use sqlite_sessions::store::sqlite::{SqliteStore, SqliteStoreBuilder};
use sqlite_sessions::{Session, SessionCookie};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub(crate) struct TestUser {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub(crate) struct TestPreferences {
    pub theme: String,
    pub language: String,
}

pub(crate) fn create_test_user() -> TestUser {
    TestUser {
        id: 1,
        name: "Test User".to_string(),
    }
}

pub(crate) fn create_test_session(max_age: Option<i64>) -> Session {
    let cookie = match max_age {
        Some(max_age) => SessionCookie::build().max_age(max_age),
        None => SessionCookie::build(),
    };

    let mut session = Session::new(cookie);
    session.insert("user", &create_test_user()).unwrap();
    session
        .insert(
            "preferences",
            &TestPreferences {
                theme: "dark".to_string(),
                language: "en".to_string(),
            },
        )
        .unwrap();
    session
}

/// Prints store logs when a test runs with `RUST_LOG` set, e.g. `RUST_LOG=sqlite_sessions=debug`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A private in-memory database. A single, never-recycled connection keeps
/// the database alive for the whole test.
pub(crate) async fn memory_pool() -> SqlitePool {
    init_tracing();
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

pub(crate) async fn setup_store() -> (SqliteStore, SqlitePool) {
    let pool = memory_pool().await;
    let store = SqliteStoreBuilder::new(pool.clone()).build().await.unwrap();
    (store, pool)
}

/// Reads the raw `expires` column for a session.
pub(crate) async fn stored_expiry(pool: &SqlitePool, table: &str, session_id: &str) -> Option<i64> {
    sqlx::query_scalar(&format!(
        "select expires from {table} where session_id = ?"
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await
    .unwrap()
}

/// Moves the stored clock of every session back by `millis`, as if that much
/// time had passed.
pub(crate) async fn advance_time(pool: &SqlitePool, table: &str, millis: i64) {
    sqlx::query(&format!("update {table} set expires = expires - ?"))
        .bind(millis)
        .execute(pool)
        .await
        .unwrap();
}

pub(crate) fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
