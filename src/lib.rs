//! # sqlite-sessions: a SQLite session store
//!
//! `sqlite-sessions` persists web sessions in a single SQLite table and exposes them
//! through the [`SessionStore`](store::SessionStore) trait that session middleware
//! calls into (`get`, `set`, `destroy`, `all`, `length`, `clear`, `touch`).
//!
//! Every session is stored as one row:
//!
//! | column | type | notes |
//! |---|---|---|
//! | `session_id` | text | primary key |
//! | `expires` | integer | epoch milliseconds |
//! | `data` | text | the session as JSON |
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sqlite_sessions::store::SessionStore;
//! use sqlite_sessions::store::sqlite::SqliteStoreBuilder;
//! use sqlite_sessions::{Id, Session, SessionCookie};
//! use sqlx::SqlitePool;
//!
//! #[tokio::main]
//! async fn main() {
//!     // 1. Set up your database connection pool. The store only borrows it.
//!     let pool = SqlitePool::connect("sqlite://sessions.db?mode=rwc").await.unwrap();
//!
//!     // 2. Create the session store. This creates the `server_sessions`
//!     // table if needed and starts the daily cleanup of expired sessions.
//!     let store = SqliteStoreBuilder::new(pool)
//!         // Optionally, customize the table name or enable WAL journaling
//!         // .table_name("user_sessions")
//!         // .concurrent_db(true)
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     // 3. Save and load sessions.
//!     let id = Id::default();
//!     let mut session = Session::new(SessionCookie::build().max_age(60 * 60 * 1000));
//!     session.insert("user", &"jane").unwrap();
//!
//!     store.set(&id, &session).await.unwrap();
//!     let loaded = store.get(&id).await.unwrap();
//!     assert_eq!(loaded, Some(session));
//!
//!     // 4. Stop the cleanup task on shutdown.
//!     store.close();
//! }
//! ```
//!
//! # Expiry
//!
//! - `set` stores `now + cookie.maxAge`, or `now + 1 day` when the cookie has no
//!   (or a zero) `maxAge`.
//! - `touch` moves the expiry of a live session to `cookie.expires`.
//! - `get` ignores expired rows. `all` and `length` count every row unless the
//!   store was built with
//!   [`filter_expired(true)`](store::sqlite::SqliteStoreBuilder::filter_expired).
//! - Expired rows are deleted when the store is built and then once per cleanup
//!   interval (one day by default).
//!
//! # Concurrent access
//!
//! [`concurrent_db(true)`](store::sqlite::SqliteStoreBuilder::concurrent_db) switches
//! the database to write-ahead-log journaling so readers are not blocked by writers.
//! Concurrent `set` calls for one id resolve last-write-wins; a session id never
//! maps to more than one row.
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use sqlite_sessions::store::sqlite::{SqliteStoreBuilder, SqliteStoreConfig};
//! use sqlx::SqlitePool;
//!
//! # async fn run(pool: SqlitePool) {
//! let config: SqliteStoreConfig =
//!     serde_json::from_str(r#"{"table": "sessions", "concurrentDb": true}"#).unwrap();
//! let store = SqliteStoreBuilder::from_config(pool, config)
//!     .on_connect(|| println!("session store ready"))
//!     .build()
//!     .await
//!     .unwrap();
//! # }
//! ```

pub use serde_json;
pub use sqlx;

mod session;
pub use session::*;

pub mod store;
