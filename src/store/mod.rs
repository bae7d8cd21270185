use std::future::Future;

use crate::{Id, Session};

pub mod sqlite;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Encoding failed with: {0}")]
    Encode(String),

    #[error("Decoding failed with: {0}")]
    Decode(String),

    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

pub(crate) fn serialize_session(session: &Session) -> Result<String, Error> {
    serde_json::to_string(session).map_err(|e| Error::Encode(e.to_string()))
}

pub(crate) fn deserialize_session(data: &str) -> Result<Session, Error> {
    serde_json::from_str(data).map_err(|e| Error::Decode(e.to_string()))
}

/// The contract a session host relies on to persist sessions.
///
/// Not-found is never an error: `get` resolves to `None`, `destroy` and `touch`
/// succeed on missing ids.
pub trait SessionStore: Clone + Send + Sync + 'static {
    /// Gets the session stored at `session_id`, if it exists and has not expired.
    fn get(&self, session_id: &Id) -> impl Future<Output = Result<Option<Session>, Error>> + Send;

    /// Creates or replaces the session stored at `session_id`.
    ///
    /// The expiry is derived from `session.cookie.max_age`, falling back to one day.
    fn set(
        &self,
        session_id: &Id,
        session: &Session,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Deletes the session stored at `session_id`, expired or not.
    fn destroy(&self, session_id: &Id) -> impl Future<Output = Result<(), Error>> + Send;

    /// Gets every stored session.
    fn all(&self) -> impl Future<Output = Result<Vec<Session>, Error>> + Send;

    /// Counts the stored sessions.
    fn length(&self) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Deletes every stored session.
    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Moves the expiry of a live session to `session.cookie.expires`.
    ///
    /// A `None` session or one without `cookie.expires` is a no-op. Returns `true`
    /// whenever no error occurred.
    fn touch(
        &self,
        session_id: &Id,
        session: Option<&Session>,
    ) -> impl Future<Output = Result<bool, Error>> + Send;
}
