//! The session payload persisted by the stores.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

mod id;
pub use id::Id;

use crate::store::Error;

const DATE_ONLY: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Cookie state the session host attaches to every session.
///
/// Only `maxAge` and `expires` drive the store's expiry logic. Every other member
/// (`originalMaxAge`, `httpOnly`, `path`, ...) is carried through untouched.
///
/// # Example
///
/// ```rust
/// use sqlite_sessions::SessionCookie;
/// use time::macros::datetime;
///
/// let cookie = SessionCookie::build()
///     .max_age(60 * 60 * 1000)
///     .expires(datetime!(2030-01-01 0:00 UTC));
/// ```
///
/// `maxAge` and `expires` are read the way the session host would: any JSON number
/// for `maxAge` (truncated to whole milliseconds), and an RFC 3339 string, a
/// `YYYY-MM-DD` date or epoch milliseconds for `expires`. A value that fits none of
/// these is kept as-is in [`SessionCookie::extra`] and treated as unset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct SessionCookie {
    /// Lifetime of the session in milliseconds.
    pub max_age: Option<i64>,
    /// Absolute expiry, serialized as an RFC 3339 timestamp.
    pub expires: Option<OffsetDateTime>,
    pub extra: Map<String, Value>,
}

impl SessionCookie {
    /// Creates a `SessionCookie` with neither `maxAge` nor `expires` set.
    pub fn build() -> Self {
        Self::default()
    }

    pub fn max_age(mut self, millis: i64) -> Self {
        self.max_age = Some(millis);
        self
    }

    pub fn expires(mut self, expires: OffsetDateTime) -> Self {
        self.expires = Some(expires);
        self
    }

    /// `expires` as epoch milliseconds, if set.
    pub fn expires_millis(&self) -> Option<i64> {
        self.expires.map(unix_millis)
    }
}

/// A session: the host's cookie state plus arbitrary JSON members.
///
/// Serialized as a single JSON object, e.g. `{"cookie":{"maxAge":5000},"user":"a"}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub cookie: SessionCookie,
    #[serde(flatten)]
    data: Map<String, Value>,
}

impl Session {
    pub fn new(cookie: SessionCookie) -> Self {
        Self {
            cookie,
            data: Map::new(),
        }
    }

    /// Deserializes the member stored under `key`.
    ///
    /// Returns `Ok(None)` if the member does not exist.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        self.data
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| Error::Decode(e.to_string()))
            })
            .transpose()
    }

    /// Sets `key` to `value`, returning the previous raw value.
    ///
    /// `cookie` is reserved for [`Session::cookie`] and is rejected.
    pub fn insert<T>(&mut self, key: &str, value: &T) -> Result<Option<Value>, Error>
    where
        T: Serialize + ?Sized,
    {
        if key == "cookie" {
            return Err(Error::Encode(
                "`cookie` is reserved for the session cookie".to_string(),
            ));
        }

        let value = serde_json::to_value(value).map_err(|e| Error::Encode(e.to_string()))?;
        Ok(self.data.insert(key.to_string(), value))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// All members apart from `cookie`.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Map<String, Value>> for SessionCookie {
    fn from(mut extra: Map<String, Value>) -> Self {
        let max_age = take_member(&mut extra, "maxAge", |value| match value {
            Value::Number(n) => number_millis(n),
            _ => None,
        });
        let expires = take_member(&mut extra, "expires", parse_expires);

        Self {
            max_age,
            expires,
            extra,
        }
    }
}

impl From<SessionCookie> for Map<String, Value> {
    fn from(cookie: SessionCookie) -> Self {
        let mut map = cookie.extra;
        if let Some(max_age) = cookie.max_age {
            map.insert("maxAge".to_string(), max_age.into());
        }
        if let Some(expires) = cookie.expires {
            // Years past 9999 have no RFC 3339 form; epoch millis still parse back.
            let value = match expires.format(&Rfc3339) {
                Ok(formatted) => Value::String(formatted),
                Err(_) => unix_millis(expires).into(),
            };
            map.insert("expires".to_string(), value);
        }
        map
    }
}

/// Removes `key` from `map` if `parse` understands it. `null` counts as unset;
/// anything else unparsable stays in the map.
fn take_member<T>(
    map: &mut Map<String, Value>,
    key: &str,
    parse: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    let value = map.get(key)?;
    if value.is_null() {
        map.remove(key);
        return None;
    }

    let parsed = parse(value)?;
    map.remove(key);
    Some(parsed)
}

fn number_millis(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|millis| millis.is_finite())
            .map(|millis| millis.trunc() as i64)
    })
}

fn parse_expires(value: &Value) -> Option<OffsetDateTime> {
    match value {
        Value::String(raw) => OffsetDateTime::parse(raw, &Rfc3339).ok().or_else(|| {
            Date::parse(raw, DATE_ONLY)
                .ok()
                .map(|date| date.midnight().assume_utc())
        }),
        Value::Number(n) => number_millis(n).and_then(|millis| {
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
        }),
        _ => None,
    }
}

pub(crate) fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}
