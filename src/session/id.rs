use base64::Engine;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// A session identifier.
///
/// Identifiers are opaque to the store: whatever string the session host issued
/// (usually the value of a signed cookie) is stored as the primary key verbatim.
/// [`Id::default`] generates a fresh random one for hosts that want it.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// Generates a random 128-bit identifier, encoded as 22 URL-safe base64 chars.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        // The OS RNG only fails when the platform has no entropy source at all.
        if OsRng.try_fill_bytes(&mut bytes).is_err() {
            rand::fill(&mut bytes);
        }
        Self(BASE64_URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::generate()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Id {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}
