use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier of a shortened URL, as minted by a generator.
///
/// Short IDs are opaque to the store: any non-empty string is accepted so
/// that identifiers read back from a journal or a database never fail to
/// parse.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortId(String);

impl ShortId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the short ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the public short URL for this ID under `base_url`.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }
}

impl Display for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ShortId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ShortId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Opaque identity of whoever submitted a URL.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted URL mapping. Records are created once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub short_id: ShortId,
    /// The URL exactly as it was submitted.
    pub original_url: String,
    pub owner_id: OwnerId,
    pub created_at: Timestamp,
}

impl UrlRecord {
    /// Creates a record stamped with the current time.
    pub fn new(short_id: ShortId, original_url: impl Into<String>, owner_id: OwnerId) -> Self {
        Self {
            short_id,
            original_url: original_url.into(),
            owner_id,
            created_at: Timestamp::now(),
        }
    }
}
