//! Primitive aliases shared across crates.

/// Row identifier (`BIGSERIAL`). Also the user id carried in access tokens.
pub type DbId = i64;

/// Stored and serialized in UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
