//! Domain model structs persisted in the SQLite database.
//!
//! Blocks and profiles are defined in `linkcard-shared` so the server can
//! serialize them directly; they are re-exported here for convenience.

use chrono::{DateTime, Utc};
use serde::Serialize;

use linkcard_shared::OwnerId;

pub use linkcard_shared::profile::{Profile, ProfilePatch};
pub use linkcard_shared::{Block, BlockKind, BlockPayload};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Authentication record.  1:1 with a [`Profile`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: OwnerId,
    /// Login name, unique case-insensitively.
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

pub(crate) fn conversion_error<E>(column: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

pub(crate) fn parse_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}
