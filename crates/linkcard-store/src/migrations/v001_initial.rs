//! v001 -- Initial schema creation.
//!
//! Creates the account tables: `users` and `profiles`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (credentials)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL COLLATE NOCASE UNIQUE,  -- login name
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL                          -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Profiles (one per user, public handle)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    owner_id       INTEGER PRIMARY KEY NOT NULL,         -- FK -> users(id)
    username       TEXT NOT NULL COLLATE NOCASE UNIQUE,  -- public URL handle
    display_name   TEXT,
    bio            TEXT,
    avatar_url     TEXT,                                 -- opaque media ref
    background_url TEXT,                                 -- opaque media ref
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
