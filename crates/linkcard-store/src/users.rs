//! Account records.

use chrono::Utc;
use rusqlite::params;

use linkcard_shared::OwnerId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{parse_timestamp, Profile, User};

impl Database {
    /// Create a user together with its profile, both using `username`.
    ///
    /// Fails with `Conflict("username_taken")` when the name is used by any
    /// login or any public handle.
    pub fn create_account(&self, username: &str, password_hash: &str) -> Result<(User, Profile)> {
        let tx = self.conn().unchecked_transaction()?;

        if self.username_taken(username, None)? {
            return Err(StoreError::Conflict("username_taken"));
        }

        let now = Utc::now();
        tx.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![username, password_hash, now.to_rfc3339()],
        )
        .map_err(|e| StoreError::from_write(e, "username_taken"))?;

        let user = User {
            id: OwnerId(tx.last_insert_rowid()),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
        };
        let profile = self.create_profile(user.id, username)?;

        tx.commit()?;

        tracing::info!(owner = %user.id, username = %username, "account created");
        Ok((user, profile))
    }

    pub fn get_user(&self, id: OwnerId) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, password_hash, created_at FROM users WHERE id = ?1",
                params![id.0],
                row_to_user,
            )
            .map_err(StoreError::from_query)
    }

    /// Case-insensitive login lookup.
    pub fn find_user_by_username(&self, username: &str) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .map_err(StoreError::from_query)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_str: String = row.get(3)?;
    Ok(User {
        id: OwnerId(row.get(0)?),
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: parse_timestamp(3, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::database::test_support::temp_db;
    use crate::StoreError;

    #[test]
    fn test_create_account_and_lookup() {
        let (db, _dir) = temp_db();
        let (user, profile) = db.create_account("Alice", "hash").unwrap();

        assert_eq!(profile.owner_id, user.id);
        assert_eq!(profile.username, "Alice");

        let found = db.find_user_by_username("alice").unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.password_hash, "hash");
        assert_eq!(db.get_user(user.id).unwrap().username, "Alice");
    }

    #[test]
    fn test_duplicate_username_conflicts_case_insensitively() {
        let (db, _dir) = temp_db();
        db.create_account("alice", "h").unwrap();
        let err = db.create_account("ALICE", "h").unwrap_err();
        assert!(matches!(err, StoreError::Conflict("username_taken")));
    }

    #[test]
    fn test_username_held_by_renamed_profile_conflicts() {
        let (db, _dir) = temp_db();
        let (user, _) = db.create_account("alice", "h").unwrap();
        db.rename_profile(user.id, "wonderland").unwrap();

        let err = db.create_account("Wonderland", "h").unwrap_err();
        assert!(matches!(err, StoreError::Conflict("username_taken")));
        // The failed attempt left no half-created user behind.
        assert!(matches!(
            db.find_user_by_username("wonderland"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_unknown_user() {
        let (db, _dir) = temp_db();
        assert!(matches!(
            db.find_user_by_username("nobody"),
            Err(StoreError::NotFound)
        ));
    }
}
