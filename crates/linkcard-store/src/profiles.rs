//! Profile records and the lazy "ensure profile exists" step.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use linkcard_shared::OwnerId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{parse_timestamp, Profile, ProfilePatch};

/// Upper bound on fallback-username suffixes tried before giving up.
const MAX_FALLBACK_ATTEMPTS: u32 = 1000;

const PROFILE_COLUMNS: &str = "owner_id, username, display_name, bio, avatar_url, \
                               background_url, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert an empty profile for `owner` with the given handle.
    pub fn create_profile(&self, owner: OwnerId, username: &str) -> Result<Profile> {
        let now = Utc::now();
        self.conn()
            .execute(
                "INSERT INTO profiles (owner_id, username, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![owner.0, username, now.to_rfc3339()],
            )
            .map_err(|e| StoreError::from_write(e, "username_taken"))?;

        Ok(Profile {
            owner_id: owner,
            username: username.to_string(),
            display_name: None,
            bio: None,
            avatar_url: None,
            background_url: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Return the owner's profile, fabricating one if it is missing.
    ///
    /// The fabricated handle is `user{owner}`, then `user{owner}_2`,
    /// `user{owner}_3`, ... until a free one is found.  Idempotent.
    /// `NotFound` when the owner has no account row.
    pub fn ensure_profile(&self, owner: OwnerId) -> Result<Profile> {
        match self.get_profile(owner) {
            Err(StoreError::NotFound) => {}
            other => return other,
        }
        self.get_user(owner)?;

        let base = owner.fallback_username();
        for attempt in 1..=MAX_FALLBACK_ATTEMPTS {
            let candidate = if attempt == 1 {
                base.clone()
            } else {
                format!("{base}_{attempt}")
            };
            if self.username_taken(&candidate, Some(owner))? {
                continue;
            }
            let profile = self.create_profile(owner, &candidate)?;
            tracing::warn!(owner = %owner, username = %candidate, "profile was missing, created fallback");
            return Ok(profile);
        }

        Err(StoreError::Conflict("username_taken"))
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_profile(&self, owner: OwnerId) -> Result<Profile> {
        self.conn()
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE owner_id = ?1"),
                params![owner.0],
                row_to_profile,
            )
            .map_err(StoreError::from_query)
    }

    /// Case-insensitive lookup by public handle.
    pub fn find_profile_by_username(&self, username: &str) -> Result<Profile> {
        self.conn()
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE username = ?1"),
                params![username],
                row_to_profile,
            )
            .map_err(StoreError::from_query)
    }

    /// Whether `username` is used as a login or public handle by anyone
    /// other than `except`.
    pub fn username_taken(&self, username: &str, except: Option<OwnerId>) -> Result<bool> {
        let except = except.map(|o| o.0).unwrap_or(-1);
        let hit: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM profiles WHERE username = ?1 AND owner_id <> ?2
                 UNION ALL
                 SELECT 1 FROM users WHERE username = ?1 AND id <> ?2
                 LIMIT 1",
                params![username, except],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hit.is_some())
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply a sparse edit of the descriptive fields.  `patch.username` is
    /// ignored here; use [`Database::rename_profile`].
    pub fn update_profile(&self, owner: OwnerId, patch: &ProfilePatch) -> Result<Profile> {
        let affected = self.conn().execute(
            "UPDATE profiles SET
                 display_name   = CASE WHEN ?2 THEN ?3 ELSE display_name END,
                 bio            = CASE WHEN ?4 THEN ?5 ELSE bio END,
                 avatar_url     = CASE WHEN ?6 THEN ?7 ELSE avatar_url END,
                 background_url = CASE WHEN ?8 THEN ?9 ELSE background_url END,
                 updated_at     = ?10
             WHERE owner_id = ?1",
            params![
                owner.0,
                patch.display_name.is_some(),
                patch.display_name.as_ref().and_then(Option::as_ref),
                patch.bio.is_some(),
                patch.bio.as_ref().and_then(Option::as_ref),
                patch.avatar_url.is_some(),
                patch.avatar_url.as_ref().and_then(Option::as_ref),
                patch.background_url.is_some(),
                patch.background_url.as_ref().and_then(Option::as_ref),
                Utc::now().to_rfc3339(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_profile(owner)
    }

    /// Rename (when `username` is given) and apply `patch` as one unit.
    pub fn edit_profile(
        &self,
        owner: OwnerId,
        username: Option<&str>,
        patch: &ProfilePatch,
    ) -> Result<Profile> {
        let tx = self.conn().unchecked_transaction()?;
        if let Some(name) = username {
            self.rename_profile(owner, name)?;
        }
        let profile = self.update_profile(owner, patch)?;
        tx.commit()?;
        Ok(profile)
    }

    /// Change the public handle.  Fails with `Conflict("username_taken")`
    /// when another owner already uses it.
    pub fn rename_profile(&self, owner: OwnerId, username: &str) -> Result<Profile> {
        if self.username_taken(username, Some(owner))? {
            return Err(StoreError::Conflict("username_taken"));
        }
        let affected = self
            .conn()
            .execute(
                "UPDATE profiles SET username = ?2, updated_at = ?3 WHERE owner_id = ?1",
                params![owner.0, username, Utc::now().to_rfc3339()],
            )
            .map_err(|e| StoreError::from_write(e, "username_taken"))?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        tracing::info!(owner = %owner, username = %username, "profile renamed");
        self.get_profile(owner)
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;
    Ok(Profile {
        owner_id: OwnerId(row.get(0)?),
        username: row.get(1)?,
        display_name: row.get(2)?,
        bio: row.get(3)?,
        avatar_url: row.get(4)?,
        background_url: row.get(5)?,
        created_at: parse_timestamp(6, &created_str)?,
        updated_at: parse_timestamp(7, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rusqlite::params;

    use linkcard_shared::OwnerId;

    use crate::database::test_support::temp_db;
    use crate::database::Database;
    use crate::models::ProfilePatch;
    use crate::StoreError;

    /// A user row with no profile, as left behind by older data.
    fn bare_user(db: &Database, username: &str) -> OwnerId {
        db.conn()
            .execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, 'h', ?2)",
                params![username, Utc::now().to_rfc3339()],
            )
            .unwrap();
        OwnerId(db.conn().last_insert_rowid())
    }

    #[test]
    fn test_ensure_profile_fabricates_fallback() {
        let (db, _dir) = temp_db();
        let owner = bare_user(&db, "ghost");

        let profile = db.ensure_profile(owner).unwrap();
        assert_eq!(profile.username, format!("user{}", owner.0));

        // Second call returns the same record.
        let again = db.ensure_profile(owner).unwrap();
        assert_eq!(again, profile);
    }

    #[test]
    fn test_ensure_profile_skips_taken_fallback() {
        let (db, _dir) = temp_db();
        let owner = bare_user(&db, "ghost");
        let (other, _) = db.create_account("squatter", "h").unwrap();
        db.rename_profile(other.id, &owner.fallback_username()).unwrap();

        let profile = db.ensure_profile(owner).unwrap();
        assert_eq!(profile.username, format!("user{}_2", owner.0));
    }

    #[test]
    fn test_find_profile_is_case_insensitive() {
        let (db, _dir) = temp_db();
        let (user, _) = db.create_account("MixedCase", "h").unwrap();
        let found = db.find_profile_by_username("mixedcase").unwrap();
        assert_eq!(found.owner_id, user.id);
        assert_eq!(found.username, "MixedCase");
    }

    #[test]
    fn test_update_profile_is_sparse() {
        let (db, _dir) = temp_db();
        let (user, _) = db.create_account("ann", "h").unwrap();

        let first = ProfilePatch {
            display_name: Some(Some("Ann".into())),
            bio: Some(Some("hello".into())),
            ..Default::default()
        };
        db.update_profile(user.id, &first).unwrap();

        let second = ProfilePatch {
            bio: Some(None),
            avatar_url: Some(Some("/uploads/a".into())),
            ..Default::default()
        };
        let profile = db.update_profile(user.id, &second).unwrap();

        assert_eq!(profile.display_name.as_deref(), Some("Ann"));
        assert_eq!(profile.bio, None);
        assert_eq!(profile.avatar_url.as_deref(), Some("/uploads/a"));
        assert_eq!(profile.background_url, None);
    }

    #[test]
    fn test_rename_conflict() {
        let (db, _dir) = temp_db();
        let (a, _) = db.create_account("first", "h").unwrap();
        db.create_account("second", "h").unwrap();

        let err = db.rename_profile(a.id, "SECOND").unwrap_err();
        assert!(matches!(err, StoreError::Conflict("username_taken")));

        // Renaming to a different case of one's own name is fine.
        let profile = db.rename_profile(a.id, "First").unwrap();
        assert_eq!(profile.username, "First");
    }

    #[test]
    fn test_ensure_profile_without_account() {
        let (db, _dir) = temp_db();
        assert!(matches!(db.ensure_profile(OwnerId(77)), Err(StoreError::NotFound)));
        assert!(matches!(db.get_profile(OwnerId(77)), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_edit_profile_rolls_back_rename() {
        let (db, _dir) = temp_db();
        let (user, _) = db.create_account("keeper", "h").unwrap();
        db.conn()
            .execute_batch(
                "CREATE TRIGGER reject_bio BEFORE UPDATE OF bio ON profiles
                 WHEN NEW.bio = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'boom'); END;",
            )
            .unwrap();

        let patch = ProfilePatch {
            bio: Some(Some("boom".into())),
            ..Default::default()
        };
        assert!(db.edit_profile(user.id, Some("renamed"), &patch).is_err());
        assert_eq!(db.get_profile(user.id).unwrap().username, "keeper");

        let patch = ProfilePatch {
            bio: Some(Some("fine".into())),
            ..Default::default()
        };
        let profile = db.edit_profile(user.id, Some("renamed"), &patch).unwrap();
        assert_eq!(profile.username, "renamed");
        assert_eq!(profile.bio.as_deref(), Some("fine"));
    }

    #[test]
    fn test_missing_profile_lookups() {
        let (db, _dir) = temp_db();
        assert!(matches!(db.get_profile(OwnerId(99)), Err(StoreError::NotFound)));
        assert!(matches!(
            db.find_profile_by_username("nobody"),
            Err(StoreError::NotFound)
        ));
    }
}
