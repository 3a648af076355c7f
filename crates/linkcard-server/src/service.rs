//! Block access layer.
//!
//! The only code that touches the [`Database`].  Every operation is scoped
//! to an owner resolved by the auth layer; the public page is the single
//! unauthenticated read.  Errors use the [`AccessError`] taxonomy and are
//! turned into status codes at the HTTP boundary.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use linkcard_shared::constants::PASSWORD_MIN_LEN;
use linkcard_shared::credential::{hash_password, verify_password};
use linkcard_shared::profile::{is_valid_username, Profile, ProfilePatch, PublicPage};
use linkcard_shared::{
    normalize, AccessError, Block, BlockId, OwnerId, ReorderItem, UnifiedPatch,
};
use linkcard_store::{Database, StoreError, User};

type Result<T> = std::result::Result<T, AccessError>;

#[derive(Clone)]
pub struct PageService {
    db: Arc<Mutex<Database>>,
}

impl PageService {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    // ------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------

    /// All of `owner`'s blocks in page order.
    pub async fn list(&self, owner: OwnerId) -> Result<Vec<Block>> {
        let db = self.db.lock().await;
        Ok(db.list_blocks(owner)?)
    }

    /// Create a block.  The patch must carry a known `type`.
    pub async fn create(&self, owner: OwnerId, patch: &UnifiedPatch) -> Result<Block> {
        let kind = match patch.type_tag() {
            None => return Err(AccessError::validation("type_required")),
            Some(tag) => tag.map_err(|_| AccessError::validation("type_invalid"))?,
        };
        let update = normalize(kind, patch);

        let db = self.db.lock().await;
        let block = db.insert_block(owner, kind, &update)?;

        info!(owner = %owner, block = %block.id, kind = %kind, "block created");
        Ok(block)
    }

    /// Patch a block.  A `type` in the patch re-types the block; without
    /// one the stored type is kept.
    pub async fn update(&self, id: BlockId, owner: OwnerId, patch: &UnifiedPatch) -> Result<Block> {
        let requested = patch
            .type_tag()
            .transpose()
            .map_err(|_| AccessError::validation("type_invalid"))?;

        let db = self.db.lock().await;
        let existing = db.get_block(id, owner)?;
        let kind = requested.unwrap_or_else(|| existing.kind());
        let update = normalize(kind, patch);
        let block = db.update_block(id, owner, kind, &update)?;

        if kind != existing.kind() {
            info!(owner = %owner, block = %id, from = %existing.kind(), to = %kind, "block re-typed");
        }
        Ok(block)
    }

    /// Delete if owned; otherwise nothing happens.
    pub async fn remove(&self, id: BlockId, owner: OwnerId) -> Result<()> {
        let db = self.db.lock().await;
        let deleted = db.delete_block(id, owner)?;
        debug!(owner = %owner, block = %id, deleted, "block delete requested");
        Ok(())
    }

    /// Apply a batch of sort keys atomically; foreign ids are skipped.
    pub async fn reorder(&self, owner: OwnerId, items: &[ReorderItem]) -> Result<usize> {
        let db = self.db.lock().await;
        Ok(db.reorder_blocks(owner, items)?)
    }

    /// The unauthenticated page for `username` (case-insensitive).
    pub async fn public_view(&self, username: &str) -> Result<PublicPage> {
        let db = self.db.lock().await;
        let profile = db.find_profile_by_username(username.trim())?;
        let blocks = db.list_blocks(profile.owner_id)?;
        Ok(PublicPage::new(profile, blocks))
    }

    // ------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------

    pub async fn profile(&self, owner: OwnerId) -> Result<Profile> {
        let db = self.db.lock().await;
        ensure_profile(&db, owner)
    }

    /// Sparse profile edit, renaming first when a new username is given.
    pub async fn update_profile(&self, owner: OwnerId, patch: &ProfilePatch) -> Result<Profile> {
        let username = match patch.username.as_deref().map(str::trim) {
            Some(name) if !is_valid_username(name) => {
                return Err(AccessError::validation("username_invalid"))
            }
            other => other,
        };

        let db = self.db.lock().await;
        let current = ensure_profile(&db, owner)?;
        let rename = username.filter(|name| *name != current.username);
        Ok(db.edit_profile(owner, rename, patch)?)
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    pub async fn register(&self, username: &str, password: &str) -> Result<User> {
        let username = username.trim();
        if !is_valid_username(username) {
            return Err(AccessError::validation("username_invalid"));
        }
        if password.chars().count() < PASSWORD_MIN_LEN {
            return Err(AccessError::validation("password_too_short"));
        }

        let hash = hash_password(password);
        let db = self.db.lock().await;
        let (user, _profile) = db.create_account(username, &hash)?;
        Ok(user)
    }

    /// Resolve credentials to a user.  Unknown name and wrong password are
    /// the same error.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let db = self.db.lock().await;
        let user = match db.find_user_by_username(username.trim()) {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(AccessError::Unauthorized),
            Err(e) => return Err(e.into()),
        };
        if !verify_password(password, &user.password_hash) {
            debug!(owner = %user.id, "password mismatch");
            return Err(AccessError::Unauthorized);
        }
        Ok(user)
    }

    /// The account behind a verified session.  A token for a vanished
    /// account is treated as unauthenticated.
    pub async fn user(&self, owner: OwnerId) -> Result<User> {
        let db = self.db.lock().await;
        match db.get_user(owner) {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound) => Err(AccessError::Unauthorized),
            Err(e) => Err(e.into()),
        }
    }
}

/// A session whose account has vanished is no longer authenticated.
fn ensure_profile(db: &Database, owner: OwnerId) -> Result<Profile> {
    match db.ensure_profile(owner) {
        Ok(profile) => Ok(profile),
        Err(StoreError::NotFound) => Err(AccessError::Unauthorized),
        Err(e) => Err(e.into()),
    }
}
