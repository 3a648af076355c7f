use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::block::Block;
use crate::constants::{USERNAME_MAX_LEN, USERNAME_MIN_LEN};
use crate::types::OwnerId;

/// A user's page settings.  One per owner.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(skip)]
    pub owner_id: OwnerId,
    /// Public handle, unique case-insensitively.
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    /// Opaque media reference.
    pub avatar_url: Option<String>,
    /// Opaque media reference.
    pub background_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-only view of a page served without authentication.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPage {
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub background_url: Option<String>,
    pub blocks: Vec<Block>,
}

impl PublicPage {
    pub fn new(profile: Profile, blocks: Vec<Block>) -> Self {
        Self {
            username: profile.username,
            display_name: profile.display_name,
            bio: profile.bio,
            avatar_url: profile.avatar_url,
            background_url: profile.background_url,
            blocks,
        }
    }
}

/// Sparse profile edit.  Outer `None` = untouched, `Some(None)` = clear.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub display_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub background_url: Option<Option<String>>,
}

// A key that is present (even as `null`) deserializes to `Some(_)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Usernames: 3..=32 chars of ASCII letters, digits, `_`, `.` or `-`.
pub fn is_valid_username(name: &str) -> bool {
    (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("A.l-i_c3"));
        assert!(!is_valid_username("al"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username("юзер"));
        assert!(!is_valid_username(&"x".repeat(33)));
    }

    #[test]
    fn test_profile_patch_distinguishes_null_from_missing() {
        let patch: ProfilePatch =
            serde_json::from_str(r#"{"bio": null, "displayName": "Ann"}"#).unwrap();
        assert_eq!(patch.bio, Some(None));
        assert_eq!(patch.display_name, Some(Some("Ann".to_string())));
        assert_eq!(patch.avatar_url, None);
        assert_eq!(patch.username, None);
    }
}
