//! Unified block codec.
//!
//! Create and update requests share one loosely-typed body shape, the
//! [`UnifiedPatch`].  [`normalize`] interprets it for a given block type and
//! produces a sparse [`FieldUpdate`]: fields the patch did not mention stay
//! untouched, except that every field belonging to another type is always
//! cleared.  The codec never fails; malformed values degrade to `null`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::block::{BlockFields, BlockKind, FieldName, SocialKind, UnknownKind};

// ---------------------------------------------------------------------------
// Inbound patch
// ---------------------------------------------------------------------------

/// Type-tagged request body used by both create and update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnifiedPatch(Map<String, Value>);

impl UnifiedPatch {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `type` tag, if one was supplied.  `null` counts as absent.
    pub fn type_tag(&self) -> Option<Result<BlockKind, UnknownKind>> {
        match self.0.get("type")? {
            Value::Null => None,
            Value::String(s) => Some(s.parse()),
            other => Some(Err(UnknownKind(other.to_string()))),
        }
    }

    /// Last present key wins, so aliases are listed generic first.
    fn string_entry(&self, keys: &[&str]) -> Option<Option<String>> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .last()
            .map(string_value)
    }
}

impl From<Map<String, Value>> for UnifiedPatch {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ---------------------------------------------------------------------------
// Sparse update record
// ---------------------------------------------------------------------------

/// Sparse field-update record.
///
/// Outer `None` = leave the column untouched, `Some(None)` = set it to
/// `NULL`, `Some(Some(v))` = set it to `v`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    pub text: Option<Option<String>>,
    pub link_url: Option<Option<String>>,
    pub photo_url: Option<Option<String>>,
    pub video_url: Option<Option<String>>,
    pub music_embed: Option<Option<String>>,
    pub map_lat: Option<Option<f64>>,
    pub map_lng: Option<Option<f64>>,
    pub social_kind: Option<Option<SocialKind>>,
    pub social_url: Option<Option<String>>,
    pub sort: Option<i64>,
}

impl FieldUpdate {
    pub fn touches(&self, field: FieldName) -> bool {
        match field {
            FieldName::Text => self.text.is_some(),
            FieldName::LinkUrl => self.link_url.is_some(),
            FieldName::PhotoUrl => self.photo_url.is_some(),
            FieldName::VideoUrl => self.video_url.is_some(),
            FieldName::MusicEmbed => self.music_embed.is_some(),
            FieldName::MapLat => self.map_lat.is_some(),
            FieldName::MapLng => self.map_lng.is_some(),
            FieldName::SocialKind => self.social_kind.is_some(),
            FieldName::SocialUrl => self.social_url.is_some(),
        }
    }

    /// True when the update explicitly writes `NULL` into `field`.
    pub fn clears(&self, field: FieldName) -> bool {
        match field {
            FieldName::Text => matches!(self.text, Some(None)),
            FieldName::LinkUrl => matches!(self.link_url, Some(None)),
            FieldName::PhotoUrl => matches!(self.photo_url, Some(None)),
            FieldName::VideoUrl => matches!(self.video_url, Some(None)),
            FieldName::MusicEmbed => matches!(self.music_embed, Some(None)),
            FieldName::MapLat => matches!(self.map_lat, Some(None)),
            FieldName::MapLng => matches!(self.map_lng, Some(None)),
            FieldName::SocialKind => matches!(self.social_kind, Some(None)),
            FieldName::SocialUrl => matches!(self.social_url, Some(None)),
        }
    }

    pub fn clear(&mut self, field: FieldName) {
        match field {
            FieldName::Text => self.text = Some(None),
            FieldName::LinkUrl => self.link_url = Some(None),
            FieldName::PhotoUrl => self.photo_url = Some(None),
            FieldName::VideoUrl => self.video_url = Some(None),
            FieldName::MusicEmbed => self.music_embed = Some(None),
            FieldName::MapLat => self.map_lat = Some(None),
            FieldName::MapLng => self.map_lng = Some(None),
            FieldName::SocialKind => self.social_kind = Some(None),
            FieldName::SocialUrl => self.social_url = Some(None),
        }
    }

    /// Merge the touched fields into `fields`, leaving the rest alone.
    pub fn apply_to(&self, fields: &mut BlockFields) {
        fn merge<T: Clone>(slot: &mut Option<T>, update: &Option<Option<T>>) {
            if let Some(value) = update {
                *slot = value.clone();
            }
        }
        merge(&mut fields.text, &self.text);
        merge(&mut fields.link_url, &self.link_url);
        merge(&mut fields.photo_url, &self.photo_url);
        merge(&mut fields.video_url, &self.video_url);
        merge(&mut fields.music_embed, &self.music_embed);
        merge(&mut fields.map_lat, &self.map_lat);
        merge(&mut fields.map_lng, &self.map_lng);
        merge(&mut fields.social_kind, &self.social_kind);
        merge(&mut fields.social_url, &self.social_url);
    }
}

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

/// Interpret `patch` for a block of type `kind`.
pub fn normalize(kind: BlockKind, patch: &UnifiedPatch) -> FieldUpdate {
    let mut update = FieldUpdate::default();

    for field in FieldName::ALL {
        if field.kind() != kind {
            update.clear(field);
        }
    }

    match kind {
        BlockKind::Note => update.text = patch.string_entry(&["content", "note", "text"]),
        BlockKind::Link => update.link_url = patch.string_entry(&["url", "linkUrl"]),
        BlockKind::Photo => update.photo_url = patch.string_entry(&["url", "photoUrl"]),
        BlockKind::Video => update.video_url = patch.string_entry(&["url", "videoUrl"]),
        BlockKind::Music => {
            update.music_embed = patch.string_entry(&["url", "musicUrl", "musicEmbed"])
        }
        BlockKind::Map => {
            if let Some(combined) = patch.get("url") {
                let (lat, lng) = match combined {
                    Value::String(s) => parse_lat_lng(s),
                    _ => (None, None),
                };
                update.map_lat = Some(lat);
                update.map_lng = Some(lng);
            }
            if let Some(lat) = patch.get("mapLat") {
                update.map_lat = Some(coordinate_value(lat));
            }
            if let Some(lng) = patch.get("mapLng") {
                update.map_lng = Some(coordinate_value(lng));
            }
        }
        BlockKind::Social => {
            update.social_kind = patch
                .string_entry(&["socialType", "socialKind"])
                .map(|v| v.and_then(|s| s.parse().ok()));
            update.social_url = patch.string_entry(&["socialUrl"]);
        }
    }

    update.sort = patch.get("sort").and_then(sort_value);
    update
}

/// Parse `"lat,lng"`.  If either half is not a number both come back `None`.
pub fn parse_lat_lng(s: &str) -> (Option<f64>, Option<f64>) {
    let Some((lat, lng)) = s.split_once(',') else {
        return (None, None);
    };
    match (parse_number(lat), parse_number(lng)) {
        (Some(lat), Some(lng)) => (Some(lat), Some(lng)),
        _ => (None, None),
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn coordinate_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn string_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn sort_value(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(value: Value) -> UnifiedPatch {
        serde_json::from_value(value).unwrap()
    }

    fn sample_patches() -> Vec<UnifiedPatch> {
        vec![
            patch(json!({})),
            patch(json!({"content": "hello"})),
            patch(json!({"url": "https://example.com", "sort": 4})),
            patch(json!({"url": "55.75, 37.61"})),
            patch(json!({"mapLat": 1.5, "mapLng": "oops"})),
            patch(json!({"socialType": "vk", "socialUrl": "https://vk.com/me"})),
            patch(json!({
                "content": "a", "linkUrl": "b", "photoUrl": "c", "videoUrl": "d",
                "musicEmbed": "e", "mapLat": 1, "mapLng": 2, "socialKind": "telegram",
                "socialUrl": "f"
            })),
        ]
    }

    #[test]
    fn test_foreign_fields_always_cleared() {
        for kind in BlockKind::ALL {
            for p in sample_patches() {
                let update = normalize(kind, &p);
                for field in FieldName::ALL {
                    if field.kind() != kind {
                        assert!(update.clears(field), "{kind}: {field:?} not cleared");
                    }
                }
            }
        }
    }

    #[test]
    fn test_applied_update_leaves_only_own_fields() {
        let everything = sample_patches().pop().unwrap();
        for kind in BlockKind::ALL {
            let mut fields = BlockFields {
                text: Some("stale".into()),
                link_url: Some("stale".into()),
                map_lat: Some(9.0),
                social_kind: Some(SocialKind::Instagram),
                ..Default::default()
            };
            normalize(kind, &everything).apply_to(&mut fields);
            for field in fields.set_fields() {
                assert_eq!(field.kind(), kind);
            }
        }
    }

    #[test]
    fn test_own_field_untouched_when_not_supplied() {
        let update = normalize(BlockKind::Note, &patch(json!({"sort": 2})));
        assert!(!update.touches(FieldName::Text));
        assert_eq!(update.sort, Some(2));
    }

    #[test]
    fn test_note_accepts_content_alias() {
        let update = normalize(BlockKind::Note, &patch(json!({"content": "hi"})));
        assert_eq!(update.text, Some(Some("hi".to_string())));
    }

    #[test]
    fn test_specific_key_wins_over_generic() {
        let p = patch(json!({"url": "generic", "linkUrl": "specific"}));
        assert_eq!(
            normalize(BlockKind::Link, &p).link_url,
            Some(Some("specific".to_string()))
        );

        let p = patch(json!({"url": "generic", "photoUrl": "/uploads/abc"}));
        assert_eq!(
            normalize(BlockKind::Photo, &p).photo_url,
            Some(Some("/uploads/abc".to_string()))
        );
    }

    #[test]
    fn test_music_accepts_embed_markup() {
        let markup = r#"<iframe src="https://music.example/embed/1"></iframe>"#;
        let update = normalize(BlockKind::Music, &patch(json!({"musicEmbed": markup})));
        assert_eq!(update.music_embed, Some(Some(markup.to_string())));
    }

    #[test]
    fn test_null_and_blank_strings_clear_the_field() {
        let update = normalize(BlockKind::Video, &patch(json!({"videoUrl": null})));
        assert_eq!(update.video_url, Some(None));
        let update = normalize(BlockKind::Video, &patch(json!({"url": "   "})));
        assert_eq!(update.video_url, Some(None));
    }

    #[test]
    fn test_map_parse_success() {
        let update = normalize(BlockKind::Map, &patch(json!({"url": "55.75, 37.61"})));
        assert_eq!(update.map_lat, Some(Some(55.75)));
        assert_eq!(update.map_lng, Some(Some(37.61)));
    }

    #[test]
    fn test_map_parse_robustness() {
        for bad in ["55.1,not-a-number", "55.1", "", ",", "NaN,1", "1,inf"] {
            let update = normalize(BlockKind::Map, &patch(json!({ "url": bad })));
            assert_eq!(update.map_lat, Some(None), "input {bad:?}");
            assert_eq!(update.map_lng, Some(None), "input {bad:?}");
        }
    }

    #[test]
    fn test_map_explicit_fields_are_independent() {
        let update = normalize(BlockKind::Map, &patch(json!({"mapLat": 10.5})));
        assert_eq!(update.map_lat, Some(Some(10.5)));
        assert_eq!(update.map_lng, None);

        let update = normalize(BlockKind::Map, &patch(json!({"mapLat": "x", "mapLng": null})));
        assert_eq!(update.map_lat, Some(None));
        assert_eq!(update.map_lng, Some(None));
    }

    #[test]
    fn test_map_explicit_fields_override_combined_string() {
        let p = patch(json!({"url": "1,2", "mapLng": 3}));
        let update = normalize(BlockKind::Map, &p);
        assert_eq!(update.map_lat, Some(Some(1.0)));
        assert_eq!(update.map_lng, Some(Some(3.0)));
    }

    #[test]
    fn test_social_fields() {
        let p = patch(json!({"socialKind": "Telegram", "socialUrl": "https://t.me/me"}));
        let update = normalize(BlockKind::Social, &p);
        assert_eq!(update.social_kind, Some(Some(SocialKind::Telegram)));
        assert_eq!(update.social_url, Some(Some("https://t.me/me".to_string())));

        let update = normalize(BlockKind::Social, &patch(json!({"socialKind": "myspace"})));
        assert_eq!(update.social_kind, Some(None));
    }

    #[test]
    fn test_sort_passthrough() {
        for kind in BlockKind::ALL {
            assert_eq!(normalize(kind, &patch(json!({"sort": -7}))).sort, Some(-7));
        }
        assert_eq!(normalize(BlockKind::Note, &patch(json!({"sort": 2.9}))).sort, Some(2));
        assert_eq!(normalize(BlockKind::Note, &patch(json!({"sort": "3"}))).sort, None);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let plain = normalize(BlockKind::Link, &patch(json!({"url": "u"})));
        let noisy = normalize(BlockKind::Link, &patch(json!({"url": "u", "colour": "red"})));
        assert_eq!(plain, noisy);
    }

    #[test]
    fn test_type_tag() {
        assert_eq!(patch(json!({})).type_tag(), None);
        assert_eq!(patch(json!({"type": null})).type_tag(), None);
        assert_eq!(patch(json!({"type": "link"})).type_tag(), Some(Ok(BlockKind::Link)));
        assert!(matches!(patch(json!({"type": 3})).type_tag(), Some(Err(_))));
    }
}
