//! The polymorphic block model.
//!
//! Storage keeps one nullable column per type-specific field; in memory a
//! block carries a [`BlockPayload`] sum type so consumers never have to
//! null-check fields that cannot belong to the block's type.  The flat
//! [`BlockFields`] record is the bridge between the two shapes.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::types::{BlockId, OwnerId};

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Closed set of block types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Note,
    Link,
    Photo,
    Video,
    Music,
    Map,
    Social,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown block type: {0}")]
pub struct UnknownKind(pub String);

impl BlockKind {
    pub const ALL: [BlockKind; 7] = [
        BlockKind::Note,
        BlockKind::Link,
        BlockKind::Photo,
        BlockKind::Video,
        BlockKind::Music,
        BlockKind::Map,
        BlockKind::Social,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Note => "note",
            BlockKind::Link => "link",
            BlockKind::Photo => "photo",
            BlockKind::Video => "video",
            BlockKind::Music => "music",
            BlockKind::Map => "map",
            BlockKind::Social => "social",
        }
    }

    /// The type-specific fields owned by this kind.
    pub fn fields(&self) -> &'static [FieldName] {
        match self {
            BlockKind::Note => &[FieldName::Text],
            BlockKind::Link => &[FieldName::LinkUrl],
            BlockKind::Photo => &[FieldName::PhotoUrl],
            BlockKind::Video => &[FieldName::VideoUrl],
            BlockKind::Music => &[FieldName::MusicEmbed],
            BlockKind::Map => &[FieldName::MapLat, FieldName::MapLng],
            BlockKind::Social => &[FieldName::SocialKind, FieldName::SocialUrl],
        }
    }
}

impl FromStr for BlockKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        BlockKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Social network a `social` block points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialKind {
    Telegram,
    Vk,
    Instagram,
}

impl SocialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialKind::Telegram => "telegram",
            SocialKind::Vk => "vk",
            SocialKind::Instagram => "instagram",
        }
    }
}

impl FromStr for SocialKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(SocialKind::Telegram),
            "vk" => Ok(SocialKind::Vk),
            "instagram" => Ok(SocialKind::Instagram),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

/// Every type-specific storage column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    Text,
    LinkUrl,
    PhotoUrl,
    VideoUrl,
    MusicEmbed,
    MapLat,
    MapLng,
    SocialKind,
    SocialUrl,
}

impl FieldName {
    pub const ALL: [FieldName; 9] = [
        FieldName::Text,
        FieldName::LinkUrl,
        FieldName::PhotoUrl,
        FieldName::VideoUrl,
        FieldName::MusicEmbed,
        FieldName::MapLat,
        FieldName::MapLng,
        FieldName::SocialKind,
        FieldName::SocialUrl,
    ];

    /// The kind this field belongs to.
    pub fn kind(&self) -> BlockKind {
        match self {
            FieldName::Text => BlockKind::Note,
            FieldName::LinkUrl => BlockKind::Link,
            FieldName::PhotoUrl => BlockKind::Photo,
            FieldName::VideoUrl => BlockKind::Video,
            FieldName::MusicEmbed => BlockKind::Music,
            FieldName::MapLat | FieldName::MapLng => BlockKind::Map,
            FieldName::SocialKind | FieldName::SocialUrl => BlockKind::Social,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            FieldName::Text => "text",
            FieldName::LinkUrl => "link_url",
            FieldName::PhotoUrl => "photo_url",
            FieldName::VideoUrl => "video_url",
            FieldName::MusicEmbed => "music_embed",
            FieldName::MapLat => "map_lat",
            FieldName::MapLng => "map_lng",
            FieldName::SocialKind => "social_kind",
            FieldName::SocialUrl => "social_url",
        }
    }
}

// ---------------------------------------------------------------------------
// Flat record
// ---------------------------------------------------------------------------

/// Flat image of the nullable per-type columns of a block row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockFields {
    pub text: Option<String>,
    pub link_url: Option<String>,
    pub photo_url: Option<String>,
    pub video_url: Option<String>,
    pub music_embed: Option<String>,
    pub map_lat: Option<f64>,
    pub map_lng: Option<f64>,
    pub social_kind: Option<SocialKind>,
    pub social_url: Option<String>,
}

impl BlockFields {
    pub fn is_set(&self, field: FieldName) -> bool {
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

    /// Names of every non-null field.
    pub fn set_fields(&self) -> Vec<FieldName> {
        FieldName::ALL
            .into_iter()
            .filter(|f| self.is_set(*f))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Type-specific content of a block.
///
/// Payload values are optional because a block may be created with only its
/// type and filled in later.  Map coordinates exist as a pair or not at all.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockPayload {
    Note { text: Option<String> },
    Link { url: Option<String> },
    Photo { image_ref: Option<String> },
    Video { url: Option<String> },
    Music { embed: Option<String> },
    Map { coords: Option<Coordinates> },
    Social {
        network: Option<SocialKind>,
        url: Option<String>,
    },
}

impl BlockPayload {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockPayload::Note { .. } => BlockKind::Note,
            BlockPayload::Link { .. } => BlockKind::Link,
            BlockPayload::Photo { .. } => BlockKind::Photo,
            BlockPayload::Video { .. } => BlockKind::Video,
            BlockPayload::Music { .. } => BlockKind::Music,
            BlockPayload::Map { .. } => BlockKind::Map,
            BlockPayload::Social { .. } => BlockKind::Social,
        }
    }

    /// Build the payload of `kind` from a flat record.  Fields belonging to
    /// other kinds are dropped; a half-set coordinate pair becomes `None`.
    pub fn from_fields(kind: BlockKind, fields: BlockFields) -> Self {
        match kind {
            BlockKind::Note => BlockPayload::Note { text: fields.text },
            BlockKind::Link => BlockPayload::Link {
                url: fields.link_url,
            },
            BlockKind::Photo => BlockPayload::Photo {
                image_ref: fields.photo_url,
            },
            BlockKind::Video => BlockPayload::Video {
                url: fields.video_url,
            },
            BlockKind::Music => BlockPayload::Music {
                embed: fields.music_embed,
            },
            BlockKind::Map => BlockPayload::Map {
                coords: match (fields.map_lat, fields.map_lng) {
                    (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
                    _ => None,
                },
            },
            BlockKind::Social => BlockPayload::Social {
                network: fields.social_kind,
                url: fields.social_url,
            },
        }
    }

    /// Flatten back into column values; only this kind's fields can be set.
    pub fn to_fields(&self) -> BlockFields {
        let mut fields = BlockFields::default();
        match self {
            BlockPayload::Note { text } => fields.text = text.clone(),
            BlockPayload::Link { url } => fields.link_url = url.clone(),
            BlockPayload::Photo { image_ref } => fields.photo_url = image_ref.clone(),
            BlockPayload::Video { url } => fields.video_url = url.clone(),
            BlockPayload::Music { embed } => fields.music_embed = embed.clone(),
            BlockPayload::Map { coords } => {
                fields.map_lat = coords.map(|c| c.lat);
                fields.map_lng = coords.map(|c| c.lng);
            }
            BlockPayload::Social { network, url } => {
                fields.social_kind = *network;
                fields.social_url = url.clone();
            }
        }
        fields
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// One content unit on a user's page.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub owner_id: OwnerId,
    pub sort: i64,
    pub payload: BlockPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        self.payload.kind()
    }

    pub fn fields(&self) -> BlockFields {
        self.payload.to_fields()
    }
}

/// Client-facing shape, shared by the editor and the public page.  Every
/// type-specific field is always present, `null` when it does not apply.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockView {
    id: BlockId,
    #[serde(rename = "type")]
    kind: BlockKind,
    sort: i64,
    text: Option<String>,
    link_url: Option<String>,
    photo_url: Option<String>,
    video_url: Option<String>,
    music_embed: Option<String>,
    map_lat: Option<f64>,
    map_lng: Option<f64>,
    social_kind: Option<SocialKind>,
    social_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let f = self.fields();
        BlockView {
            id: self.id,
            kind: self.kind(),
            sort: self.sort,
            text: f.text,
            link_url: f.link_url,
            photo_url: f.photo_url,
            video_url: f.video_url,
            music_embed: f.music_embed,
            map_lat: f.map_lat,
            map_lng: f.map_lng,
            social_kind: f.social_kind,
            social_url: f.social_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .serialize(serializer)
    }
}
