//! # linkcard-shared
//!
//! Types shared by the store and the HTTP server: the polymorphic block
//! model, the unified patch codec, profile shapes, the access error
//! taxonomy, and the session/credential primitives.

pub mod block;
pub mod codec;
pub mod constants;
pub mod credential;
pub mod error;
pub mod profile;
pub mod session;
pub mod types;

pub use block::{Block, BlockFields, BlockKind, BlockPayload, Coordinates, FieldName, SocialKind};
pub use codec::{normalize, FieldUpdate, UnifiedPatch};
pub use error::{AccessError, TokenError};
pub use types::{BlockId, OwnerId, ReorderItem};
