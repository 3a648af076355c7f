//! # linkcard-store
//!
//! SQLite persistence for linkcard pages.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for accounts, profiles
//! and blocks.  Block listing follows the page order: ascending sort key,
//! ties broken by ascending id.

pub mod blocks;
pub mod database;
pub mod migrations;
pub mod models;
pub mod profiles;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
