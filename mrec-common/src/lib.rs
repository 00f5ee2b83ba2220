//! # Meeting Recorder Common Library
//!
//! Shared code for the meeting recorder crates including:
//! - Error taxonomy shared by the server and the auto-save core
//! - Configuration loading and root folder resolution
//! - Database initialization and the user-owned table schema
//! - The `RecordStore` contract and its SQLite implementation
//! - Acting-user resolution (`AuthProvider`)
//! - Record invalidation events (`EventBus`)

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod store;
pub mod time;
pub mod uuid_utils;

pub use auth::{AuthProvider, StaticUser, UserId};
pub use error::{Error, Result};
pub use events::{EventBus, RecordEvent};
pub use store::{Record, RecordFilter, RecordStore, SqliteRecordStore};
