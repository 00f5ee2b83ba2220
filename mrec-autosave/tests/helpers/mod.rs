//! Test Helper Utilities
//!
//! Shared utilities for testing mrec-autosave

pub mod mock_store;
pub mod observer;

pub use mock_store::{Call, MockStore};
pub use observer::RecordingObserver;
