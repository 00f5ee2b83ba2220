//! HTTP API handlers for mrec-server

pub mod auth;
pub mod chat;
pub mod health;
pub mod records;
pub mod sse;
pub mod storage;
pub mod views;

pub use auth::{auth_middleware, whoami};
pub use chat::chat;
pub use health::health_routes;
pub use records::{create_record, delete_record, get_record, list_records, update_record};
pub use sse::event_stream;
pub use storage::{download_signed_object, remove_objects, sign_object, upload_object};
pub use views::suggest_view_name;
