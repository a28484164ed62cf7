//! # backline Common Library
//!
//! Shared code for backline services including:
//! - Error taxonomy and result alias
//! - Service configuration
//! - Event bus types (AppEvent enum)
//! - Batch record generation
//! - Notification center (toast queue)
//! - Realtime change subscriptions
//! - Database pool and schema initialization
//! - SSE stream utilities

pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod notify;
pub mod realtime;
pub mod sse;

pub use config::Config;
pub use error::{Error, Result};
