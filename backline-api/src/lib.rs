//! backline HTTP API service
//!
//! The service side of the batch creation and notification flow: validates
//! requests, expands them through the batch generator, persists them via
//! the typed table gateway, and pushes row changes and toast lifecycle
//! events to connected clients over SSE.

pub mod api;
pub mod error;
pub mod gateway;
pub mod server;
pub mod state;
