//! # Karaoke Queue Service Library (kq-api)
//!
//! Event scheduling, the per-event singer queue, attendance and break
//! tracking, and the song catalog, served as JSON over HTTP with an SSE
//! stream of changes.

pub mod api;
pub mod attendance;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod event_manager;
pub mod queue;
pub mod state;

pub use api::build_router;
pub use error::{Error, Result};
pub use state::AppState;
