//! # Karaoke Queue Common Library
//!
//! Shared code for the karaoke queue service including:
//! - Domain models (events, queue entries, attendance, songs)
//! - Event types (KaraokeEvent enum) and the EventBus
//! - Database initialization and schema
//! - Configuration loading and root folder resolution

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
