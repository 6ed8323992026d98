//! Queue ordering engine
//!
//! Positions are dense (`1..=n`) over the unfinished entries of an event.
//! All mutations of one event's queue are serialized by [`EventLocks`] and
//! run in a single transaction.

pub mod locks;
pub mod manager;
pub mod ordering;

pub use locks::EventLocks;
pub use manager::{load_open_event, NewRequest, QueueManager};
