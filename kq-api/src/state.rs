//! Shared application state
//!
//! One instance of each engine, all sharing the database pool, the event
//! bus and the per-event locks.

use crate::attendance::AttendanceTracker;
use crate::catalog::SongCatalog;
use crate::event_manager::EventManager;
use crate::queue::{EventLocks, QueueManager};
use kq_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub bus: EventBus,
    pub events: Arc<EventManager>,
    pub queue: Arc<QueueManager>,
    pub attendance: Arc<AttendanceTracker>,
    pub songs: Arc<SongCatalog>,
    /// Interval between SSE keep-alive comments
    pub sse_keepalive: Duration,
}

impl AppState {
    pub fn new(db: SqlitePool, bus: EventBus, sse_keepalive: Duration) -> Self {
        let locks = Arc::new(EventLocks::new());
        Self {
            events: Arc::new(EventManager::new(db.clone(), bus.clone(), locks.clone())),
            queue: Arc::new(QueueManager::new(db.clone(), bus.clone(), locks.clone())),
            attendance: Arc::new(AttendanceTracker::new(db.clone(), bus.clone(), locks)),
            songs: Arc::new(SongCatalog::new(db.clone(), bus.clone())),
            db,
            bus,
            sse_keepalive,
        }
    }
}
