//! Event types for the karaoke queue event system
//!
//! Provides the domain event enum and the EventBus that fans events out to
//! SSE clients and any in-process listeners.

use crate::db::models::{AttendanceAction, EventStatus, SongStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Why an event's queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    Request,
    Reorder,
    Move,
    Remove,
    Skip,
    Advance,
    Override,
    Complete,
    AttendanceSync,
    EventClosed,
}

impl fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueueChangeTrigger::Request => "Request",
            QueueChangeTrigger::Reorder => "Reorder",
            QueueChangeTrigger::Move => "Move",
            QueueChangeTrigger::Remove => "Remove",
            QueueChangeTrigger::Skip => "Skip",
            QueueChangeTrigger::Advance => "Advance",
            QueueChangeTrigger::Override => "Override",
            QueueChangeTrigger::Complete => "Complete",
            QueueChangeTrigger::AttendanceSync => "AttendanceSync",
            QueueChangeTrigger::EventClosed => "EventClosed",
        };
        f.write_str(name)
    }
}

/// Karaoke domain events
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KaraokeEvent {
    /// New event scheduled
    EventCreated {
        event_id: Uuid,
        code: String,
        timestamp: DateTime<Utc>,
    },

    /// Descriptive fields of an event changed
    EventUpdated {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Event moved through its lifecycle
    EventStatusChanged {
        event_id: Uuid,
        old_status: EventStatus,
        new_status: EventStatus,
        timestamp: DateTime<Utc>,
    },

    /// Event canceled; its queue was closed out
    EventCanceled {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Queue contents or order changed (clients refetch)
    QueueChanged {
        event_id: Uuid,
        trigger: QueueChangeTrigger,
        queue_count: i64,
        timestamp: DateTime<Utc>,
    },

    /// The entry on stage changed; `None` means nobody is singing
    NowPlayingChanged {
        event_id: Uuid,
        queue_entry_id: Option<Uuid>,
        song_id: Option<Uuid>,
        timestamp: DateTime<Utc>,
    },

    /// A singer checked in/out or started/ended a break
    AttendanceChanged {
        event_id: Uuid,
        singer: String,
        action: AttendanceAction,
        timestamp: DateTime<Utc>,
    },

    /// Song catalog moderation decision
    SongModerated {
        song_id: Uuid,
        status: SongStatus,
        timestamp: DateTime<Utc>,
    },
}

impl KaraokeEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            KaraokeEvent::EventCreated { .. } => "EventCreated",
            KaraokeEvent::EventUpdated { .. } => "EventUpdated",
            KaraokeEvent::EventStatusChanged { .. } => "EventStatusChanged",
            KaraokeEvent::EventCanceled { .. } => "EventCanceled",
            KaraokeEvent::QueueChanged { .. } => "QueueChanged",
            KaraokeEvent::NowPlayingChanged { .. } => "NowPlayingChanged",
            KaraokeEvent::AttendanceChanged { .. } => "AttendanceChanged",
            KaraokeEvent::SongModerated { .. } => "SongModerated",
        }
    }

    /// Karaoke event this notification belongs to, if any
    pub fn event_id(&self) -> Option<Uuid> {
        match self {
            KaraokeEvent::EventCreated { event_id, .. }
            | KaraokeEvent::EventUpdated { event_id, .. }
            | KaraokeEvent::EventStatusChanged { event_id, .. }
            | KaraokeEvent::EventCanceled { event_id, .. }
            | KaraokeEvent::QueueChanged { event_id, .. }
            | KaraokeEvent::NowPlayingChanged { event_id, .. }
            | KaraokeEvent::AttendanceChanged { event_id, .. } => Some(*event_id),
            KaraokeEvent::SongModerated { .. } => None,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally: publishing never blocks, slow
/// subscribers observe `Lagged` instead of stalling producers, and
/// receivers clean up when dropped.
///
/// # Examples
///
/// ```
/// use kq_common::events::{EventBus, KaraokeEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(KaraokeEvent::EventUpdated {
///     event_id: uuid::Uuid::new_v4(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<KaraokeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<KaraokeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: KaraokeEvent,
    ) -> Result<usize, broadcast::error::SendError<KaraokeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: KaraokeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
