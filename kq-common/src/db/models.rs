//! Database models
//!
//! Domain records shared by the queue engine, the attendance tracker and the
//! HTTP layer. Enum columns are stored as TEXT using the `as_str()` spelling.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Implements `as_str`, `Display` and `FromStr` for a text-backed enum
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Column spelling of this value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        "Unknown {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

// ============================================================================
// Events
// ============================================================================

/// Lifecycle of a karaoke event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EventStatus {
    Upcoming,
    Live,
    Archived,
}

text_enum!(EventStatus {
    Upcoming => "Upcoming",
    Live => "Live",
    Archived => "Archived",
});

impl EventStatus {
    /// Allowed transitions: Upcoming → Live → Archived, or Upcoming → Archived
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (EventStatus::Upcoming, EventStatus::Live)
                | (EventStatus::Live, EventStatus::Archived)
                | (EventStatus::Upcoming, EventStatus::Archived)
        )
    }
}

/// Whether singers can see the event in listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Visibility {
    Visible,
    Hidden,
}

text_enum!(Visibility {
    Visible => "Visible",
    Hidden => "Hidden",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub code: String,
    pub description: String,
    pub status: EventStatus,
    pub visibility: Visibility,
    pub location: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_start_time: Option<NaiveTime>,
    pub scheduled_end_time: Option<NaiveTime>,
    pub dj_name: Option<String>,
    pub is_canceled: bool,
    pub request_limit: i64,
    pub queue_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// A closed event accepts no requests, reorders or check-ins
    pub fn is_closed(&self) -> bool {
        self.is_canceled || self.status == EventStatus::Archived
    }

    /// Validate the fields a caller is allowed to set
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(Error::InvalidInput("Event code must not be empty".to_string()));
        }
        if self.request_limit <= 0 {
            return Err(Error::InvalidInput(format!(
                "Request limit must be positive, got {}",
                self.request_limit
            )));
        }
        if let (Some(start), Some(end)) = (self.scheduled_start_time, self.scheduled_end_time) {
            if end <= start {
                return Err(Error::InvalidInput(format!(
                    "Scheduled end time {} must be after start time {}",
                    end, start
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Queue
// ============================================================================

/// Where a queue entry is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueStatus {
    Upcoming,
    Live,
    Archived,
}

text_enum!(QueueStatus {
    Upcoming => "Upcoming",
    Live => "Live",
    Archived => "Archived",
});

/// One singer's turn at an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub event_id: Uuid,
    pub song_id: Uuid,
    pub requestor: String,
    pub singers: Vec<String>,
    /// 1-based; `None` once archived
    pub position: Option<i64>,
    pub status: QueueStatus,
    pub is_active: bool,
    pub was_skipped: bool,
    pub is_current: bool,
    pub is_on_break: bool,
    pub sung_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn is_finished(&self) -> bool {
        self.status == QueueStatus::Archived
    }

    /// Eligible to be promoted by "start next"
    pub fn is_eligible(&self) -> bool {
        !self.is_finished() && !self.is_current && self.is_active && !self.is_on_break
    }
}

// ============================================================================
// Attendance
// ============================================================================

/// Attendance actions recorded in the append-only history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AttendanceAction {
    CheckIn,
    CheckOut,
    BreakStart,
    BreakEnd,
}

text_enum!(AttendanceAction {
    CheckIn => "CheckIn",
    CheckOut => "CheckOut",
    BreakStart => "BreakStart",
    BreakEnd => "BreakEnd",
});

/// A singer's presence at one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendance {
    pub id: Uuid,
    pub event_id: Uuid,
    pub singer: String,
    pub is_checked_in: bool,
    pub is_on_break: bool,
    pub break_start_at: Option<DateTime<Utc>>,
    pub break_end_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Attendance {
    /// Flags mirrored onto the singer's queue entries: `(is_active, is_on_break)`
    pub fn queue_flags(&self) -> (bool, bool) {
        (self.is_checked_in && !self.is_on_break, self.is_on_break)
    }
}

/// Queue flags for a singer who may never have checked in
pub fn queue_flags_for(attendance: Option<&Attendance>) -> (bool, bool) {
    attendance.map(Attendance::queue_flags).unwrap_or((false, false))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceHistory {
    pub id: Uuid,
    pub event_id: Uuid,
    pub singer: String,
    pub attendance_id: Uuid,
    pub action: AttendanceAction,
    pub action_at: DateTime<Utc>,
}

// ============================================================================
// Songs
// ============================================================================

/// Moderation state of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SongStatus {
    Pending,
    Active,
    Declined,
}

text_enum!(SongStatus {
    Pending => "Pending",
    Active => "Active",
    Declined => "Declined",
});

impl SongStatus {
    pub fn can_transition_to(self, next: SongStatus) -> bool {
        matches!(
            (self, next),
            (SongStatus::Pending, SongStatus::Active)
                | (SongStatus::Pending, SongStatus::Declined)
                | (SongStatus::Declined, SongStatus::Active)
                | (SongStatus::Active, SongStatus::Declined)
        )
    }
}

/// Audio-feature metadata attached to a song
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongFeatures {
    pub bpm: Option<f64>,
    pub energy: Option<f64>,
    pub valence: Option<f64>,
    pub danceability: Option<f64>,
    pub popularity: Option<i64>,
}

impl SongFeatures {
    pub fn validate(&self) -> Result<()> {
        if let Some(bpm) = self.bpm {
            if !(bpm > 0.0) {
                return Err(Error::InvalidInput(format!("bpm must be positive, got {}", bpm)));
            }
        }
        for (name, value) in [
            ("energy", self.energy),
            ("valence", self.valence),
            ("danceability", self.danceability),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(Error::InvalidInput(format!(
                        "{} must be between 0.0 and 1.0, got {}",
                        name, v
                    )));
                }
            }
        }
        if let Some(popularity) = self.popularity {
            if !(0..=100).contains(&popularity) {
                return Err(Error::InvalidInput(format!(
                    "popularity must be between 0 and 100, got {}",
                    popularity
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub genre: Option<String>,
    #[serde(flatten)]
    pub features: SongFeatures,
    pub status: SongStatus,
    pub requested_by: Option<String>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            code: "FRI-01".to_string(),
            description: "Friday night".to_string(),
            status: EventStatus::Upcoming,
            visibility: Visibility::Visible,
            location: "Main room".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 10, 23).unwrap(),
            scheduled_start_time: NaiveTime::from_hms_opt(19, 0, 0),
            scheduled_end_time: NaiveTime::from_hms_opt(23, 0, 0),
            dj_name: None,
            is_canceled: false,
            request_limit: 3,
            queue_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_event_status_transitions() {
        use EventStatus::*;
        assert!(Upcoming.can_transition_to(Live));
        assert!(Live.can_transition_to(Archived));
        assert!(Upcoming.can_transition_to(Archived));
        assert!(!Live.can_transition_to(Upcoming));
        assert!(!Archived.can_transition_to(Live));
        assert!(!Live.can_transition_to(Live));
    }

    #[test]
    fn test_event_validation() {
        let mut event = sample_event();
        assert!(event.validate().is_ok());

        event.scheduled_end_time = NaiveTime::from_hms_opt(18, 0, 0);
        assert!(matches!(event.validate(), Err(Error::InvalidInput(_))));

        let mut event = sample_event();
        event.request_limit = 0;
        assert!(event.validate().is_err());

        let mut event = sample_event();
        event.code = "   ".to_string();
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_event_closed() {
        let mut event = sample_event();
        assert!(!event.is_closed());
        event.is_canceled = true;
        assert!(event.is_closed());

        let mut event = sample_event();
        event.status = EventStatus::Archived;
        assert!(event.is_closed());
    }

    #[test]
    fn test_text_enum_round_trip_and_unknown() {
        assert_eq!("BreakStart".parse::<AttendanceAction>().unwrap(), AttendanceAction::BreakStart);
        assert_eq!(QueueStatus::Live.to_string(), "Live");
        assert!("Playing".parse::<QueueStatus>().is_err());
    }

    #[test]
    fn test_song_status_transitions() {
        use SongStatus::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Declined));
        assert!(Declined.can_transition_to(Active));
        assert!(!Active.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_song_features_validation() {
        let ok = SongFeatures {
            bpm: Some(120.0),
            energy: Some(0.8),
            valence: Some(0.0),
            danceability: Some(1.0),
            popularity: Some(55),
        };
        assert!(ok.validate().is_ok());
        assert!(SongFeatures::default().validate().is_ok());

        let bad_energy = SongFeatures { energy: Some(1.2), ..Default::default() };
        assert!(bad_energy.validate().is_err());

        let bad_bpm = SongFeatures { bpm: Some(0.0), ..Default::default() };
        assert!(bad_bpm.validate().is_err());

        let bad_popularity = SongFeatures { popularity: Some(101), ..Default::default() };
        assert!(bad_popularity.validate().is_err());
    }

    #[test]
    fn test_attendance_queue_flags() {
        let now = Utc::now();
        let mut attendance = Attendance {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            singer: "5551234".to_string(),
            is_checked_in: true,
            is_on_break: false,
            break_start_at: None,
            break_end_at: None,
            updated_at: now,
        };
        assert_eq!(attendance.queue_flags(), (true, false));

        attendance.is_on_break = true;
        assert_eq!(attendance.queue_flags(), (false, true));

        attendance.is_checked_in = false;
        attendance.is_on_break = false;
        assert_eq!(attendance.queue_flags(), (false, false));

        assert_eq!(queue_flags_for(None), (false, false));
    }
}
