//! Pure queue ordering rules
//!
//! Works on the ordered list of unfinished entry ids of one event. Position
//! `n` in the database is index `n - 1` here.

use kq_common::db::QueueEntry;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Proposed order lists an entry twice
    #[error("entry {0} appears more than once")]
    DuplicateEntry(Uuid),

    /// Proposed order names an entry that is not in the queue
    #[error("entry {0} is not in the queue")]
    UnknownEntry(Uuid),

    /// Proposed order leaves out entries that are in the queue
    #[error("order is missing {missing} of {expected} queued entries")]
    MissingEntries { missing: usize, expected: usize },

    /// 1-based target position outside `1..=len`
    #[error("position {position} outside 1..={len}")]
    PositionOutOfRange { position: i64, len: usize },
}

impl OrderError {
    /// True when the caller is working from an outdated view of the queue
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            OrderError::UnknownEntry(_) | OrderError::MissingEntries { .. }
        )
    }
}

/// Check that `proposed` is a permutation of `current`
pub fn validate_new_order(current: &[Uuid], proposed: &[Uuid]) -> Result<(), OrderError> {
    let known: HashSet<Uuid> = current.iter().copied().collect();
    let mut seen = HashSet::with_capacity(proposed.len());

    for id in proposed {
        if !seen.insert(*id) {
            return Err(OrderError::DuplicateEntry(*id));
        }
        if !known.contains(id) {
            return Err(OrderError::UnknownEntry(*id));
        }
    }

    if seen.len() != known.len() {
        return Err(OrderError::MissingEntries {
            missing: known.len() - seen.len(),
            expected: known.len(),
        });
    }

    Ok(())
}

/// Move `id` to 1-based `new_position`, shifting the others to stay dense
pub fn move_to(order: &[Uuid], id: Uuid, new_position: i64) -> Result<Vec<Uuid>, OrderError> {
    if new_position < 1 || new_position as usize > order.len() {
        return Err(OrderError::PositionOutOfRange {
            position: new_position,
            len: order.len(),
        });
    }

    let from = order
        .iter()
        .position(|e| *e == id)
        .ok_or(OrderError::UnknownEntry(id))?;

    let mut reordered = order.to_vec();
    let moved = reordered.remove(from);
    reordered.insert(new_position as usize - 1, moved);
    Ok(reordered)
}

/// First entry by position that may be called up next
///
/// Entries whose singer is absent or on break are passed over but keep
/// their place.
pub fn next_eligible(entries: &[QueueEntry]) -> Option<&QueueEntry> {
    entries
        .iter()
        .filter(|e| e.is_eligible())
        .min_by_key(|e| e.position.unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kq_common::db::QueueStatus;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn entry(position: i64, is_active: bool, is_on_break: bool) -> QueueEntry {
        let now = Utc::now();
        QueueEntry {
            id: Uuid::new_v4(),
            event_id: Uuid::nil(),
            song_id: Uuid::nil(),
            requestor: format!("singer-{}", position),
            singers: vec![format!("singer-{}", position)],
            position: Some(position),
            status: QueueStatus::Upcoming,
            is_active,
            was_skipped: false,
            is_current: false,
            is_on_break,
            sung_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_validate_accepts_permutation() {
        let current = ids(4);
        let proposed = vec![current[2], current[0], current[3], current[1]];
        assert!(validate_new_order(&current, &proposed).is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate() {
        let current = ids(3);
        let proposed = vec![current[0], current[0], current[1]];
        assert_eq!(
            validate_new_order(&current, &proposed),
            Err(OrderError::DuplicateEntry(current[0]))
        );
    }

    #[test]
    fn test_validate_rejects_unknown_and_missing() {
        let current = ids(3);
        let stranger = Uuid::new_v4();

        let err = validate_new_order(&current, &[current[0], current[1], stranger]).unwrap_err();
        assert_eq!(err, OrderError::UnknownEntry(stranger));
        assert!(err.is_stale());

        let err = validate_new_order(&current, &[current[1]]).unwrap_err();
        assert_eq!(err, OrderError::MissingEntries { missing: 2, expected: 3 });
        assert!(err.is_stale());
    }

    #[test]
    fn test_validate_empty_queue() {
        assert!(validate_new_order(&[], &[]).is_ok());
    }

    #[test]
    fn test_move_down_and_up() {
        let order = ids(4);

        let moved = move_to(&order, order[0], 3).unwrap();
        assert_eq!(moved, vec![order[1], order[2], order[0], order[3]]);

        let moved = move_to(&order, order[3], 1).unwrap();
        assert_eq!(moved, vec![order[3], order[0], order[1], order[2]]);

        let same = move_to(&order, order[1], 2).unwrap();
        assert_eq!(same, order);
    }

    #[test]
    fn test_move_out_of_range() {
        let order = ids(2);
        assert_eq!(
            move_to(&order, order[0], 0),
            Err(OrderError::PositionOutOfRange { position: 0, len: 2 })
        );
        assert!(move_to(&order, order[0], 3).is_err());
        assert!(!move_to(&order, order[0], 3).unwrap_err().is_stale());
    }

    #[test]
    fn test_move_unknown_entry() {
        let order = ids(2);
        let stranger = Uuid::new_v4();
        assert_eq!(move_to(&order, stranger, 1), Err(OrderError::UnknownEntry(stranger)));
    }

    #[test]
    fn test_next_eligible_skips_absent_and_on_break() {
        let entries = vec![
            entry(1, false, false), // not checked in
            entry(2, false, true),  // on break
            entry(3, true, false),
            entry(4, true, false),
        ];
        let next = next_eligible(&entries).unwrap();
        assert_eq!(next.position, Some(3));
    }

    #[test]
    fn test_next_eligible_ignores_current() {
        let mut first = entry(1, true, false);
        first.is_current = true;
        first.status = QueueStatus::Live;
        let entries = vec![first, entry(2, true, false)];
        assert_eq!(next_eligible(&entries).unwrap().position, Some(2));
    }

    #[test]
    fn test_next_eligible_none() {
        let entries = vec![entry(1, false, false), entry(2, false, true)];
        assert!(next_eligible(&entries).is_none());
        assert!(next_eligible(&[]).is_none());
    }
}
