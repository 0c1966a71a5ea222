//! Annual visit tracking
//!
//! Each apprentice has at most one tracking record per calendar year. The
//! record holds [`SLOT_COUNT`] ordered visit slots which fill strictly left
//! to right: a visit is placed in the first empty slot, and once every slot
//! is taken further visits of that year stay untracked.
//!
//! This module holds the pure part of the rule (slot arithmetic, status
//! label, year derivation). The atomic persistence step lives in
//! [`crate::db::tracking::reconcile`].

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::Serialize;

/// Number of expected visits per apprentice per year
pub const SLOT_COUNT: usize = 4;

/// Ordered visit slots of one tracking record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TrackingSlots(pub [Option<i64>; SLOT_COUNT]);

impl TrackingSlots {
    pub fn new(slots: [Option<i64>; SLOT_COUNT]) -> Self {
        Self(slots)
    }

    /// Number of occupied slots
    pub fn filled(&self) -> usize {
        self.0.iter().filter(|slot| slot.is_some()).count()
    }

    /// Index (0-based) of the first empty slot, `None` when all are taken
    pub fn first_empty(&self) -> Option<usize> {
        self.0.iter().position(|slot| slot.is_none())
    }

    pub fn is_complete(&self) -> bool {
        self.first_empty().is_none()
    }

    /// 1-based slot number holding `visit_id`
    pub fn slot_of(&self, visit_id: i64) -> Option<usize> {
        self.0
            .iter()
            .position(|slot| *slot == Some(visit_id))
            .map(|index| index + 1)
    }

    /// True when no empty slot precedes an occupied one
    pub fn is_gap_free(&self) -> bool {
        match self.first_empty() {
            None => true,
            Some(index) => self.0[index..].iter().all(|slot| slot.is_none()),
        }
    }

    /// Place `visit_id` in the first empty slot
    ///
    /// Returns the 1-based slot number, or `None` when every slot is taken.
    pub fn assign(&mut self, visit_id: i64) -> Option<usize> {
        let index = self.first_empty()?;
        self.0[index] = Some(visit_id);
        Some(index + 1)
    }

    /// Progress label: `"Complete"` or `"k/4"`
    pub fn status_label(&self) -> String {
        if self.is_complete() {
            "Complete".to_string()
        } else {
            format!("{}/{}", self.filled(), SLOT_COUNT)
        }
    }

    pub fn as_array(&self) -> [Option<i64>; SLOT_COUNT] {
        self.0
    }
}

/// Persisted annual tracking record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnualTracking {
    pub id: i64,
    pub apprentice_id: i64,
    pub year: i32,
    pub slots: TrackingSlots,
}

impl AnnualTracking {
    pub fn status_label(&self) -> String {
        self.slots.status_label()
    }
}

/// Result of reconciling a new visit with the tracking record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The visit now occupies `slot` (1-based)
    Assigned {
        slot: usize,
        status: String,
        tracking: AnnualTracking,
    },
    /// The visit was already tracked in `slot`; nothing changed
    AlreadyTracked {
        slot: usize,
        status: String,
        tracking: AnnualTracking,
    },
    /// Every slot was taken; the visit stays untracked
    SlotsExhausted {
        status: String,
        tracking: AnnualTracking,
    },
}

impl ReconcileOutcome {
    pub fn assigned(slot: usize, tracking: AnnualTracking) -> Self {
        Self::Assigned {
            slot,
            status: tracking.status_label(),
            tracking,
        }
    }

    pub fn already_tracked(slot: usize, tracking: AnnualTracking) -> Self {
        Self::AlreadyTracked {
            slot,
            status: tracking.status_label(),
            tracking,
        }
    }

    pub fn exhausted(tracking: AnnualTracking) -> Self {
        Self::SlotsExhausted {
            status: tracking.status_label(),
            tracking,
        }
    }

    pub fn tracking(&self) -> &AnnualTracking {
        match self {
            Self::Assigned { tracking, .. }
            | Self::AlreadyTracked { tracking, .. }
            | Self::SlotsExhausted { tracking, .. } => tracking,
        }
    }

    /// Slot holding the visit, `None` when slots were exhausted
    pub fn slot(&self) -> Option<usize> {
        match self {
            Self::Assigned { slot, .. } | Self::AlreadyTracked { slot, .. } => Some(*slot),
            Self::SlotsExhausted { .. } => None,
        }
    }
}

/// Calendar year of a visit date in the server's local calendar
pub fn tracking_year(visit_date: NaiveDate) -> i32 {
    visit_date.year()
}

/// Parse a visit date from ISO 8601 input
///
/// Accepts a plain date (`2024-03-15`), a local date-time
/// (`2024-03-15T10:30:00`) or an RFC 3339 timestamp with offset. Timestamps
/// with an offset are converted to the server's local calendar first, so a
/// visit at `2024-12-31T23:30:00-05:00` may belong to 2025 locally.
pub fn parse_visit_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(input) {
        return Some(timestamp.with_timezone(&Local).date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|local| local.date_naive())
                .or(Some(naive.date()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(values: [Option<i64>; SLOT_COUNT]) -> TrackingSlots {
        TrackingSlots::new(values)
    }

    #[test]
    fn status_label_counts_filled_slots() {
        assert_eq!(slots([None, None, None, None]).status_label(), "0/4");
        assert_eq!(slots([Some(1), None, None, None]).status_label(), "1/4");
        assert_eq!(slots([Some(1), Some(2), None, None]).status_label(), "2/4");
        assert_eq!(slots([Some(1), Some(2), Some(3), None]).status_label(), "3/4");
    }

    #[test]
    fn status_label_complete_when_all_set() {
        assert_eq!(
            slots([Some(1), Some(2), Some(3), Some(4)]).status_label(),
            "Complete"
        );
    }

    #[test]
    fn assign_fills_left_to_right() {
        let mut tracking = TrackingSlots::default();
        for (expected_slot, visit) in (1..=SLOT_COUNT).zip(10..) {
            assert_eq!(tracking.assign(visit), Some(expected_slot));
            assert!(tracking.is_gap_free());
        }
        assert_eq!(tracking.as_array(), [Some(10), Some(11), Some(12), Some(13)]);
    }

    #[test]
    fn assign_on_full_record_changes_nothing() {
        let mut tracking = slots([Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(tracking.assign(5), None);
        assert_eq!(tracking.as_array(), [Some(1), Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn gap_detection() {
        assert!(slots([None, None, None, None]).is_gap_free());
        assert!(slots([Some(1), Some(2), None, None]).is_gap_free());
        assert!(!slots([Some(1), None, Some(3), None]).is_gap_free());
        assert!(!slots([None, Some(2), None, None]).is_gap_free());
    }

    #[test]
    fn slot_of_is_one_based() {
        let tracking = slots([Some(7), Some(9), None, None]);
        assert_eq!(tracking.slot_of(7), Some(1));
        assert_eq!(tracking.slot_of(9), Some(2));
        assert_eq!(tracking.slot_of(11), None);
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let tracking = AnnualTracking {
            id: 1,
            apprentice_id: 3,
            year: 2024,
            slots: slots([Some(5), None, None, None]),
        };
        let json = serde_json::to_value(ReconcileOutcome::assigned(1, tracking)).unwrap();
        assert_eq!(json["outcome"], "assigned");
        assert_eq!(json["slot"], 1);
        assert_eq!(json["status"], "1/4");
        assert_eq!(json["tracking"]["slots"][0], 5);
        assert!(json["tracking"]["slots"][1].is_null());
    }

    #[test]
    fn parse_plain_date() {
        assert_eq!(
            parse_visit_date("2024-03-15"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
    }

    #[test]
    fn parse_local_datetime() {
        assert_eq!(
            parse_visit_date("2024-03-15T10:30:00"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_visit_date("not a date"), None);
        assert_eq!(parse_visit_date("2024-13-40"), None);
    }

    #[test]
    fn year_comes_from_visit_date() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(tracking_year(date), 2023);
    }
}
