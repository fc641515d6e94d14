//! Booking lifecycle: statuses, who may move a booking between them, and the
//! reschedule rule. Views derive their action buttons from [`next_allowed`]
//! and nothing else.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Photographer,
    Admin,
}

/// Badge data for a status, shared by every view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusStyle {
    pub emoji: &'static str,
    pub label: &'static str,
    pub color: &'static str,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    pub fn style(self) -> StatusStyle {
        match self {
            BookingStatus::Pending => StatusStyle { emoji: "🆕", label: "Pending", color: "yellow" },
            BookingStatus::Confirmed => StatusStyle { emoji: "✅", label: "Confirmed", color: "green" },
            BookingStatus::Cancelled => StatusStyle { emoji: "❌", label: "Cancelled", color: "red" },
            BookingStatus::Completed => StatusStyle { emoji: "🏁", label: "Completed", color: "blue" },
        }
    }

    /// Verb used on the button that moves a booking into this status.
    pub fn action_label(self) -> &'static str {
        match self {
            BookingStatus::Pending => "Reopen",
            BookingStatus::Confirmed => "Confirm",
            BookingStatus::Cancelled => "Cancel",
            BookingStatus::Completed => "Complete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Photographer => "photographer",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [Role::User, Role::Photographer, Role::Admin]
            .into_iter()
            .find(|r| r.as_str() == value)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use BookingStatus::*;
use Role::*;

// (from, to, actors)
const TRANSITIONS: &[(BookingStatus, BookingStatus, &[Role])] = &[
    (Pending, Confirmed, &[Photographer, Admin]),
    (Pending, Cancelled, &[Photographer, User, Admin]),
    (Pending, Completed, &[Admin]),
    (Confirmed, Cancelled, &[User, Admin]),
    (Confirmed, Completed, &[Photographer, Admin]),
];

/// Statuses `role` may move a booking in `status` into.
pub fn next_allowed(status: BookingStatus, role: Role) -> BTreeSet<BookingStatus> {
    if status.is_terminal() {
        return BTreeSet::new();
    }
    TRANSITIONS
        .iter()
        .filter(|(from, _, actors)| *from == status && actors.contains(&role))
        .map(|(_, to, _)| *to)
        .collect()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("booking is already {0} and can no longer change")]
    Terminal(BookingStatus),

    #[error("booking is already {0}")]
    Unchanged(BookingStatus),

    #[error("a {role} cannot move a {from} booking to {to}")]
    NotAllowed {
        from: BookingStatus,
        to: BookingStatus,
        role: Role,
    },
}

pub fn check_transition(
    from: BookingStatus,
    to: BookingStatus,
    role: Role,
) -> Result<(), TransitionError> {
    if from.is_terminal() {
        return Err(TransitionError::Terminal(from));
    }
    if from == to {
        return Err(TransitionError::Unchanged(from));
    }
    if !next_allowed(from, role).contains(&to) {
        return Err(TransitionError::NotAllowed { from, to, role });
    }
    Ok(())
}

pub const TIME_SLOTS: [&str; 5] = [
    "9:00 AM - 11:00 AM",
    "11:00 AM - 1:00 PM",
    "1:00 PM - 3:00 PM",
    "3:00 PM - 5:00 PM",
    "5:00 PM - 7:00 PM",
];

pub const RESCHEDULE_NOTICE_DAYS: i64 = 2;

pub fn is_known_slot(slot: &str) -> bool {
    TIME_SLOTS.contains(&slot)
}

pub fn earliest_reschedule_date(today: NaiveDate) -> NaiveDate {
    today + Duration::days(RESCHEDULE_NOTICE_DAYS)
}

/// Reschedule only moves date and slot, and only with enough notice.
pub fn validate_reschedule(
    status: BookingStatus,
    date: NaiveDate,
    slot: &str,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    if status.is_terminal() {
        return Err(ValidationError::BookingClosed(status));
    }
    let earliest = earliest_reschedule_date(today);
    if date < earliest {
        return Err(ValidationError::DateTooSoon { date, earliest });
    }
    if !is_known_slot(slot) {
        return Err(ValidationError::UnknownTimeSlot(slot.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for role in [User, Photographer, Admin] {
            for from in [Cancelled, Completed] {
                assert!(next_allowed(from, role).is_empty());
                for to in BookingStatus::ALL {
                    assert_eq!(
                        check_transition(from, to, role),
                        Err(TransitionError::Terminal(from))
                    );
                }
            }
        }
    }

    #[test]
    fn nothing_returns_to_pending() {
        for role in [User, Photographer, Admin] {
            for from in BookingStatus::ALL {
                assert!(!next_allowed(from, role).contains(&Pending));
            }
        }
    }

    #[test]
    fn photographer_confirms_then_cannot_reopen() {
        assert_eq!(check_transition(Pending, Confirmed, Photographer), Ok(()));
        assert_eq!(
            check_transition(Confirmed, Pending, Photographer),
            Err(TransitionError::NotAllowed { from: Confirmed, to: Pending, role: Photographer })
        );
    }

    #[test]
    fn actions_per_role() {
        assert_eq!(next_allowed(Pending, User), BTreeSet::from([Cancelled]));
        assert_eq!(next_allowed(Confirmed, User), BTreeSet::from([Cancelled]));
        assert_eq!(next_allowed(Pending, Photographer), BTreeSet::from([Confirmed, Cancelled]));
        assert_eq!(next_allowed(Confirmed, Photographer), BTreeSet::from([Completed]));
        assert_eq!(
            next_allowed(Pending, Admin),
            BTreeSet::from([Confirmed, Cancelled, Completed])
        );
        assert_eq!(next_allowed(Confirmed, Admin), BTreeSet::from([Cancelled, Completed]));
    }

    #[test]
    fn user_cannot_confirm_own_booking() {
        assert!(matches!(
            check_transition(Pending, Confirmed, User),
            Err(TransitionError::NotAllowed { .. })
        ));
    }

    #[test]
    fn cancelling_a_cancelled_booking_is_rejected() {
        assert_eq!(
            check_transition(Cancelled, Cancelled, User),
            Err(TransitionError::Terminal(Cancelled))
        );
    }

    #[test]
    fn same_status_is_unchanged() {
        assert_eq!(
            check_transition(Confirmed, Confirmed, Admin),
            Err(TransitionError::Unchanged(Confirmed))
        );
    }

    #[test]
    fn status_round_trips_through_its_name() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert_eq!(BookingStatus::parse("new"), None);
    }

    #[test]
    fn reschedule_needs_two_days_notice() {
        let today = day(2024, 5, 10);
        let slot = TIME_SLOTS[0];
        assert_eq!(
            validate_reschedule(Confirmed, day(2024, 5, 11), slot, today),
            Err(ValidationError::DateTooSoon { date: day(2024, 5, 11), earliest: day(2024, 5, 12) })
        );
        assert!(validate_reschedule(Confirmed, day(2024, 5, 10), slot, today).is_err());
        assert!(validate_reschedule(Confirmed, day(2024, 5, 9), slot, today).is_err());
        assert_eq!(validate_reschedule(Confirmed, day(2024, 5, 12), slot, today), Ok(()));
        assert_eq!(validate_reschedule(Pending, day(2024, 6, 1), slot, today), Ok(()));
    }

    #[test]
    fn reschedule_rejects_closed_bookings_and_unknown_slots() {
        let today = day(2024, 5, 10);
        assert_eq!(
            validate_reschedule(Completed, day(2024, 6, 1), TIME_SLOTS[1], today),
            Err(ValidationError::BookingClosed(Completed))
        );
        assert_eq!(
            validate_reschedule(Pending, day(2024, 6, 1), "midnight", today),
            Err(ValidationError::UnknownTimeSlot("midnight".to_string()))
        );
    }

    #[test]
    fn every_status_has_a_distinct_style() {
        let colors: BTreeSet<_> = BookingStatus::ALL.iter().map(|s| s.style().color).collect();
        assert_eq!(colors.len(), 4);
    }
}
