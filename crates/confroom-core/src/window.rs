//! Room access window evaluation.
//!
//! Pure functions over a [`RoomLookup`] and a caller-supplied `now`.

use chrono::{DateTime, Duration, Local, TimeZone, Utc};

use crate::room::{RoomLookup, RoomRecord};

/// Entry is allowed this long before `accessible_from`.
pub const DEFAULT_GRACE_MS: i64 = 60_000;

/// Whether a room can be entered right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EligibilityVerdict {
    /// No lookup result yet.
    Pending,
    TokenInvalid,
    NotYetOpen { opens_at: DateTime<Utc> },
    Expired { expired_at: DateTime<Utc> },
    Open,
}

/// Lower-bound grace applied to a room's validity interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessWindow {
    grace: Duration,
}

impl Default for AccessWindow {
    fn default() -> Self {
        Self::with_grace_ms(DEFAULT_GRACE_MS)
    }
}

impl AccessWindow {
    pub fn with_grace_ms(grace_ms: i64) -> Self {
        Self {
            grace: Duration::milliseconds(grace_ms.max(0)),
        }
    }

    /// Evaluate a lookup at `now`.
    ///
    /// The not-yet-open check runs before the expiry check, so a record
    /// with an inverted interval reports `NotYetOpen`.
    pub fn evaluate(&self, lookup: Option<&RoomLookup>, now: DateTime<Utc>) -> EligibilityVerdict {
        let record = match lookup {
            None => return EligibilityVerdict::Pending,
            Some(RoomLookup::Rejected(_)) => return EligibilityVerdict::TokenInvalid,
            Some(RoomLookup::Found(record)) => record,
        };

        if now < self.opens_at(record) {
            return EligibilityVerdict::NotYetOpen {
                opens_at: record.accessible_from,
            };
        }
        if now > record.accessible_to {
            return EligibilityVerdict::Expired {
                expired_at: record.accessible_to,
            };
        }
        EligibilityVerdict::Open
    }

    /// Earliest instant after `now` at which the verdict for `record` changes.
    ///
    /// `None` once the room has expired.
    pub fn next_transition(&self, record: &RoomRecord, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let opens_at = self.opens_at(record);
        if now < opens_at {
            Some(opens_at)
        } else if now <= record.accessible_to {
            Some(record.accessible_to + Duration::milliseconds(1))
        } else {
            None
        }
    }

    fn opens_at(&self, record: &RoomRecord) -> DateTime<Utc> {
        record.accessible_from - self.grace
    }
}

/// Shorthand for [`AccessWindow::evaluate`] with the default grace period.
pub fn evaluate(lookup: Option<&RoomLookup>, now: DateTime<Utc>) -> EligibilityVerdict {
    AccessWindow::default().evaluate(lookup, now)
}

/// Render a boundary instant as a calendar date-time in `tz`, without a
/// zone suffix, e.g. `Mon Oct 19 2026 14:00:00`.
pub fn format_boundary<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant
        .with_timezone(tz)
        .format("%a %b %d %Y %H:%M:%S")
        .to_string()
}

/// [`format_boundary`] in the machine's local zone.
pub fn format_local(instant: DateTime<Utc>) -> String {
    format_boundary(instant, &Local)
}
