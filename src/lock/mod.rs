//! Signal edit-lock policy.
//!
//! Every scheduled execution instant of a signal (the entry and each
//! martingale level) gates a group of fields. The group stays editable while
//! `now < T(today) - buffer` and freezes from that instant on.
//!
//! Scheduled values are bare times of day and are always read against the date
//! of `now`. A signal whose entry was yesterday therefore looks like it is
//! still in the future (its groups reopen after midnight). That rollover gap is
//! kept as-is here; [`LockLatch`] is what keeps a frozen group frozen.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Signal;

pub mod guard;
pub mod latch;

pub use guard::{EditPermissions, PatchError, SignalActions};
pub use latch::LockLatch;

/// Seconds before a scheduled execution at which its fields freeze.
pub const EDIT_LOCK_BUFFER_SECS: i64 = 10;

/// Martingale levels that carry their own gate.
pub const MARTINGALE_GATES: usize = 3;

/// A scheduled time of day (`HH:MM` or `HH:MM:SS`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(pub NaiveTime);

impl TimeOfDay {
    /// Lenient parse: surrounding whitespace and quotes are ignored. Anything
    /// else that does not parse yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if s.is_empty() {
            return None;
        }
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .ok()
            .map(TimeOfDay)
    }

    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.0)
    }

    /// Wraps past midnight, like the times of day it models.
    pub fn add(self, by: Duration) -> Self {
        TimeOfDay(self.0.overflowing_add_signed(by).0)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.second() == 0 {
            write!(f, "{}", self.0.format("%H:%M"))
        } else {
            write!(f, "{}", self.0.format("%H:%M:%S"))
        }
    }
}

/// Which field groups of a signal may still be edited. `true` means editable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockState {
    /// Pair, entry time, direction, duration and entry stake; gated by the entry time.
    pub basic_info: bool,
    /// Stakes of martingale levels 1..=3, each gated by its own time.
    pub martingale: [bool; MARTINGALE_GATES],
}

impl LockState {
    pub const UNLOCKED: LockState = LockState {
        basic_info: true,
        martingale: [true; MARTINGALE_GATES],
    };

    pub const LOCKED: LockState = LockState {
        basic_info: false,
        martingale: [false; MARTINGALE_GATES],
    };

    pub fn can_edit_basic(&self) -> bool {
        self.basic_info
    }

    /// `level` is 1-based. Levels past the last gate share its flag.
    pub fn can_edit_martingale(&self, level: usize) -> bool {
        match level {
            0 => self.basic_info,
            l => self.martingale[l.min(MARTINGALE_GATES) - 1],
        }
    }

    /// Editable only where both are editable.
    pub fn tighten(self, other: LockState) -> LockState {
        LockState {
            basic_info: self.basic_info && other.basic_info,
            martingale: std::array::from_fn(|i| self.martingale[i] && other.martingale[i]),
        }
    }

    pub fn is_fully_locked(&self) -> bool {
        *self == LockState::LOCKED
    }

    pub fn is_fully_unlocked(&self) -> bool {
        *self == LockState::UNLOCKED
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |editable: bool| if editable { "open" } else { "locked" };
        write!(
            f,
            "basic={} mg1={} mg2={} mg3={}",
            mark(self.basic_info),
            mark(self.martingale[0]),
            mark(self.martingale[1]),
            mark(self.martingale[2]),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditLockPolicy {
    pub buffer: Duration,
}

impl Default for EditLockPolicy {
    fn default() -> Self {
        Self {
            buffer: Duration::seconds(EDIT_LOCK_BUFFER_SECS),
        }
    }
}

impl EditLockPolicy {
    pub fn with_buffer_secs(secs: i64) -> Self {
        Self {
            buffer: Duration::seconds(secs),
        }
    }

    /// Instant at which the group tied to `at` freezes.
    pub fn gate(&self, today: NaiveDate, at: TimeOfDay) -> NaiveDateTime {
        at.on(today) - self.buffer
    }

    /// Absent, empty and unparseable values never pass.
    pub fn has_passed(&self, now: NaiveDateTime, scheduled: Option<&str>) -> bool {
        match scheduled.and_then(TimeOfDay::parse) {
            Some(at) => now >= self.gate(now.date(), at),
            None => false,
        }
    }

    pub fn evaluate_times<S: AsRef<str>>(
        &self,
        now: NaiveDateTime,
        entry_time: Option<&str>,
        martingale_times: &[S],
    ) -> LockState {
        LockState {
            basic_info: !self.has_passed(now, entry_time),
            martingale: std::array::from_fn(|i| {
                !self.has_passed(now, martingale_times.get(i).map(|t| t.as_ref()))
            }),
        }
    }

    pub fn evaluate(&self, now: NaiveDateTime, signal: &Signal) -> LockState {
        self.evaluate_times(now, signal.entry_time(), &signal.martingale_times)
    }
}

/// [`EditLockPolicy::evaluate`] with the standard ten-second buffer.
pub fn evaluate(now: NaiveDateTime, signal: &Signal) -> LockState {
    EditLockPolicy::default().evaluate(now, signal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 29)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn parses_both_time_shapes() {
        assert_eq!(TimeOfDay::parse("14:30").unwrap().to_string(), "14:30");
        assert_eq!(TimeOfDay::parse(" \"14:30:05\" ").unwrap().to_string(), "14:30:05");
        assert_eq!(TimeOfDay::parse("14:30:00").unwrap().to_string(), "14:30");
        assert!(TimeOfDay::parse("").is_none());
        assert!(TimeOfDay::parse("2:30pm").is_none());
        assert!(TimeOfDay::parse("25:00").is_none());
    }

    #[test]
    fn gate_sits_one_buffer_before() {
        let p = EditLockPolicy::default();
        let t = TimeOfDay::parse("14:30").unwrap();
        assert_eq!(p.gate(at(0, 0, 0).date(), t), at(14, 29, 50));
    }

    #[test]
    fn unparseable_never_passes() {
        let p = EditLockPolicy::default();
        assert!(!p.has_passed(at(23, 59, 59), Some("soon")));
        assert!(!p.has_passed(at(23, 59, 59), Some("   ")));
        assert!(!p.has_passed(at(23, 59, 59), None));
    }

    #[test]
    fn gate_just_after_midnight_falls_on_previous_day() {
        let p = EditLockPolicy::default();
        // 00:00:05 - 10s is yesterday 23:59:55, so today it has always passed.
        assert!(p.has_passed(at(0, 0, 0), Some("00:00:05")));
    }

    #[test]
    fn levels_past_last_gate_share_it() {
        let mut s = LockState::UNLOCKED;
        s.martingale[2] = false;
        assert!(!s.can_edit_martingale(3));
        assert!(!s.can_edit_martingale(5));
        assert!(s.can_edit_martingale(2));
        assert!(s.can_edit_martingale(0));
    }

    #[test]
    fn tighten_keeps_locks() {
        let mut a = LockState::UNLOCKED;
        a.martingale[0] = false;
        let mut b = LockState::UNLOCKED;
        b.basic_info = false;
        let t = a.tighten(b);
        assert!(!t.basic_info);
        assert!(!t.martingale[0]);
        assert!(t.martingale[1] && t.martingale[2]);
    }
}
