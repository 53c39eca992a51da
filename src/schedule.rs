//! Martingale schedule, stake sizing and stale-signal expiry.
//!
//! These are the calculations the execution runner performs against the
//! signal tables; the desk uses them to prefill new signals and to show what
//! the runner is about to do.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::lock::TimeOfDay;
use crate::types::{MessageId, Signal, SignalStatus};

/// Follow-up levels scheduled after the entry trade.
pub const DEFAULT_MARTINGALE_LEVELS: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("unknown trade duration: {0:?}")]
    UnknownDuration(String),
    #[error("invalid payout percent {0}; must be > 0")]
    InvalidPayout(f64),
    #[error("invalid time of day: {0:?}")]
    InvalidTime(String),
}

/// Expiry windows offered by the trading platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TradeDuration {
    S5,
    S15,
    S30,
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H4,
}

impl TradeDuration {
    pub const ALL: [TradeDuration; 10] = [
        TradeDuration::S5,
        TradeDuration::S15,
        TradeDuration::S30,
        TradeDuration::M1,
        TradeDuration::M3,
        TradeDuration::M5,
        TradeDuration::M15,
        TradeDuration::M30,
        TradeDuration::H1,
        TradeDuration::H4,
    ];

    pub fn seconds(self) -> i64 {
        match self {
            TradeDuration::S5 => 5,
            TradeDuration::S15 => 15,
            TradeDuration::S30 => 30,
            TradeDuration::M1 => 60,
            TradeDuration::M3 => 3 * 60,
            TradeDuration::M5 => 5 * 60,
            TradeDuration::M15 => 15 * 60,
            TradeDuration::M30 => 30 * 60,
            TradeDuration::H1 => 60 * 60,
            TradeDuration::H4 => 4 * 60 * 60,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::seconds(self.seconds())
    }

    pub fn as_std(self) -> std::time::Duration {
        std::time::Duration::from_secs(self.seconds().unsigned_abs())
    }

    /// Label used by the platform's expiry picker.
    pub fn platform_label(self) -> &'static str {
        match self {
            TradeDuration::S5 => "S5",
            TradeDuration::S15 => "S15",
            TradeDuration::S30 => "S30",
            TradeDuration::M1 => "M1",
            TradeDuration::M3 => "M3",
            TradeDuration::M5 => "M5",
            TradeDuration::M15 => "M15",
            TradeDuration::M30 => "M30",
            TradeDuration::H1 => "H1",
            TradeDuration::H4 => "H4",
        }
    }

    /// Label as written into `trade_duration` by the listener.
    pub fn label(self) -> &'static str {
        match self {
            TradeDuration::S5 => "5 seconds",
            TradeDuration::S15 => "15 seconds",
            TradeDuration::S30 => "30 seconds",
            TradeDuration::M1 => "1 minutes",
            TradeDuration::M3 => "3 minutes",
            TradeDuration::M5 => "5 minutes",
            TradeDuration::M15 => "15 minutes",
            TradeDuration::M30 => "30 minutes",
            TradeDuration::H1 => "1 hour",
            TradeDuration::H4 => "4 hour",
        }
    }

    fn from_seconds(secs: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.seconds() == secs)
    }
}

impl fmt::Display for TradeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TradeDuration {
    type Err = ScheduleError;

    /// Accepts "5 minutes", "1 minute", "30 seconds", "4 hour", "1 hours",
    /// platform labels ("M5") and bare numbers, which count minutes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ScheduleError::UnknownDuration(s.to_string());
        let text = s.trim().to_ascii_lowercase();

        if let Some(d) = Self::ALL
            .into_iter()
            .find(|d| d.platform_label().eq_ignore_ascii_case(&text))
        {
            return Ok(d);
        }

        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        let (count, unit) = text.split_at(split);
        let count: i64 = count.parse().map_err(|_| unknown())?;
        let unit_secs = match unit.trim() {
            "" | "m" | "min" | "mins" | "minute" | "minutes" => 60,
            "s" | "sec" | "secs" | "second" | "seconds" => 1,
            "h" | "hr" | "hour" | "hours" => 60 * 60,
            _ => return Err(unknown()),
        };
        Self::from_seconds(count * unit_secs).ok_or_else(unknown)
    }
}

/// Parse `label`, falling back to five minutes when it is not a known window.
pub fn wait_duration_or_default(label: &str) -> TradeDuration {
    label.parse().unwrap_or_else(|err| {
        tracing::warn!(%err, "unknown trade duration, defaulting to 5 minutes");
        TradeDuration::M5
    })
}

/// Level `i` (1-based) runs at `entry + duration * i`, rendered `HH:MM`.
pub fn martingale_times(entry: TimeOfDay, duration: TradeDuration, levels: usize) -> Vec<String> {
    (1..=levels)
        .map(|i| {
            let offset = duration.as_duration() * i32::try_from(i).unwrap_or(i32::MAX);
            hh_mm(entry.add(offset))
        })
        .collect()
}

/// Same as [`martingale_times`] but from the raw column values.
pub fn martingale_times_for(
    entry_time: &str,
    trade_duration: &str,
    levels: usize,
) -> Result<Vec<String>, ScheduleError> {
    let entry = TimeOfDay::parse(entry_time)
        .ok_or_else(|| ScheduleError::InvalidTime(entry_time.to_string()))?;
    Ok(martingale_times(entry, trade_duration.parse()?, levels))
}

pub fn trade_end_time(entry: TimeOfDay, duration: TradeDuration) -> String {
    hh_mm(entry.add(duration.as_duration()))
}

fn hh_mm(t: TimeOfDay) -> String {
    t.0.format("%H:%M").to_string()
}

/// Stake that recovers `total_loss` and still nets `target_profit` at the
/// given payout. Rounded to cents.
pub fn next_trade_amount(
    total_loss: f64,
    target_profit: f64,
    payout_percent: f64,
) -> Result<f64, ScheduleError> {
    if payout_percent.is_nan() || payout_percent <= 0.0 {
        return Err(ScheduleError::InvalidPayout(payout_percent));
    }
    let amount = (total_loss + target_profit) / (payout_percent / 100.0);
    Ok(round_cents(amount))
}

/// Entry stake followed by one recovery stake per martingale level, each
/// sized to win back everything staked so far plus `base_amount`.
pub fn stake_ladder(
    base_amount: f64,
    payout_percent: f64,
    levels: usize,
) -> Result<Vec<f64>, ScheduleError> {
    let mut ladder = Vec::with_capacity(levels + 1);
    let mut total_loss = 0.0;
    for level in 0..=levels {
        let stake = if level == 0 {
            base_amount
        } else {
            next_trade_amount(total_loss, base_amount, payout_percent)?
        };
        ladder.push(stake);
        total_loss += stake;
    }
    Ok(ladder)
}

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// A status change made by [`sweep_expired`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Expiry {
    pub message_id: MessageId,
    pub from: SignalStatus,
    pub to: SignalStatus,
}

/// When `signal` was due: the date of `received_at` at `entry_time`.
pub fn scheduled_at(signal: &Signal) -> Option<NaiveDateTime> {
    let date = signal.received_date()?;
    let entry = TimeOfDay::parse(signal.entry_time()?)?;
    Some(entry.on(date))
}

/// Marks live signals whose entry instant is at or before `now`: pending and
/// never executed become `expired`, processing and executed become `failed`.
pub fn sweep_expired(now: NaiveDateTime, signals: &mut [Signal]) -> Vec<Expiry> {
    let mut changed = Vec::new();
    for signal in signals.iter_mut() {
        let Some(due) = scheduled_at(signal) else {
            continue;
        };
        if due > now {
            continue;
        }
        let to = match (signal.status, signal.is_executed) {
            (SignalStatus::Pending, false) => SignalStatus::Expired,
            (SignalStatus::Processing, true) => SignalStatus::Failed,
            _ => continue,
        };
        tracing::info!(message_id = %signal.message_id, from = %signal.status, %to, "signal past entry time");
        changed.push(Expiry {
            message_id: signal.message_id,
            from: signal.status,
            to,
        });
        signal.status = to;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_listener_labels() {
        assert_eq!("5 minutes".parse(), Ok(TradeDuration::M5));
        assert_eq!("1 minute".parse(), Ok(TradeDuration::M1));
        assert_eq!("30 seconds".parse(), Ok(TradeDuration::S30));
        assert_eq!("4 hour".parse(), Ok(TradeDuration::H4));
        assert_eq!("15".parse(), Ok(TradeDuration::M15));
        assert_eq!("m30".parse(), Ok(TradeDuration::M30));
        assert!("7 minutes".parse::<TradeDuration>().is_err());
        assert!("soon".parse::<TradeDuration>().is_err());
        assert_eq!(wait_duration_or_default("whenever"), TradeDuration::M5);
        assert_eq!(TradeDuration::H1.platform_label(), "H1");
    }

    #[test]
    fn martingale_times_step_by_duration() {
        let entry = TimeOfDay::parse("14:30").unwrap();
        assert_eq!(
            martingale_times(entry, TradeDuration::M5, DEFAULT_MARTINGALE_LEVELS),
            vec!["14:35", "14:40", "14:45"]
        );
        assert_eq!(
            martingale_times_for("23:55", "5 minutes", 2).unwrap(),
            vec!["00:00", "00:05"]
        );
        assert_eq!(trade_end_time(entry, TradeDuration::M15), "14:45");
    }

    #[test]
    fn next_stake_recovers_loss() {
        assert_eq!(next_trade_amount(25.0, 20.0, 80.0), Ok(56.25));
        assert_eq!(next_trade_amount(0.0, 10.0, 92.0), Ok(10.87));
        assert_eq!(
            next_trade_amount(1.0, 1.0, 0.0),
            Err(ScheduleError::InvalidPayout(0.0))
        );
    }

    #[test]
    fn ladder_starts_with_base() {
        assert_eq!(stake_ladder(25.0, 80.0, 2).unwrap(), vec![25.0, 62.5, 140.63]);
    }

    #[test]
    fn sweep_marks_past_signals() {
        let row = |id: i64, status: &str, executed: bool, entry: &str| -> Signal {
            serde_json::from_value(serde_json::json!({
                "message_id": id,
                "received_at": "2025-07-29 09:00:00",
                "pair": "EUR/USD",
                "entry_time": entry,
                "direction": "BUY",
                "is_status": status,
                "is_executed": executed,
            }))
            .unwrap()
        };
        let mut signals = vec![
            row(1, "pending", false, "10:00"),
            row(2, "processing", true, "10:00"),
            row(3, "pending", false, "12:00"),
            row(4, "processing", false, "10:00"),
            row(5, "pending", false, ""),
        ];
        let now = NaiveDate::from_ymd_opt(2025, 7, 29)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();

        let changed = sweep_expired(now, &mut signals);
        assert_eq!(changed.len(), 2);
        assert_eq!(signals[0].status, SignalStatus::Expired);
        assert_eq!(signals[1].status, SignalStatus::Failed);
        assert_eq!(signals[2].status, SignalStatus::Pending);
        assert_eq!(signals[3].status, SignalStatus::Processing);
        assert_eq!(signals[4].status, SignalStatus::Pending);
    }
}
