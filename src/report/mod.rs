//! Report filters and the statistics shown alongside signal tables.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Signal, SignalStatus, TradeResult};

pub mod export;

pub use export::{export_csv, report_file_name, write_csv};

/// Date bounds are inclusive whole days matched against `received_at`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TradeResult>,
}

impl ReportFilter {
    pub fn matches(&self, signal: &Signal) -> bool {
        if self.from.is_some() || self.to.is_some() {
            let Some(date) = signal.received_date() else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) || self.to.is_some_and(|to| date > to) {
                return false;
            }
        }
        if let Some(pair) = &self.pair {
            if signal.pair != *pair {
                return false;
            }
        }
        if let Some(result) = self.result {
            if signal.trading_result != Some(result) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, signals: &'a [Signal]) -> Vec<&'a Signal> {
        signals.iter().filter(|s| self.matches(s)).collect()
    }
}

/// Headline numbers of the reports page.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportStats {
    pub total_trades: usize,
    pub completed_trades: usize,
    /// Wins over completed trades, in percent.
    pub win_rate: f64,
    pub total_profit: f64,
    pub avg_payout: f64,
    pub most_traded_pair: String,
    pub biggest_win: f64,
}

impl ReportStats {
    pub fn compute<'a>(signals: impl IntoIterator<Item = &'a Signal>) -> Self {
        let signals: Vec<&Signal> = signals.into_iter().collect();
        let total_trades = signals.len();
        let completed: Vec<&&Signal> = signals
            .iter()
            .filter(|s| s.status == SignalStatus::Completed)
            .collect();
        let wins = completed
            .iter()
            .filter(|s| s.trading_result == Some(TradeResult::Win))
            .count();

        // Ties go to the pair seen first.
        let mut pair_counts: Vec<(&str, usize)> = Vec::new();
        for s in &signals {
            match pair_counts.iter_mut().find(|(p, _)| *p == s.pair) {
                Some((_, n)) => *n += 1,
                None => pair_counts.push((s.pair.as_str(), 1)),
            }
        }
        let most_traded_pair = pair_counts
            .iter()
            .fold(None::<(&str, usize)>, |best, &(p, n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((p, n)),
            })
            .map(|(p, _)| p.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        ReportStats {
            total_trades,
            completed_trades: completed.len(),
            win_rate: percent(wins, completed.len()),
            total_profit: signals.iter().map(|s| s.total_profit).sum(),
            avg_payout: if total_trades > 0 {
                signals.iter().map(|s| s.payout_percent).sum::<f64>() / total_trades as f64
            } else {
                0.0
            },
            most_traded_pair,
            biggest_win: signals.iter().map(|s| s.total_profit).fold(0.0, f64::max),
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: String,
    pub profit: f64,
    pub trades: usize,
}

/// Profit and trade count per `received_at` date, oldest first.
pub fn daily_series<'a>(signals: impl IntoIterator<Item = &'a Signal>) -> Vec<DailyPoint> {
    let mut days: BTreeMap<String, DailyPoint> = BTreeMap::new();
    for s in signals {
        let date = s
            .received_at
            .split([' ', 'T'])
            .next()
            .unwrap_or_default()
            .to_string();
        let point = days.entry(date.clone()).or_insert(DailyPoint {
            date,
            profit: 0.0,
            trades: 0,
        });
        point.profit += s.total_profit;
        point.trades += 1;
    }
    days.into_values().collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    Wins,
    Losses,
    Draws,
    Pending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OutcomeSlice {
    pub outcome: Outcome,
    pub count: usize,
}

/// Results among completed signals plus pending ones; empty categories are left out.
pub fn outcome_breakdown<'a>(signals: impl IntoIterator<Item = &'a Signal>) -> Vec<OutcomeSlice> {
    let mut counts = [0usize; 4];
    for s in signals {
        match (s.status, s.trading_result) {
            (SignalStatus::Completed, Some(TradeResult::Win)) => counts[0] += 1,
            (SignalStatus::Completed, Some(TradeResult::Loss)) => counts[1] += 1,
            (SignalStatus::Completed, Some(TradeResult::Draw)) => counts[2] += 1,
            (SignalStatus::Pending, _) => counts[3] += 1,
            _ => {}
        }
    }
    [Outcome::Wins, Outcome::Losses, Outcome::Draws, Outcome::Pending]
        .into_iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(outcome, count)| OutcomeSlice { outcome, count })
        .collect()
}

/// Counters above the signal tables.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BoardStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub wins: usize,
    pub losses: usize,
    pub total_profit: f64,
    /// Wins over signals that carry any result, in percent.
    pub win_rate: f64,
}

impl BoardStats {
    pub fn compute(signals: &[Signal]) -> Self {
        let status = |st: SignalStatus| signals.iter().filter(|s| s.status == st).count();
        let result = |r: TradeResult| {
            signals
                .iter()
                .filter(|s| s.trading_result == Some(r))
                .count()
        };
        let with_result = signals.iter().filter(|s| s.trading_result.is_some()).count();
        let wins = result(TradeResult::Win);
        BoardStats {
            total: signals.len(),
            pending: status(SignalStatus::Pending),
            processing: status(SignalStatus::Processing),
            completed: status(SignalStatus::Completed),
            wins,
            losses: result(TradeResult::Loss),
            total_profit: signals.iter().map(|s| s.total_profit).sum(),
            win_rate: percent(wins, with_result),
        }
    }
}
