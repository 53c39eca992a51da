//! Trading kill-switch: when today's result or a manual stop halts the runner.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::notify::Notice;
use crate::types::{BaseSettings, Signal, TradingStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopReason {
    Manual,
    ProfitTarget,
    LossLimit,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Manual => "Manually stopped",
            StopReason::ProfitTarget => "Daily profit target reached",
            StopReason::LossLimit => "Maximum loss limit reached",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drawdown of the current balance against the reference, in percent.
pub fn loss_percent(balance_reference: f64, current_balance: f64) -> f64 {
    if balance_reference > 0.0 {
        (balance_reference - current_balance) / balance_reference * 100.0
    } else {
        0.0
    }
}

/// Sum of `total_profit` over signals received on `today`.
pub fn today_profit(signals: &[Signal], today: NaiveDate) -> f64 {
    signals
        .iter()
        .filter(|s| s.received_date() == Some(today))
        .map(|s| s.total_profit)
        .sum()
}

impl TradingStatus {
    pub fn compute(settings: &BaseSettings, today_profit: f64, manually_stopped: bool) -> Self {
        let current_loss_percent =
            loss_percent(settings.balance_reference, settings.current_balance);
        let profit_target_reached =
            today_profit > 0.0 && today_profit >= settings.daily_profit_target;
        let loss_limit_reached =
            today_profit < 0.0 && current_loss_percent >= settings.max_loss_percent;

        let reason = if manually_stopped {
            Some(StopReason::Manual)
        } else if profit_target_reached {
            Some(StopReason::ProfitTarget)
        } else if loss_limit_reached {
            Some(StopReason::LossLimit)
        } else {
            None
        };

        TradingStatus {
            today_profit,
            daily_profit_target: settings.daily_profit_target,
            max_loss_percent: settings.max_loss_percent,
            balance_reference: settings.balance_reference,
            current_balance: settings.current_balance,
            current_loss_percent,
            should_stop_trading: reason.is_some(),
            profit_target_reached,
            loss_limit_reached,
            trading_allowed: reason.is_none(),
            stop_reason: reason.map(|r| r.as_str().to_string()),
        }
    }

    pub fn reason(&self) -> Option<StopReason> {
        match self.stop_reason.as_deref()? {
            "Manually stopped" => Some(StopReason::Manual),
            "Daily profit target reached" => Some(StopReason::ProfitTarget),
            "Maximum loss limit reached" => Some(StopReason::LossLimit),
            _ => None,
        }
    }
}

/// Compares consecutive polled statuses and reports what changed.
#[derive(Debug, Default)]
pub struct StatusWatcher {
    last: Option<TradingStatus>,
}

impl StatusWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&TradingStatus> {
        self.last.as_ref()
    }

    /// The first status only primes the watcher.
    pub fn observe(&mut self, status: TradingStatus) -> Vec<Notice> {
        let mut notices = Vec::new();
        if let Some(prev) = &self.last {
            if !prev.should_stop_trading && status.should_stop_trading {
                if status.today_profit < 0.0 {
                    notices.push(Notice::error(
                        "Trading Stopped",
                        format!(
                            "Trading stopped! Loss limit reached: {:.2}%",
                            status.current_loss_percent
                        ),
                    ));
                } else if !status.profit_target_reached {
                    let reason = status
                        .stop_reason
                        .clone()
                        .unwrap_or_else(|| "Trading halted".to_string());
                    notices.push(Notice::trading_stopped(reason));
                }
            }
            if status.profit_target_reached && !prev.profit_target_reached {
                notices.push(Notice::target_reached(
                    status.today_profit,
                    status.daily_profit_target,
                ));
            }
        }
        self.last = Some(status);
        notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoticeLevel;

    fn settings(current_balance: f64) -> BaseSettings {
        BaseSettings {
            base_amount: 10.0,
            daily_profit_target: 100.0,
            max_loss_percent: 10.0,
            balance_reference: 1000.0,
            current_balance,
            min_payout_percent: None,
            trading_mode: None,
            max_martingale_level: None,
        }
    }

    #[test]
    fn manual_stop_wins_precedence() {
        let s = TradingStatus::compute(&settings(1000.0), 150.0, true);
        assert!(s.profit_target_reached);
        assert_eq!(s.reason(), Some(StopReason::Manual));
        assert!(!s.trading_allowed);
    }

    #[test]
    fn thresholds() {
        let target = TradingStatus::compute(&settings(1100.0), 100.0, false);
        assert_eq!(target.reason(), Some(StopReason::ProfitTarget));

        let loss = TradingStatus::compute(&settings(880.0), -120.0, false);
        assert!((loss.current_loss_percent - 12.0).abs() < 1e-9);
        assert_eq!(loss.reason(), Some(StopReason::LossLimit));

        // Drawdown without a losing day does not stop.
        let flat = TradingStatus::compute(&settings(880.0), 0.0, false);
        assert!(flat.trading_allowed);
        assert_eq!(flat.stop_reason, None);
    }

    #[test]
    fn zero_reference_has_no_drawdown() {
        assert_eq!(loss_percent(0.0, 50.0), 0.0);
    }

    #[test]
    fn watcher_reports_transitions_once() {
        let mut w = StatusWatcher::new();
        assert!(w.observe(TradingStatus::compute(&settings(1000.0), 10.0, false)).is_empty());

        let reached = TradingStatus::compute(&settings(1100.0), 100.0, false);
        let notices = w.observe(reached.clone());
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Daily Target Reached");
        assert!(w.observe(reached).is_empty());

        let mut w = StatusWatcher::new();
        w.observe(TradingStatus::compute(&settings(950.0), -50.0, false));
        let notices = w.observe(TradingStatus::compute(&settings(880.0), -120.0, false));
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert_eq!(notices[0].message, "Trading stopped! Loss limit reached: 12.00%");
    }
}
