#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use signal_desk::types::{Direction, MessageId, Signal, SignalStatus, TradeResult};

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 29).unwrap()
}

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    day().and_hms_opt(h, m, s).unwrap()
}

/// A pending 14:30 EUR/USD signal received at 14:21 with the usual three
/// five-minute follow-ups.
pub fn signal(id: i64) -> Signal {
    Signal {
        message_id: MessageId(id),
        channel_type: "telegram".into(),
        received_at: "2025-07-29 14:21:07".into(),
        pair: "EUR/USD".into(),
        base_amount: 25.0,
        entry_time: "14:30".into(),
        direction: Direction::Buy,
        trade_duration: "5 minutes".into(),
        end_time: "14:35".into(),
        martingale_times: vec!["14:35".into(), "14:40".into(), "14:45".into()],
        martingale_amounts: vec![25.0, 56.25, 126.56, 284.77],
        is_available_martingale_level: 3,
        is_otc: false,
        status: SignalStatus::Pending,
        trading_result: None,
        payout_percent: 80.0,
        trade_level: 0,
        total_profit: 0.0,
        total_staked: 0.0,
        raw_text: "EUR/USD BUY 14:30".into(),
        is_executed: false,
    }
}

pub fn settled(id: i64, received_at: &str, pair: &str, result: TradeResult, profit: f64) -> Signal {
    Signal {
        received_at: received_at.into(),
        pair: pair.into(),
        status: SignalStatus::Completed,
        trading_result: Some(result),
        total_profit: profit,
        is_executed: true,
        ..signal(id)
    }
}
