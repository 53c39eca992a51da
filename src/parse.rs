//! Reading signals out of channel message text.
//!
//! Channels post in Hebrew: the entry line carries one of the entry keywords
//! and each martingale level sits on its own "רמה" (level) line with an
//! `HH:MM` time. The asset is either a forex pair or one of the OTC stocks.

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::lock::TimeOfDay;
use crate::schedule::{self, TradeDuration};
use crate::types::{Direction, MessageId, Signal, SignalStatus};

/// Stocks the platform trades as OTC assets.
pub const OTC_STOCKS: [&str; 24] = [
    "Apple OTC",
    "American Express OTC",
    "Cisco OTC",
    "FACEBOOK INC OTC",
    "Intel OTC",
    "Microsoft OTC",
    "Tesla OTC",
    "Amazon OTC",
    "Alibaba OTC",
    "FedEx OTC",
    "Netflix OTC",
    "Palantir Technologies OTC",
    "VISA OTC",
    "Boeing Company OTC",
    "Citigroup Inc OTC",
    "Johnson & Johnson OTC",
    "GameStop Corp OTC",
    "Pfizer Inc OTC",
    "ExxonMobil OTC",
    "Advanced Micro Devices OTC",
    "Marathon Digital Holdings OTC",
    "McDonald's OTC",
    "VIX OTC",
    "Coinbase Global OTC",
];

const LEVEL_WORD: &str = "רמה";
const ENTRY_WORDS: [&str; 3] = ["כניסה", "מכירה", "קנייה"];
const BUY_MARKERS: [&str; 5] = ["קנייה", "⬆️", "BUY", "למעלה", "🟩"];
const SELL_MARKERS: [&str; 4] = ["מכירה", "⬇️", "SELL", "🟥"];

static PAIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]{3}/[A-Z]{3}").expect("pair pattern"));
static CLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{2}:\d{2}").expect("time pattern"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("word pattern"));

/// Fields read from one message, before the desk's own defaults are applied.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedSignal {
    pub pair: String,
    pub is_otc: bool,
    pub entry_time: Option<String>,
    pub direction: Option<Direction>,
    pub martingale_times: Vec<String>,
    pub trade_duration: Option<String>,
}

/// Where a message came from and the stake settings in force when it arrived.
#[derive(Clone, Debug, PartialEq)]
pub struct Arrival {
    pub message_id: MessageId,
    pub channel_type: String,
    pub base_amount: f64,
    pub martingale_levels: u32,
}

fn words(line: &str) -> HashSet<String> {
    WORD.find_iter(&line.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

fn otc_stock(line: &str) -> Option<&'static str> {
    let words = words(line);
    if !words.contains("otc") {
        return None;
    }
    OTC_STOCKS.into_iter().find(|stock| {
        stock
            .split_whitespace()
            .next()
            .is_some_and(|first| words.contains(&first.to_lowercase()))
    })
}

fn first_time(line: &str) -> Option<&str> {
    CLOCK.find(line).map(|m| m.as_str())
}

/// The format check a message must pass before it is parsed: an asset, a
/// time outside the level lines and exactly three levels.
pub fn is_signal(text: &str) -> bool {
    let has_asset = PAIR.is_match(text) || text.lines().any(|l| otc_stock(l).is_some());
    let has_entry = text
        .lines()
        .any(|l| CLOCK.is_match(l) && !l.contains(LEVEL_WORD));
    let levels = text.matches(LEVEL_WORD).count();
    has_asset && has_entry && levels == 3
}

/// Reads the asset, entry, direction and level times. `None` when no known
/// asset is named.
pub fn parse_signal(text: &str) -> Option<ParsedSignal> {
    let (mut pair, is_otc) = match text
        .lines()
        .find_map(|l| PAIR.find(l).map(|m| (m.as_str(), l)))
    {
        Some((pair, line)) => {
            let otc = line.to_uppercase().contains("OTC") || text.to_uppercase().contains("OTC");
            (pair.to_string(), otc)
        }
        None => (text.lines().find_map(otc_stock)?.to_string(), true),
    };
    if is_otc && !pair.to_uppercase().contains("OTC") {
        pair.push_str(" OTC");
    }

    let entry_time = text
        .lines()
        .filter(|l| ENTRY_WORDS.iter().any(|w| l.contains(w)))
        .find_map(first_time)
        .map(str::to_string);

    let direction = if BUY_MARKERS.iter().any(|m| text.contains(m)) {
        Some(Direction::Buy)
    } else if SELL_MARKERS.iter().any(|m| text.contains(m)) {
        Some(Direction::Sell)
    } else {
        None
    };

    let martingale_times: Vec<String> = text
        .lines()
        .filter(|l| l.contains(LEVEL_WORD))
        .filter_map(first_time)
        .map(str::to_string)
        .collect();

    let trade_duration = match (entry_time.as_deref(), martingale_times.first()) {
        (Some(entry), Some(first)) => Some(duration_between(entry, first)),
        _ => None,
    };

    Some(ParsedSignal {
        pair,
        is_otc,
        entry_time,
        direction,
        martingale_times,
        trade_duration,
    })
}

/// Gap from the entry to the first level as a duration label. A first level
/// before the entry is read as the next day.
fn duration_between(entry: &str, first_level: &str) -> String {
    let parse = |t: &str| NaiveTime::parse_from_str(t, "%H:%M").ok();
    let (Some(from), Some(to)) = (parse(entry), parse(first_level)) else {
        return "Unknown".to_string();
    };
    let mut gap = to - from;
    if gap < Duration::zero() {
        gap += Duration::days(1);
    }
    let secs = gap.num_seconds();
    if secs < 60 {
        format!("{secs} seconds")
    } else {
        format!("{} minutes", secs / 60)
    }
}

/// A full signal row for a message received at `now`, or `None` when the
/// text fails [`is_signal`] or names no direction. An entry already behind
/// the clock arrives as expired.
pub fn signal_from_text(text: &str, arrival: &Arrival, now: NaiveDateTime) -> Option<Signal> {
    if !is_signal(text) {
        tracing::debug!(message_id = %arrival.message_id, "not a signal format");
        return None;
    }
    let parsed = parse_signal(text)?;
    let Some(direction) = parsed.direction else {
        tracing::debug!(message_id = %arrival.message_id, "no direction in signal");
        return None;
    };
    let entry_time = parsed.entry_time.unwrap_or_default();
    let trade_duration = parsed.trade_duration.unwrap_or_default();

    let entry = TimeOfDay::parse(&entry_time);
    let end_time = match (entry, trade_duration.parse::<TradeDuration>()) {
        (Some(entry), Ok(duration)) => schedule::trade_end_time(entry, duration),
        _ => String::new(),
    };
    // Minute precision: an entry in the current minute is still pending.
    let minute = now.time().with_second(0).unwrap_or(now.time());
    let status = match entry {
        Some(entry) if entry.0 < minute => SignalStatus::Expired,
        _ => SignalStatus::Pending,
    };

    Some(Signal {
        message_id: arrival.message_id,
        channel_type: arrival.channel_type.clone(),
        received_at: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        pair: parsed.pair,
        base_amount: arrival.base_amount,
        entry_time,
        direction,
        trade_duration,
        end_time,
        martingale_times: parsed.martingale_times,
        martingale_amounts: Vec::new(),
        is_available_martingale_level: arrival.martingale_levels,
        is_otc: parsed.is_otc,
        status,
        trading_result: None,
        payout_percent: 0.0,
        trade_level: 0,
        total_profit: 0.0,
        total_staked: 0.0,
        raw_text: text.to_string(),
        is_executed: false,
    })
}
