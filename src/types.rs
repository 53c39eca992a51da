use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::lenient;

/// Telegram message id of the signal; doubles as the signal's primary key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotId(pub String);

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "BUY", alias = "buy", alias = "Buy")]
    Buy,
    #[serde(rename = "SELL", alias = "sell", alias = "Sell")]
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        })
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "call" | "up" => Ok(Direction::Buy),
            "sell" | "put" | "down" => Ok(Direction::Sell),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Lifecycle of a signal as written by the execution runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Pending,
    Processing,
    Completed,
    Expired,
    Failed,
    /// Skipped because trading was halted when the signal came due.
    Limited,
}

impl SignalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalStatus::Pending => "pending",
            SignalStatus::Processing => "processing",
            SignalStatus::Completed => "completed",
            SignalStatus::Expired => "expired",
            SignalStatus::Failed => "failed",
            SignalStatus::Limited => "limited",
        }
    }

    /// Still waiting on (or in the middle of) execution.
    pub fn is_live(self) -> bool {
        matches!(self, SignalStatus::Pending | SignalStatus::Processing)
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(SignalStatus::Pending),
            "processing" => Ok(SignalStatus::Processing),
            "completed" => Ok(SignalStatus::Completed),
            "expired" => Ok(SignalStatus::Expired),
            "failed" => Ok(SignalStatus::Failed),
            "limited" => Ok(SignalStatus::Limited),
            other => Err(format!("unknown signal status: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeResult {
    Win,
    Loss,
    Draw,
}

impl TradeResult {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeResult::Win => "win",
            TradeResult::Loss => "loss",
            TradeResult::Draw => "draw",
        }
    }
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" => Ok(TradeResult::Win),
            "loss" | "lose" => Ok(TradeResult::Loss),
            "draw" | "tie" => Ok(TradeResult::Draw),
            other => Err(format!("unknown trade result: {other}")),
        }
    }
}

/// One row of `today_signals` / `all_signals`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub message_id: MessageId,
    #[serde(default, deserialize_with = "lenient::string_or_null")]
    pub channel_type: String,
    #[serde(default, deserialize_with = "lenient::string_or_null")]
    pub received_at: String,
    pub pair: String,
    #[serde(default, deserialize_with = "lenient::f64_or_null")]
    pub base_amount: f64,
    /// `HH:MM` (sometimes `HH:MM:SS`); empty when the parser found none.
    #[serde(default, deserialize_with = "lenient::string_or_null")]
    pub entry_time: String,
    pub direction: Direction,
    #[serde(default, deserialize_with = "lenient::string_or_null")]
    pub trade_duration: String,
    #[serde(default, deserialize_with = "lenient::string_or_null")]
    pub end_time: String,
    /// Level `n` (1-based) executes at `martingale_times[n - 1]`.
    #[serde(default, deserialize_with = "lenient::time_list")]
    pub martingale_times: Vec<String>,
    /// Indexed by trade level: `[0]` is the entry stake, `[n]` the stake of level `n`.
    #[serde(default, deserialize_with = "lenient::amount_list")]
    pub martingale_amounts: Vec<f64>,
    #[serde(default, deserialize_with = "lenient::u32_or_null")]
    pub is_available_martingale_level: u32,
    #[serde(default, deserialize_with = "lenient::bool_or_int")]
    pub is_otc: bool,
    #[serde(rename = "is_status")]
    pub status: SignalStatus,
    #[serde(default, deserialize_with = "lenient::blank_as_none")]
    pub trading_result: Option<TradeResult>,
    #[serde(default, deserialize_with = "lenient::f64_or_null")]
    pub payout_percent: f64,
    #[serde(default, deserialize_with = "lenient::u32_or_null")]
    pub trade_level: u32,
    #[serde(default, deserialize_with = "lenient::f64_or_null")]
    pub total_profit: f64,
    #[serde(default, deserialize_with = "lenient::f64_or_null")]
    pub total_staked: f64,
    #[serde(default, deserialize_with = "lenient::string_or_null")]
    pub raw_text: String,
    #[serde(default, deserialize_with = "lenient::bool_or_int")]
    pub is_executed: bool,
}

impl Signal {
    pub fn entry_time(&self) -> Option<&str> {
        non_blank(&self.entry_time)
    }

    /// Scheduled time of martingale `level` (1-based).
    pub fn martingale_time(&self, level: usize) -> Option<&str> {
        level
            .checked_sub(1)
            .and_then(|i| self.martingale_times.get(i))
            .and_then(|t| non_blank(t))
    }

    /// Stake of trade `level` (0 = entry).
    pub fn stake_for_level(&self, level: usize) -> Option<f64> {
        self.martingale_amounts.get(level).copied()
    }

    /// Date part of `received_at` (`YYYY-MM-DD HH:MM:SS` or ISO-8601).
    pub fn received_date(&self) -> Option<NaiveDate> {
        let date = self.received_at.trim().get(..10)?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    pub fn apply(&mut self, patch: &SignalPatch) {
        if let Some(pair) = &patch.pair {
            self.pair = pair.clone();
            self.is_otc = pair.to_ascii_lowercase().contains("otc");
        }
        if let Some(amount) = patch.base_amount {
            self.base_amount = amount;
        }
        if let Some(entry) = &patch.entry_time {
            self.entry_time = entry.clone();
        }
        if let Some(direction) = patch.direction {
            self.direction = direction;
        }
        if let Some(duration) = &patch.trade_duration {
            self.trade_duration = duration.clone();
        }
        if let Some(amounts) = &patch.martingale_amounts {
            self.martingale_amounts = amounts.clone();
        }
        if let Some(levels) = patch.is_available_martingale_level {
            self.is_available_martingale_level = levels;
        }
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

/// Partial update sent to `PUT /api/signals/{message_id}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub martingale_amounts: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_available_martingale_level: Option<u32>,
}

impl SignalPatch {
    pub fn is_empty(&self) -> bool {
        *self == SignalPatch::default()
    }
}

/// Filters accepted by `GET /api/signals/all`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SignalQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SignalStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Enabled,
    Disabled,
}

impl ChannelStatus {
    pub fn toggled(self) -> Self {
        match self {
            ChannelStatus::Enabled => ChannelStatus::Disabled,
            ChannelStatus::Disabled => ChannelStatus::Enabled,
        }
    }
}

/// A signal source the listener subscribes to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub chat_id: String,
    pub channel_name: String,
    pub channel_type: String,
    pub status: ChannelStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewChannel {
    pub chat_id: String,
    pub channel_name: String,
    pub channel_type: String,
    pub status: ChannelStatus,
}

impl NewChannel {
    pub fn telegram(chat_id: impl Into<String>, channel_name: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            channel_name: channel_name.into(),
            channel_type: "telegram".to_string(),
            status: ChannelStatus::Enabled,
        }
    }

    pub fn with_id(self, id: ChannelId) -> Channel {
        Channel {
            id,
            chat_id: self.chat_id,
            channel_name: self.channel_name,
            channel_type: self.channel_type,
            status: self.status,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotState {
    Running,
    Stopped,
}

/// A managed bot process as reported by `/api/bots/status`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    pub id: BotId,
    pub status: BotState,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub log: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartBotRequest {
    #[serde(rename = "botId")]
    pub bot_id: BotId,
    pub script: String,
    #[serde(rename = "workingDir", skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopBotRequest {
    #[serde(rename = "botId")]
    pub bot_id: BotId,
}

/// `{status, message?, pid?, log?}` returned by every action endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionReply {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

impl ActionReply {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.into()),
            pid: None,
            log: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case("error")
    }
}

/// Risk parameters from the `base_setting` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaseSettings {
    pub base_amount: f64,
    pub daily_profit_target: f64,
    pub max_loss_percent: f64,
    pub balance_reference: f64,
    pub current_balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_payout_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trading_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_martingale_level: Option<u32>,
}

/// Kill-switch view of today's trading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradingStatus {
    pub today_profit: f64,
    pub daily_profit_target: f64,
    pub max_loss_percent: f64,
    pub balance_reference: f64,
    pub current_balance: f64,
    pub current_loss_percent: f64,
    pub should_stop_trading: bool,
    pub profit_target_reached: bool,
    pub loss_limit_reached: bool,
    pub trading_allowed: bool,
    #[serde(default, deserialize_with = "lenient::blank_as_none")]
    pub stop_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_sqlite_row_shapes() {
        let row = serde_json::json!({
            "message_id": 1042,
            "channel_type": "telegram",
            "received_at": "2025-07-29 14:21:07",
            "pair": "EUR/USD OTC",
            "base_amount": 25,
            "entry_time": "14:30",
            "direction": "BUY",
            "trade_duration": "5 minutes",
            "end_time": null,
            "martingale_times": "14:35, 14:40,14:45",
            "martingale_amounts": "[25, 56.25, 126.56]",
            "is_available_martingale_level": 3,
            "is_otc": 1,
            "is_status": "pending",
            "trading_result": "",
            "payout_percent": 80,
            "trade_level": null,
            "total_profit": null,
            "total_staked": 0,
            "raw_text": "EUR/USD OTC BUY 14:30",
            "is_executed": 0
        });

        let s: Signal = serde_json::from_value(row).expect("decode");
        assert_eq!(s.martingale_times, vec!["14:35", "14:40", "14:45"]);
        assert_eq!(s.martingale_amounts, vec![25.0, 56.25, 126.56]);
        assert!(s.is_otc);
        assert!(!s.is_executed);
        assert_eq!(s.trading_result, None);
        assert_eq!(s.end_time, "");
        assert_eq!(s.status, SignalStatus::Pending);
        assert_eq!(s.martingale_time(1), Some("14:35"));
        assert_eq!(s.martingale_time(0), None);
        assert_eq!(s.martingale_time(4), None);
        assert_eq!(s.received_date(), NaiveDate::from_ymd_opt(2025, 7, 29));
    }

    #[test]
    fn malformed_amount_string_is_empty() {
        let row = serde_json::json!({
            "message_id": 1,
            "pair": "GBP/USD",
            "direction": "sell",
            "martingale_amounts": "not json",
            "is_status": "limited",
        });
        let s: Signal = serde_json::from_value(row).expect("decode");
        assert!(s.martingale_amounts.is_empty());
        assert_eq!(s.status, SignalStatus::Limited);
        assert_eq!(s.direction, Direction::Sell);
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = SignalPatch {
            base_amount: Some(30.0),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), serde_json::json!({"base_amount": 30.0}));
        assert!(!patch.is_empty());
        assert!(SignalPatch::default().is_empty());
    }
}
