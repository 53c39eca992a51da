//! In-memory stand-in for the backend, seeded with sample data.

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use parking_lot::Mutex;
use std::sync::Arc;

use super::{ApiError, ApiResult, DeskApi};
use crate::clock::Clock;
use crate::lock::TimeOfDay;
use crate::report::{ReportFilter, ReportStats};
use crate::risk;
use crate::schedule::{self, TradeDuration, DEFAULT_MARTINGALE_LEVELS};
use crate::types::{
    ActionReply, BaseSettings, Bot, BotId, BotState, Channel, ChannelId, ChannelStatus, Direction,
    MessageId, NewChannel, Signal, SignalPatch, SignalQuery, SignalStatus, StartBotRequest,
    TradeResult, TradingStatus,
};

struct DemoState {
    bots: Vec<Bot>,
    signals: Vec<Signal>,
    channels: Vec<Channel>,
    settings: BaseSettings,
    manually_stopped: bool,
    next_pid: u32,
}

/// Backend double used offline and as the fallback data source.
pub struct DemoApi {
    clock: Arc<dyn Clock>,
    state: Mutex<DemoState>,
}

impl DemoApi {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let state = DemoState {
            bots: sample_bots(),
            signals: sample_signals(now),
            channels: sample_channels(),
            settings: default_settings(),
            manually_stopped: false,
            next_pid: 12_347,
        };
        Self {
            clock,
            state: Mutex::new(state),
        }
    }

    /// Empty store; useful when a test wants to seed its own rows.
    pub fn empty(clock: Arc<dyn Clock>) -> Self {
        let state = DemoState {
            bots: Vec::new(),
            signals: Vec::new(),
            channels: Vec::new(),
            settings: default_settings(),
            manually_stopped: false,
            next_pid: 10_000,
        };
        Self {
            clock,
            state: Mutex::new(state),
        }
    }

    pub fn with_signals(self, signals: Vec<Signal>) -> Self {
        self.state.lock().signals = signals;
        self
    }

    /// Runs the runner's expiry sweep over the stored signals.
    pub fn sweep_expired(&self) -> Vec<schedule::Expiry> {
        let now = self.clock.now();
        schedule::sweep_expired(now, &mut self.state.lock().signals)
    }

    fn not_found(what: &str, id: impl std::fmt::Display) -> ApiError {
        ApiError::Status {
            code: 404,
            body: format!("{what} {id} not found"),
        }
    }

    fn status(state: &DemoState, clock: &dyn Clock) -> TradingStatus {
        let profit = risk::today_profit(&state.signals, clock.today());
        TradingStatus::compute(&state.settings, profit, state.manually_stopped)
    }
}

impl std::fmt::Debug for DemoApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DemoApi")
            .field("signals", &state.signals.len())
            .field("channels", &state.channels.len())
            .field("bots", &state.bots.len())
            .finish()
    }
}

#[async_trait]
impl DeskApi for DemoApi {
    async fn bots_status(&self) -> ApiResult<Vec<Bot>> {
        Ok(self.state.lock().bots.clone())
    }

    async fn start_bot(&self, req: &StartBotRequest) -> ApiResult<ActionReply> {
        let mut state = self.state.lock();
        let pid = state.next_pid;
        let dir = req.working_dir.as_deref().unwrap_or(".");
        let log = format!("{}/{}_output.log", dir.trim_end_matches('/'), req.bot_id);

        let index = match state.bots.iter().position(|b| b.id == req.bot_id) {
            Some(i) => i,
            None => {
                state.bots.push(Bot {
                    id: req.bot_id.clone(),
                    status: BotState::Stopped,
                    pid: None,
                    log: None,
                });
                state.bots.len() - 1
            }
        };
        let bot = &mut state.bots[index];
        if bot.status == BotState::Running {
            return Ok(ActionReply {
                status: "already_running".to_string(),
                message: Some(format!("{} is already running", req.bot_id)),
                pid: bot.pid,
                log: bot.log.clone(),
            });
        }
        bot.status = BotState::Running;
        bot.pid = Some(pid);
        bot.log = Some(log.clone());
        state.next_pid += 1;
        Ok(ActionReply {
            status: "running".to_string(),
            message: Some(format!("{} started with PID {pid}", req.bot_id)),
            pid: Some(pid),
            log: Some(log),
        })
    }

    async fn stop_bot(&self, id: &BotId) -> ApiResult<ActionReply> {
        let mut state = self.state.lock();
        let Some(bot) = state.bots.iter_mut().find(|b| b.id == *id) else {
            return Ok(ActionReply {
                status: "not_found".to_string(),
                message: None,
                pid: None,
                log: None,
            });
        };
        let status = match bot.status {
            BotState::Running => "stopped",
            BotState::Stopped => "already_stopped",
        };
        let pid = bot.pid.take();
        bot.status = BotState::Stopped;
        Ok(ActionReply {
            status: status.to_string(),
            message: None,
            pid,
            log: None,
        })
    }

    async fn today_signals(&self) -> ApiResult<Vec<Signal>> {
        let today = self.clock.today();
        Ok(self
            .state
            .lock()
            .signals
            .iter()
            .filter(|s| s.received_date() == Some(today))
            .cloned()
            .collect())
    }

    async fn all_signals(&self, query: &SignalQuery) -> ApiResult<Vec<Signal>> {
        let mut rows: Vec<Signal> = self
            .state
            .lock()
            .signals
            .iter()
            .filter(|s| query.status.map_or(true, |st| s.status == st))
            .filter(|s| query.pair.as_ref().map_or(true, |p| s.pair == *p))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        Ok(rows)
    }

    async fn add_signal(&self, signal: &Signal) -> ApiResult<ActionReply> {
        let mut state = self.state.lock();
        if state.signals.iter().any(|s| s.message_id == signal.message_id) {
            return Err(ApiError::Rejected(format!(
                "signal {} already exists",
                signal.message_id
            )));
        }
        state.signals.insert(0, signal.clone());
        Ok(ActionReply::success("Signal added"))
    }

    async fn update_signal(&self, id: MessageId, patch: &SignalPatch) -> ApiResult<ActionReply> {
        let mut state = self.state.lock();
        let signal = state
            .signals
            .iter_mut()
            .find(|s| s.message_id == id)
            .ok_or_else(|| Self::not_found("signal", id))?;
        signal.apply(patch);
        Ok(ActionReply::success("Signal updated"))
    }

    async fn delete_signal(&self, id: MessageId) -> ApiResult<ActionReply> {
        let mut state = self.state.lock();
        let before = state.signals.len();
        state.signals.retain(|s| s.message_id != id);
        if state.signals.len() == before {
            return Err(Self::not_found("signal", id));
        }
        Ok(ActionReply::success(format!("Signal {id} deleted")))
    }

    async fn results(&self, filter: &ReportFilter) -> ApiResult<Vec<Signal>> {
        let state = self.state.lock();
        Ok(filter.apply(&state.signals).into_iter().cloned().collect())
    }

    async fn results_stats(&self, filter: &ReportFilter) -> ApiResult<ReportStats> {
        let state = self.state.lock();
        Ok(ReportStats::compute(filter.apply(&state.signals)))
    }

    async fn channels(&self) -> ApiResult<Vec<Channel>> {
        Ok(self.state.lock().channels.clone())
    }

    async fn add_channel(&self, channel: &NewChannel) -> ApiResult<Channel> {
        let mut state = self.state.lock();
        let id = state.channels.iter().map(|c| c.id.0).max().unwrap_or(0) + 1;
        let created = channel.clone().with_id(ChannelId(id));
        state.channels.insert(0, created.clone());
        Ok(created)
    }

    async fn update_channel(&self, id: ChannelId, channel: &NewChannel) -> ApiResult<Channel> {
        let mut state = self.state.lock();
        let slot = state
            .channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Self::not_found("channel", id.0))?;
        *slot = channel.clone().with_id(id);
        Ok(slot.clone())
    }

    async fn delete_channel(&self, id: ChannelId) -> ApiResult<ActionReply> {
        let mut state = self.state.lock();
        let before = state.channels.len();
        state.channels.retain(|c| c.id != id);
        if state.channels.len() == before {
            return Err(Self::not_found("channel", id.0));
        }
        Ok(ActionReply::success("Channel deleted"))
    }

    async fn base_settings(&self) -> ApiResult<BaseSettings> {
        Ok(self.state.lock().settings.clone())
    }

    async fn update_base_settings(&self, settings: &BaseSettings) -> ApiResult<ActionReply> {
        self.state.lock().settings = settings.clone();
        Ok(ActionReply::success("Settings saved"))
    }

    async fn today_profit(&self) -> ApiResult<f64> {
        let state = self.state.lock();
        Ok(risk::today_profit(&state.signals, self.clock.today()))
    }

    async fn trading_status(&self) -> ApiResult<TradingStatus> {
        let state = self.state.lock();
        Ok(Self::status(&state, self.clock.as_ref()))
    }

    async fn stop_trading(&self) -> ApiResult<ActionReply> {
        self.state.lock().manually_stopped = true;
        Ok(ActionReply::success("Trading manually stopped"))
    }

    async fn resume_trading(&self) -> ApiResult<ActionReply> {
        self.state.lock().manually_stopped = false;
        Ok(ActionReply::success("Trading resumed"))
    }

    async fn health(&self) -> ApiResult<ActionReply> {
        Ok(ActionReply {
            status: "ok".to_string(),
            message: None,
            pid: None,
            log: None,
        })
    }
}

/// Values the settings form resets to.
pub fn default_settings() -> BaseSettings {
    BaseSettings {
        base_amount: 10.0,
        daily_profit_target: 100.0,
        max_loss_percent: 10.0,
        balance_reference: 1000.0,
        current_balance: 1000.0,
        min_payout_percent: Some(70.0),
        trading_mode: Some("demo".to_string()),
        max_martingale_level: Some(3),
    }
}

fn sample_bots() -> Vec<Bot> {
    let bot = |id: &str, status: BotState, pid: Option<u32>| Bot {
        id: BotId(id.to_string()),
        status,
        pid,
        log: Some(format!("./{id}_output.log")),
    };
    vec![
        bot("telegram_listener", BotState::Running, Some(12_345)),
        bot("trade_signal_runner", BotState::Running, Some(12_346)),
        bot("api_bot_manager", BotState::Stopped, None),
    ]
}

fn sample_channels() -> Vec<Channel> {
    let channel = |id: i64, chat: &str, name: &str, status: ChannelStatus| Channel {
        id: ChannelId(id),
        chat_id: chat.to_string(),
        channel_name: name.to_string(),
        channel_type: "telegram".to_string(),
        status,
    };
    vec![
        channel(1, "-1002846030923", "Forex Legend VIP", ChannelStatus::Enabled),
        channel(2, "-1002721262804", "Forex Legend Club 60", ChannelStatus::Enabled),
        channel(3, "-1002723345001", "Premium Signals", ChannelStatus::Disabled),
    ]
}

struct Sample {
    id: i64,
    pair: &'static str,
    direction: Direction,
    /// Entry relative to "now".
    entry_in: Duration,
    status: SignalStatus,
    result: Option<TradeResult>,
    profit: f64,
    level: u32,
}

/// Signals around `now`: a couple still ahead, one in flight and a settled
/// history, plus yesterday's leftovers for the reports page.
fn sample_signals(now: NaiveDateTime) -> Vec<Signal> {
    let samples = [
        Sample {
            id: 10_501,
            pair: "EUR/USD",
            direction: Direction::Buy,
            entry_in: Duration::minutes(20),
            status: SignalStatus::Pending,
            result: None,
            profit: 0.0,
            level: 0,
        },
        Sample {
            id: 10_502,
            pair: "GBP/JPY OTC",
            direction: Direction::Sell,
            entry_in: Duration::minutes(45),
            status: SignalStatus::Pending,
            result: None,
            profit: 0.0,
            level: 0,
        },
        Sample {
            id: 10_498,
            pair: "AUD/CAD OTC",
            direction: Direction::Buy,
            entry_in: Duration::minutes(-2),
            status: SignalStatus::Processing,
            result: None,
            profit: 0.0,
            level: 0,
        },
        Sample {
            id: 10_490,
            pair: "EUR/USD",
            direction: Direction::Sell,
            entry_in: Duration::minutes(-90),
            status: SignalStatus::Completed,
            result: Some(TradeResult::Win),
            profit: 21.25,
            level: 0,
        },
        Sample {
            id: 10_485,
            pair: "GBP/USD",
            direction: Direction::Buy,
            entry_in: Duration::minutes(-150),
            status: SignalStatus::Completed,
            result: Some(TradeResult::Win),
            profit: 25.0,
            level: 1,
        },
        Sample {
            id: 10_470,
            pair: "USD/JPY",
            direction: Direction::Sell,
            entry_in: Duration::minutes(-26 * 60),
            status: SignalStatus::Completed,
            result: Some(TradeResult::Loss),
            profit: -230.63,
            level: 3,
        },
        Sample {
            id: 10_466,
            pair: "EUR/GBP",
            direction: Direction::Buy,
            entry_in: Duration::minutes(-27 * 60),
            status: SignalStatus::Expired,
            result: None,
            profit: 0.0,
            level: 0,
        },
    ];
    samples.iter().map(|s| build_sample(now, s)).collect()
}

fn build_sample(now: NaiveDateTime, s: &Sample) -> Signal {
    let entry_at = now + s.entry_in;
    let received_at = (entry_at - Duration::minutes(8)).min(now - Duration::minutes(1));
    let entry = TimeOfDay(entry_at.time());
    let entry_time = entry_at.format("%H:%M").to_string();
    let duration = TradeDuration::M5;
    let payout = 85.0;
    let base = 25.0;
    let amounts =
        schedule::stake_ladder(base, payout, DEFAULT_MARTINGALE_LEVELS).unwrap_or_default();
    let staked: f64 = amounts.iter().take(s.level as usize + 1).sum();

    Signal {
        message_id: MessageId(s.id),
        channel_type: "telegram".to_string(),
        received_at: received_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        pair: s.pair.to_string(),
        base_amount: base,
        entry_time: entry_time.clone(),
        direction: s.direction,
        trade_duration: duration.label().to_string(),
        end_time: schedule::trade_end_time(entry, duration),
        martingale_times: schedule::martingale_times(entry, duration, DEFAULT_MARTINGALE_LEVELS),
        martingale_amounts: amounts,
        is_available_martingale_level: DEFAULT_MARTINGALE_LEVELS as u32,
        is_otc: s.pair.contains("OTC"),
        status: s.status,
        trading_result: s.result,
        payout_percent: payout,
        trade_level: s.level,
        total_profit: s.profit,
        total_staked: if s.status == SignalStatus::Completed { staked } else { 0.0 },
        raw_text: format!("{} {} {}", s.pair, s.direction, entry_time),
        is_executed: matches!(s.status, SignalStatus::Processing | SignalStatus::Completed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::NaiveDate;

    fn api() -> DemoApi {
        let now = NaiveDate::from_ymd_opt(2025, 7, 29)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        DemoApi::new(Arc::new(ManualClock::new(now)))
    }

    #[tokio::test]
    async fn today_excludes_yesterday() {
        let api = api();
        let today = api.today_signals().await.unwrap();
        let all = api.all_signals(&SignalQuery::default()).await.unwrap();
        assert_eq!(today.len(), 5);
        assert_eq!(all.len(), 7);
        assert!(all.windows(2).all(|w| w[0].received_at >= w[1].received_at));
    }

    #[tokio::test]
    async fn bot_lifecycle_replies() {
        let api = api();
        let id = BotId("api_bot_manager".into());
        let req = StartBotRequest {
            bot_id: id.clone(),
            script: "api_bot_manager.py".into(),
            working_dir: Some("/srv/bots/".into()),
        };
        let started = api.start_bot(&req).await.unwrap();
        assert_eq!(started.status, "running");
        assert_eq!(started.log.as_deref(), Some("/srv/bots/api_bot_manager_output.log"));
        assert_eq!(api.start_bot(&req).await.unwrap().status, "already_running");
        assert_eq!(api.stop_bot(&id).await.unwrap().status, "stopped");
        assert_eq!(api.stop_bot(&id).await.unwrap().status, "already_stopped");
        assert_eq!(
            api.stop_bot(&BotId("nope".into())).await.unwrap().status,
            "not_found"
        );
    }

    #[tokio::test]
    async fn manual_stop_shows_in_status() {
        let api = api();
        assert!(api.trading_status().await.unwrap().trading_allowed);
        api.stop_trading().await.unwrap();
        let status = api.trading_status().await.unwrap();
        assert_eq!(status.stop_reason.as_deref(), Some("Manually stopped"));
        api.resume_trading().await.unwrap();
        assert!(api.trading_status().await.unwrap().trading_allowed);
    }
}
