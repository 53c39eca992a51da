//! Client side of the bot/signal backend.
//!
//! [`DeskApi`] is the seam every view-state type talks through. [`HttpApi`]
//! speaks to the real service, [`DemoApi`] serves in-memory sample data, and
//! [`FallbackApi`] layers the two: reads that fail raise a notice and come back
//! from the demo store, writes that fail raise a notice and still fail.

use async_trait::async_trait;
use serde::Deserialize;

use crate::report::{ReportFilter, ReportStats};
use crate::types::{
    ActionReply, BaseSettings, Bot, BotId, Channel, ChannelId, MessageId, NewChannel, Signal,
    SignalPatch, SignalQuery, StartBotRequest, TradingStatus,
};

pub mod demo;
pub mod error;
pub mod fallback;
pub mod http;

pub use demo::DemoApi;
pub use error::ApiError;
pub use fallback::FallbackApi;
pub use http::HttpApi;

pub type ApiResult<T> = Result<T, ApiError>;

#[async_trait]
pub trait DeskApi: Send + Sync {
    // bots
    async fn bots_status(&self) -> ApiResult<Vec<Bot>>;
    async fn start_bot(&self, req: &StartBotRequest) -> ApiResult<ActionReply>;
    async fn stop_bot(&self, bot: &BotId) -> ApiResult<ActionReply>;

    // signals
    async fn today_signals(&self) -> ApiResult<Vec<Signal>>;
    async fn all_signals(&self, query: &SignalQuery) -> ApiResult<Vec<Signal>>;
    async fn add_signal(&self, signal: &Signal) -> ApiResult<ActionReply>;
    async fn update_signal(&self, id: MessageId, patch: &SignalPatch) -> ApiResult<ActionReply>;
    async fn delete_signal(&self, id: MessageId) -> ApiResult<ActionReply>;

    // results
    async fn results(&self, filter: &ReportFilter) -> ApiResult<Vec<Signal>>;
    async fn results_stats(&self, filter: &ReportFilter) -> ApiResult<ReportStats>;

    // channels
    async fn channels(&self) -> ApiResult<Vec<Channel>>;
    async fn add_channel(&self, channel: &NewChannel) -> ApiResult<Channel>;
    async fn update_channel(&self, id: ChannelId, channel: &NewChannel) -> ApiResult<Channel>;
    async fn delete_channel(&self, id: ChannelId) -> ApiResult<ActionReply>;

    // settings
    async fn base_settings(&self) -> ApiResult<BaseSettings>;
    async fn update_base_settings(&self, settings: &BaseSettings) -> ApiResult<ActionReply>;
    async fn today_profit(&self) -> ApiResult<f64>;
    async fn trading_status(&self) -> ApiResult<TradingStatus>;
    async fn stop_trading(&self) -> ApiResult<ActionReply>;
    async fn resume_trading(&self) -> ApiResult<ActionReply>;

    async fn health(&self) -> ApiResult<ActionReply>;
}

/// `GET /api/settings/today-profit` answers either a bare number or an object.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum TodayProfit {
    Bare(f64),
    Wrapped {
        #[serde(alias = "profit")]
        today_profit: f64,
    },
}

impl TodayProfit {
    pub(crate) fn value(self) -> f64 {
        match self {
            TodayProfit::Bare(v) | TodayProfit::Wrapped { today_profit: v } => v,
        }
    }
}

/// Turns an action reply with `status: "error"` into [`ApiError::Rejected`].
pub(crate) fn accept(reply: ActionReply) -> ApiResult<ActionReply> {
    if reply.is_error() {
        Err(ApiError::Rejected(
            reply
                .message
                .unwrap_or_else(|| "request rejected".to_string()),
        ))
    } else {
        Ok(reply)
    }
}
