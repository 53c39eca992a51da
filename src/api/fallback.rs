use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use super::{ApiError, ApiResult, DemoApi, DeskApi};
use crate::notify::{Notice, NotificationCenter};
use crate::report::{ReportFilter, ReportStats};
use crate::types::{
    ActionReply, BaseSettings, Bot, BotId, Channel, ChannelId, MessageId, NewChannel, Signal,
    SignalPatch, SignalQuery, StartBotRequest, TradingStatus,
};

/// Wraps a live backend: reads that fail fall back to sample data, writes
/// that fail keep failing. Either way the failure becomes a notice.
pub struct FallbackApi<P> {
    primary: P,
    demo: DemoApi,
    notices: Arc<NotificationCenter>,
}

impl<P: DeskApi> FallbackApi<P> {
    pub fn new(primary: P, demo: DemoApi, notices: Arc<NotificationCenter>) -> Self {
        Self {
            primary,
            demo,
            notices,
        }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn notices(&self) -> &Arc<NotificationCenter> {
        &self.notices
    }

    async fn or_demo<T, L, D>(&self, what: &str, live: L, demo: D) -> ApiResult<T>
    where
        L: Future<Output = ApiResult<T>> + Send,
        D: Future<Output = ApiResult<T>> + Send,
    {
        match live.await {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(%err, what, "backend read failed, serving demo data");
                self.notices.push(Notice::error(
                    format!("Failed to fetch {what}"),
                    format!("{err}; showing demo data"),
                ));
                demo.await
            }
        }
    }

    async fn or_notice<T, L>(&self, what: &str, live: L) -> ApiResult<T>
    where
        L: Future<Output = ApiResult<T>> + Send,
    {
        live.await.map_err(|err: ApiError| {
            tracing::warn!(%err, what, "backend write failed");
            self.notices
                .push(Notice::error(format!("Failed to {what}"), err.to_string()));
            err
        })
    }
}

impl<P> std::fmt::Debug for FallbackApi<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackApi")
            .field("demo", &self.demo)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P: DeskApi> DeskApi for FallbackApi<P> {
    async fn bots_status(&self) -> ApiResult<Vec<Bot>> {
        self.or_demo("bot status", self.primary.bots_status(), self.demo.bots_status())
            .await
    }

    async fn start_bot(&self, req: &StartBotRequest) -> ApiResult<ActionReply> {
        self.or_notice("start bot", self.primary.start_bot(req)).await
    }

    async fn stop_bot(&self, bot: &BotId) -> ApiResult<ActionReply> {
        self.or_notice("stop bot", self.primary.stop_bot(bot)).await
    }

    async fn today_signals(&self) -> ApiResult<Vec<Signal>> {
        self.or_demo("signals", self.primary.today_signals(), self.demo.today_signals())
            .await
    }

    async fn all_signals(&self, query: &SignalQuery) -> ApiResult<Vec<Signal>> {
        self.or_demo(
            "signals",
            self.primary.all_signals(query),
            self.demo.all_signals(query),
        )
        .await
    }

    async fn add_signal(&self, signal: &Signal) -> ApiResult<ActionReply> {
        self.or_notice("add signal", self.primary.add_signal(signal))
            .await
    }

    async fn update_signal(&self, id: MessageId, patch: &SignalPatch) -> ApiResult<ActionReply> {
        self.or_notice("update signal", self.primary.update_signal(id, patch))
            .await
    }

    async fn delete_signal(&self, id: MessageId) -> ApiResult<ActionReply> {
        self.or_notice("delete signal", self.primary.delete_signal(id))
            .await
    }

    async fn results(&self, filter: &ReportFilter) -> ApiResult<Vec<Signal>> {
        self.or_demo(
            "results",
            self.primary.results(filter),
            self.demo.results(filter),
        )
        .await
    }

    async fn results_stats(&self, filter: &ReportFilter) -> ApiResult<ReportStats> {
        self.or_demo(
            "result stats",
            self.primary.results_stats(filter),
            self.demo.results_stats(filter),
        )
        .await
    }

    async fn channels(&self) -> ApiResult<Vec<Channel>> {
        self.or_demo("channels", self.primary.channels(), self.demo.channels())
            .await
    }

    async fn add_channel(&self, channel: &NewChannel) -> ApiResult<Channel> {
        self.or_notice("add channel", self.primary.add_channel(channel))
            .await
    }

    async fn update_channel(&self, id: ChannelId, channel: &NewChannel) -> ApiResult<Channel> {
        self.or_notice("update channel", self.primary.update_channel(id, channel))
            .await
    }

    async fn delete_channel(&self, id: ChannelId) -> ApiResult<ActionReply> {
        self.or_notice("delete channel", self.primary.delete_channel(id))
            .await
    }

    async fn base_settings(&self) -> ApiResult<BaseSettings> {
        self.or_demo(
            "settings",
            self.primary.base_settings(),
            self.demo.base_settings(),
        )
        .await
    }

    async fn update_base_settings(&self, settings: &BaseSettings) -> ApiResult<ActionReply> {
        self.or_notice("save settings", self.primary.update_base_settings(settings))
            .await
    }

    async fn today_profit(&self) -> ApiResult<f64> {
        self.or_demo(
            "today's profit",
            self.primary.today_profit(),
            self.demo.today_profit(),
        )
        .await
    }

    async fn trading_status(&self) -> ApiResult<TradingStatus> {
        self.or_demo(
            "trading status",
            self.primary.trading_status(),
            self.demo.trading_status(),
        )
        .await
    }

    async fn stop_trading(&self) -> ApiResult<ActionReply> {
        self.or_notice("stop trading", self.primary.stop_trading())
            .await
    }

    async fn resume_trading(&self) -> ApiResult<ActionReply> {
        self.or_notice("resume trading", self.primary.resume_trading())
            .await
    }

    /// Health is never faked.
    async fn health(&self) -> ApiResult<ActionReply> {
        self.or_notice("reach the backend", self.primary.health())
            .await
    }
}
