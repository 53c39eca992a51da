use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use super::{accept, ApiError, ApiResult, DeskApi, TodayProfit};
use crate::config::DeskConfig;
use crate::report::{ReportFilter, ReportStats};
use crate::types::{
    ActionReply, BaseSettings, Bot, BotId, Channel, ChannelId, MessageId, NewChannel, Signal,
    SignalPatch, SignalQuery, StartBotRequest, StopBotRequest, TradingStatus,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// reqwest-backed [`DeskApi`].
#[derive(Clone, Debug)]
pub struct HttpApi {
    client: Client,
    base: Url,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let mut base = Url::parse(base_url.trim())?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        // `join` treats the last segment as a file unless the path ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self { client, base })
    }

    pub fn from_config(config: &DeskConfig) -> ApiResult<Self> {
        Self::new(&config.api_url, config.timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let url = self.url(path)?;
        tracing::debug!(method = %method, url = %url, "api request");
        Ok(self.client.request(method, url))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "api request failed");
            return Err(ApiError::from_status(status.as_u16(), &body));
        }

        let value: serde_json::Value = serde_json::from_str(&body)?;
        if value.get("error").is_some() {
            return Err(ApiError::from_status(status.as_u16(), &body));
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send(self.request(Method::GET, path)?).await
    }

    async fn get_query<T, Q>(&self, path: &str, query: &Q) -> ApiResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send(self.request(Method::GET, path)?.query(query)).await
    }

    async fn with_body<T, B>(&self, method: Method, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(self.request(method, path)?.json(body)).await
    }

    async fn action(&self, method: Method, path: &str) -> ApiResult<ActionReply> {
        accept(self.send(self.request(method, path)?).await?)
    }

    async fn action_with<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ApiResult<ActionReply> {
        accept(self.with_body(method, path, body).await?)
    }
}

#[async_trait]
impl DeskApi for HttpApi {
    async fn bots_status(&self) -> ApiResult<Vec<Bot>> {
        self.get("/api/bots/status").await
    }

    async fn start_bot(&self, req: &StartBotRequest) -> ApiResult<ActionReply> {
        self.action_with(Method::POST, "/api/bots/start", req).await
    }

    async fn stop_bot(&self, bot: &BotId) -> ApiResult<ActionReply> {
        let req = StopBotRequest {
            bot_id: bot.clone(),
        };
        self.action_with(Method::POST, "/api/bots/stop", &req).await
    }

    async fn today_signals(&self) -> ApiResult<Vec<Signal>> {
        self.get("/api/signals/today").await
    }

    async fn all_signals(&self, query: &SignalQuery) -> ApiResult<Vec<Signal>> {
        self.get_query("/api/signals/all", query).await
    }

    async fn add_signal(&self, signal: &Signal) -> ApiResult<ActionReply> {
        self.action_with(Method::POST, "/api/signals", signal).await
    }

    async fn update_signal(&self, id: MessageId, patch: &SignalPatch) -> ApiResult<ActionReply> {
        self.action_with(Method::PUT, &format!("/api/signals/{id}"), patch)
            .await
    }

    async fn delete_signal(&self, id: MessageId) -> ApiResult<ActionReply> {
        self.action(Method::DELETE, &format!("/api/signals/{id}"))
            .await
    }

    async fn results(&self, filter: &ReportFilter) -> ApiResult<Vec<Signal>> {
        self.get_query("/api/results", filter).await
    }

    async fn results_stats(&self, filter: &ReportFilter) -> ApiResult<ReportStats> {
        self.get_query("/api/results/stats", filter).await
    }

    async fn channels(&self) -> ApiResult<Vec<Channel>> {
        self.get("/api/channels").await
    }

    async fn add_channel(&self, channel: &NewChannel) -> ApiResult<Channel> {
        self.with_body(Method::POST, "/api/channels", channel).await
    }

    async fn update_channel(&self, id: ChannelId, channel: &NewChannel) -> ApiResult<Channel> {
        self.with_body(Method::PUT, &format!("/api/channels/{}", id.0), channel)
            .await
    }

    async fn delete_channel(&self, id: ChannelId) -> ApiResult<ActionReply> {
        self.action(Method::DELETE, &format!("/api/channels/{}", id.0))
            .await
    }

    async fn base_settings(&self) -> ApiResult<BaseSettings> {
        self.get("/api/settings/base").await
    }

    async fn update_base_settings(&self, settings: &BaseSettings) -> ApiResult<ActionReply> {
        self.action_with(Method::PUT, "/api/settings/base", settings)
            .await
    }

    async fn today_profit(&self) -> ApiResult<f64> {
        let profit: TodayProfit = self.get("/api/settings/today-profit").await?;
        Ok(profit.value())
    }

    async fn trading_status(&self) -> ApiResult<TradingStatus> {
        self.get("/api/settings/trading-status").await
    }

    async fn stop_trading(&self) -> ApiResult<ActionReply> {
        self.action(Method::POST, "/api/settings/stop-trading").await
    }

    async fn resume_trading(&self) -> ApiResult<ActionReply> {
        self.action(Method::POST, "/api/settings/resume-trading")
            .await
    }

    async fn health(&self) -> ApiResult<ActionReply> {
        self.action(Method::GET, "/api/health").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_under_base() {
        let api = HttpApi::new("http://desk.local:8000/backend", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            api.url("/api/signals/today").unwrap().as_str(),
            "http://desk.local:8000/backend/api/signals/today"
        );
        let api = HttpApi::new(DEFAULT_BASE_URL, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            api.url("/api/health").unwrap().as_str(),
            "http://localhost:8000/api/health"
        );
    }

    #[test]
    fn rejects_bad_base() {
        assert!(matches!(
            HttpApi::new("not a url", DEFAULT_TIMEOUT),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpApi::new("mailto:ops@example.com", DEFAULT_TIMEOUT),
            Err(ApiError::InvalidUrl(_))
        ));
    }
}
