use serde::Serialize;
use std::sync::Arc;

use super::BoardError;
use crate::api::DeskApi;
use crate::notify::{Notice, NotificationCenter};
use crate::types::{ActionReply, Bot, BotId, BotState, StartBotRequest};

/// Bots the manager knows how to launch, with their entry scripts.
pub const KNOWN_BOTS: [(&str, &str, &str); 3] = [
    (
        "telegram_listener",
        "telegram_listener_client.py",
        "Monitors Telegram channels for trading signals",
    ),
    (
        "trade_signal_runner",
        "trade_signal_runner.py",
        "Executes trades based on received signals",
    ),
    (
        "api_bot_manager",
        "api_bot_manager.py",
        "Manages bot lifecycle and API endpoints",
    ),
];

pub fn script_for(id: &str) -> &'static str {
    KNOWN_BOTS
        .iter()
        .find(|(known, _, _)| *known == id)
        .map(|(_, script, _)| *script)
        .unwrap_or("unknown.py")
}

pub fn description_for(id: &str) -> &'static str {
    KNOWN_BOTS
        .iter()
        .find(|(known, _, _)| *known == id)
        .map(|(_, _, description)| *description)
        .unwrap_or("Trading bot component")
}

/// One line of the bots table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BotRow {
    pub id: BotId,
    pub script: &'static str,
    pub description: &'static str,
    pub status: BotState,
    pub pid: Option<u32>,
    pub log: Option<String>,
}

/// Bots page.
pub struct BotPanel {
    api: Arc<dyn DeskApi>,
    notices: Arc<NotificationCenter>,
    working_dir: Option<String>,
    reported: Vec<Bot>,
}

impl BotPanel {
    pub fn new(
        api: Arc<dyn DeskApi>,
        notices: Arc<NotificationCenter>,
        working_dir: Option<String>,
    ) -> Self {
        Self {
            api,
            notices,
            working_dir,
            reported: Vec::new(),
        }
    }

    pub async fn load(&mut self) -> Result<(), BoardError> {
        self.reported = self.api.bots_status().await?;
        Ok(())
    }

    /// Replace the reported state, e.g. from a status poll snapshot.
    pub fn set_reported(&mut self, bots: Vec<Bot>) {
        self.reported = bots;
    }

    /// Known bots first (stopped unless reported otherwise), then anything
    /// else the manager reported.
    pub fn rows(&self) -> Vec<BotRow> {
        let mut rows: Vec<BotRow> = KNOWN_BOTS
            .iter()
            .map(|(id, _, _)| {
                let reported = self.reported.iter().find(|b| b.id.0 == *id);
                row(BotId(id.to_string()), reported)
            })
            .collect();
        rows.extend(
            self.reported
                .iter()
                .filter(|b| !KNOWN_BOTS.iter().any(|(id, _, _)| b.id.0 == *id))
                .map(|b| row(b.id.clone(), Some(b))),
        );
        rows
    }

    pub fn running_count(&self) -> usize {
        self.reported
            .iter()
            .filter(|b| b.status == BotState::Running)
            .count()
    }

    pub async fn start(&mut self, id: &BotId) -> Result<ActionReply, BoardError> {
        let req = StartBotRequest {
            bot_id: id.clone(),
            script: script_for(&id.0).to_string(),
            working_dir: self.working_dir.clone(),
        };
        match self.api.start_bot(&req).await {
            Ok(reply) => {
                tracing::info!(bot = %id, status = %reply.status, pid = ?reply.pid, "start requested");
                self.notices.push(Notice::success(
                    "Bot",
                    format!("Bot {id} started successfully"),
                ));
                self.refresh().await;
                Ok(reply)
            }
            Err(err) => {
                self.notices
                    .push(Notice::error("Bot", format!("Failed to start bot {id}")));
                Err(err.into())
            }
        }
    }

    pub async fn stop(&mut self, id: &BotId) -> Result<ActionReply, BoardError> {
        match self.api.stop_bot(id).await {
            Ok(reply) => {
                tracing::info!(bot = %id, status = %reply.status, "stop requested");
                self.notices.push(Notice::success(
                    "Bot",
                    format!("Bot {id} stopped successfully"),
                ));
                self.refresh().await;
                Ok(reply)
            }
            Err(err) => {
                self.notices
                    .push(Notice::error("Bot", format!("Failed to stop bot {id}")));
                Err(err.into())
            }
        }
    }

    async fn refresh(&mut self) {
        match self.api.bots_status().await {
            Ok(bots) => self.reported = bots,
            Err(err) => tracing::warn!(%err, "bot status refresh failed"),
        }
    }
}

fn row(id: BotId, reported: Option<&Bot>) -> BotRow {
    BotRow {
        script: script_for(&id.0),
        description: description_for(&id.0),
        status: reported.map_or(BotState::Stopped, |b| b.status),
        pid: reported.and_then(|b| b.pid),
        log: reported.and_then(|b| b.log.clone()),
        id,
    }
}
