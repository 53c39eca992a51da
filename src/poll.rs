//! Background refresh: the per-second "now" tick that drives lock
//! re-evaluation, and the periodic bot/trading-status poll.
//!
//! Each task lives behind a [`PollHandle`]; dropping the handle stops it.
//! Values are published on `watch` channels, so readers only ever see the
//! latest one.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::DeskApi;
use crate::clock::Clock;
use crate::notify::{Notice, NotificationCenter};
use crate::risk::StatusWatcher;
use crate::types::{Bot, TradingStatus};

/// Owns a spawned poll task and aborts it on drop.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Same as dropping the handle.
    pub fn stop(self) {}
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn interval(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Publishes `clock.now()` every `period`.
pub fn spawn_ticker(
    clock: Arc<dyn Clock>,
    period: Duration,
) -> (PollHandle, watch::Receiver<NaiveDateTime>) {
    let (tx, rx) = watch::channel(clock.now());
    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            if tx.send(clock.now()).is_err() {
                break;
            }
        }
    });
    (PollHandle::new(task), rx)
}

/// Latest view of the backend's bots and kill-switch.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub bots: Vec<Bot>,
    pub trading: Option<TradingStatus>,
    pub polls: u64,
    pub last_error: Option<String>,
}

/// Re-fetches bot and trading status every `period`, raising notices when the
/// trading status changes in a way worth telling about.
pub fn spawn_status_poll(
    api: Arc<dyn DeskApi>,
    notices: Arc<NotificationCenter>,
    period: Duration,
) -> (PollHandle, watch::Receiver<StatusSnapshot>) {
    let (tx, rx) = watch::channel(StatusSnapshot::default());
    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        let mut watcher = StatusWatcher::new();
        let mut snapshot = StatusSnapshot::default();
        let mut reachable = true;
        loop {
            ticker.tick().await;
            snapshot.polls += 1;
            snapshot.last_error = None;

            match api.bots_status().await {
                Ok(bots) => snapshot.bots = bots,
                Err(err) => {
                    tracing::warn!(%err, "bot status poll failed");
                    snapshot.last_error = Some(err.to_string());
                }
            }
            match api.trading_status().await {
                Ok(status) => {
                    notices.extend(watcher.observe(status.clone()));
                    snapshot.trading = Some(status);
                }
                Err(err) => {
                    tracing::warn!(%err, "trading status poll failed");
                    snapshot.last_error = Some(err.to_string());
                }
            }

            // Only the first failure of a streak is worth a notice.
            match (&snapshot.last_error, reachable) {
                (Some(err), true) => {
                    notices.push(Notice::connection_issue("Backend", err));
                    reachable = false;
                }
                (None, false) => reachable = true,
                _ => {}
            }

            tracing::debug!(polls = snapshot.polls, bots = snapshot.bots.len(), "status polled");
            if tx.send(snapshot.clone()).is_err() {
                break;
            }
        }
    });
    (PollHandle::new(task), rx)
}
