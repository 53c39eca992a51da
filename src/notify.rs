//! Transient notices and the notification centre.

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::clock::Clock;

/// Entries kept by the centre; older ones fall off the back.
pub const DEFAULT_CAPACITY: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoticeLevel::Success => "success",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        })
    }
}

/// A user-facing message, before the centre stamps it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, title, message)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title, message)
    }

    pub fn trade_success(pair: &str, direction: impl fmt::Display, profit: f64) -> Self {
        let sign = if profit >= 0.0 { "+" } else { "" };
        Self::success(
            "Trade Executed Successfully",
            format!("{pair} {direction} - Profit: {sign}${profit:.2}"),
        )
    }

    pub fn new_signal(pair: &str, direction: impl fmt::Display, time: &str) -> Self {
        Self::info("New Signal Received", format!("{pair} {direction} at {time}"))
    }

    pub fn low_payout(pair: &str, payout: f64, threshold: f64) -> Self {
        Self::warning(
            "Low Payout Detected",
            format!("{pair} payout: {payout}% (below {threshold}% threshold)"),
        )
    }

    pub fn target_reached(profit: f64, target: f64) -> Self {
        Self::success(
            "Daily Target Reached",
            format!("Profit: ${profit:.2} / ${target:.2} target achieved"),
        )
    }

    pub fn connection_issue(service: &str, message: impl fmt::Display) -> Self {
        Self::error("Connection Issue", format!("{service}: {message}"))
    }

    pub fn trading_stopped(reason: impl Into<String>) -> Self {
        Self::warning("Trading Stopped", reason)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.title, self.message)
    }
}

/// A notice as stored by the centre.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
    pub id: u64,
    #[serde(flatten)]
    pub notice: Notice,
    pub at: NaiveDateTime,
    pub read: bool,
}

#[derive(Default)]
struct Inner {
    entries: VecDeque<Notification>,
    toasts: VecDeque<Notification>,
}

/// Newest-first list of notifications plus a queue of toasts not yet shown.
pub struct NotificationCenter {
    clock: Arc<dyn Clock>,
    capacity: usize,
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl NotificationCenter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(clock, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            clock,
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn push(&self, notice: Notice) -> u64 {
        match notice.level {
            NoticeLevel::Error => tracing::error!(title = %notice.title, "{}", notice.message),
            NoticeLevel::Warning => tracing::warn!(title = %notice.title, "{}", notice.message),
            _ => tracing::info!(title = %notice.title, "{}", notice.message),
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Notification {
            id,
            notice,
            at: self.clock.now(),
            read: false,
        };
        let mut inner = self.inner.lock();
        if inner.toasts.len() == self.capacity {
            inner.toasts.pop_front();
        }
        inner.toasts.push_back(entry.clone());
        inner.entries.push_front(entry);
        inner.entries.truncate(self.capacity);
        id
    }

    pub fn extend(&self, notices: impl IntoIterator<Item = Notice>) {
        for notice in notices {
            self.push(notice);
        }
    }

    pub fn unread_count(&self) -> usize {
        self.inner.lock().entries.iter().filter(|n| !n.read).count()
    }

    pub fn mark_read(&self, id: u64) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&self) {
        for n in self.inner.lock().entries.iter_mut() {
            n.read = true;
        }
    }

    pub fn remove(&self, id: u64) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|n| n.id != id);
        inner.entries.len() != before
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    /// Toasts raised since the last drain, oldest first. Only the newest
    /// `capacity` are kept between drains.
    pub fn drain_toasts(&self) -> Vec<Notification> {
        self.inner.lock().toasts.drain(..).collect()
    }
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("capacity", &self.capacity)
            .field("len", &self.inner.lock().entries.len())
            .finish()
    }
}
