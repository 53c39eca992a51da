use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::BoardError;
use crate::api::DeskApi;
use crate::clock::Clock;
use crate::lock::{guard, EditLockPolicy, EditPermissions, LockLatch, LockState, SignalActions, TimeOfDay};
use crate::notify::{Notice, NotificationCenter};
use crate::parse::{self, Arrival};
use crate::report::BoardStats;
use crate::schedule::{self, TradeDuration, DEFAULT_MARTINGALE_LEVELS};
use crate::types::{
    Direction, MessageId, Signal, SignalPatch, SignalQuery, SignalStatus, TradeResult,
};

/// Payout assumed for signals typed in by hand.
pub const MANUAL_PAYOUT_PERCENT: f64 = 80.0;

/// Fields of the "add signal" dialog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewSignal {
    pub pair: String,
    pub base_amount: f64,
    pub entry_time: String,
    pub direction: Direction,
    pub trade_duration: String,
}

impl Default for NewSignal {
    fn default() -> Self {
        Self {
            pair: String::new(),
            base_amount: 25.0,
            entry_time: String::new(),
            direction: Direction::Buy,
            trade_duration: TradeDuration::M5.label().to_string(),
        }
    }
}

impl NewSignal {
    pub fn validate(&self) -> Result<(), BoardError> {
        if self.pair.trim().is_empty() {
            return Err(BoardError::Invalid("pair is required".into()));
        }
        if self.base_amount.is_nan() || self.base_amount <= 0.0 {
            return Err(BoardError::Invalid("base amount must be positive".into()));
        }
        if TimeOfDay::parse(&self.entry_time).is_none() {
            return Err(BoardError::Invalid(format!(
                "entry time {:?} is not HH:MM",
                self.entry_time
            )));
        }
        self.trade_duration.parse::<TradeDuration>()?;
        Ok(())
    }
}

/// A pending signal entered by hand at `now`. Martingale times follow from the
/// entry time and duration the same way the runner derives them.
pub fn new_manual_signal(now: NaiveDateTime, form: &NewSignal) -> Signal {
    let pair = form.pair.trim().to_string();
    let entry_time = form.entry_time.trim().to_string();
    let martingale_times = schedule::martingale_times_for(
        &entry_time,
        &form.trade_duration,
        DEFAULT_MARTINGALE_LEVELS,
    )
    .unwrap_or_default();
    let end_time = match (
        TimeOfDay::parse(&entry_time),
        form.trade_duration.parse::<TradeDuration>(),
    ) {
        (Some(entry), Ok(duration)) => schedule::trade_end_time(entry, duration),
        _ => String::new(),
    };

    Signal {
        message_id: MessageId(now.and_utc().timestamp_millis()),
        channel_type: "manual".to_string(),
        received_at: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        is_otc: pair.to_ascii_lowercase().contains("otc"),
        raw_text: format!("{} {} {}", pair, form.direction, entry_time),
        pair,
        base_amount: form.base_amount,
        entry_time,
        direction: form.direction,
        trade_duration: form.trade_duration.trim().to_string(),
        end_time,
        martingale_times,
        martingale_amounts: Vec::new(),
        is_available_martingale_level: DEFAULT_MARTINGALE_LEVELS as u32,
        status: SignalStatus::Pending,
        trading_result: None,
        payout_percent: MANUAL_PAYOUT_PERCENT,
        trade_level: 0,
        total_profit: 0.0,
        total_staked: 0.0,
        is_executed: false,
    }
}

/// An open edit dialog: the row as it was when opened, the permissions it was
/// opened with, and the pending changes.
#[derive(Clone, Debug, PartialEq)]
pub struct EditSession {
    pub original: Signal,
    pub opened_with: EditPermissions,
    pub draft: SignalPatch,
}

impl EditSession {
    pub fn message_id(&self) -> MessageId {
        self.original.message_id
    }
}

/// Signals page: today's live rows plus the full history.
pub struct SignalBoard {
    api: Arc<dyn DeskApi>,
    clock: Arc<dyn Clock>,
    notices: Arc<NotificationCenter>,
    latch: LockLatch,
    min_payout: Option<f64>,
    loaded: bool,
    live: Vec<Signal>,
    all: Vec<Signal>,
}

impl SignalBoard {
    pub fn new(
        api: Arc<dyn DeskApi>,
        clock: Arc<dyn Clock>,
        notices: Arc<NotificationCenter>,
    ) -> Self {
        Self::with_policy(api, clock, notices, EditLockPolicy::default())
    }

    pub fn with_policy(
        api: Arc<dyn DeskApi>,
        clock: Arc<dyn Clock>,
        notices: Arc<NotificationCenter>,
        policy: EditLockPolicy,
    ) -> Self {
        Self {
            api,
            clock,
            notices,
            latch: LockLatch::new(policy),
            min_payout: None,
            loaded: false,
            live: Vec::new(),
            all: Vec::new(),
        }
    }

    /// Payout below which newly arrived signals raise a warning.
    pub fn set_min_payout(&mut self, percent: Option<f64>) {
        self.min_payout = percent;
    }

    /// Refetches both lists. After the first load, rows that appeared or
    /// settled since the previous one raise notices.
    pub async fn load(&mut self) -> Result<(), BoardError> {
        let today = self.api.today_signals().await?;
        let all = self.api.all_signals(&SignalQuery::default()).await?;
        if self.loaded {
            self.notices
                .extend(arrival_notices(&self.all, &all, self.min_payout));
        }
        self.loaded = true;
        self.live = today.into_iter().filter(Signal::is_live).collect();
        self.all = all;
        self.latch.retain(|id| {
            self.live.iter().any(|s| s.message_id == id) || self.all.iter().any(|s| s.message_id == id)
        });
        tracing::info!(live = self.live.len(), all = self.all.len(), "signals loaded");
        Ok(())
    }

    pub fn live(&self) -> &[Signal] {
        &self.live
    }

    pub fn all(&self) -> &[Signal] {
        &self.all
    }

    pub fn get(&self, id: MessageId) -> Option<&Signal> {
        self.live
            .iter()
            .chain(self.all.iter())
            .find(|s| s.message_id == id)
    }

    pub fn stats(&self) -> BoardStats {
        BoardStats::compute(&self.all)
    }

    pub fn live_stats(&self) -> BoardStats {
        BoardStats::compute(&self.live)
    }

    pub fn winners(&self) -> Vec<&Signal> {
        self.with_result(TradeResult::Win)
    }

    pub fn losers(&self) -> Vec<&Signal> {
        self.with_result(TradeResult::Loss)
    }

    fn with_result(&self, result: TradeResult) -> Vec<&Signal> {
        self.all
            .iter()
            .filter(|s| s.trading_result == Some(result))
            .collect()
    }

    /// Pending or processing, from the full history.
    pub fn pending(&self) -> Vec<&Signal> {
        self.all.iter().filter(|s| s.is_live()).collect()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Latched lock state of `id` as of now.
    pub fn lock_state(&self, id: MessageId) -> Option<LockState> {
        let now = self.clock.now();
        self.get(id).map(|s| self.latch.observe(now, s))
    }

    /// Lock states of all live rows, re-evaluated at `now`. Meant to be
    /// called from the one-second tick.
    pub fn refresh_locks(&self, now: NaiveDateTime) -> Vec<(MessageId, LockState)> {
        self.live
            .iter()
            .map(|s| (s.message_id, self.latch.observe(now, s)))
            .collect()
    }

    pub fn actions(&self, id: MessageId) -> Option<SignalActions> {
        self.get(id).map(SignalActions::for_signal)
    }

    pub fn permissions(&self, id: MessageId) -> Option<EditPermissions> {
        let now = self.clock.now();
        self.get(id)
            .map(|s| EditPermissions::resolve(self.latch.observe(now, s), s.status))
    }

    /// Opens the edit dialog. Rows whose edit action is disabled never open.
    pub fn open_edit(&self, id: MessageId) -> Result<EditSession, BoardError> {
        let signal = self.get(id).ok_or(BoardError::NotFound(id))?;
        if !SignalActions::for_signal(signal).edit {
            return Err(guard::PatchError::Completed(id.to_string()).into());
        }
        Ok(self.session(signal))
    }

    fn session(&self, signal: &Signal) -> EditSession {
        let opened_with =
            EditPermissions::resolve(self.latch.observe(self.clock.now(), signal), signal.status);
        EditSession {
            original: signal.clone(),
            opened_with,
            draft: SignalPatch::default(),
        }
    }

    /// Re-checks the draft against the locks as of now (time has moved since
    /// the dialog opened), sends it, then mirrors it locally.
    pub async fn save_edit(&mut self, session: EditSession) -> Result<Signal, BoardError> {
        let id = session.message_id();
        let current = self.get(id).ok_or(BoardError::NotFound(id))?.clone();
        let perms = EditPermissions::resolve(
            self.latch.observe(self.clock.now(), &current),
            current.status,
        );
        guard::check_patch(&current, &session.draft, &perms)?;
        if session.draft.is_empty() {
            return Ok(current);
        }

        self.api.update_signal(id, &session.draft).await?;
        let updated = self.apply_local(id, &session.draft);
        self.notices
            .push(Notice::success("Signal", "Signal updated successfully"));
        tracing::info!(message_id = %id, "signal updated");
        updated.ok_or(BoardError::NotFound(id))
    }

    /// Applies `patch` without the dialog; the lock guard alone decides, so an
    /// empty patch on a completed signal is a no-op.
    pub async fn update(&mut self, id: MessageId, patch: SignalPatch) -> Result<Signal, BoardError> {
        let signal = self.get(id).ok_or(BoardError::NotFound(id))?;
        let mut session = self.session(signal);
        session.draft = patch;
        self.save_edit(session).await
    }

    fn apply_local(&mut self, id: MessageId, patch: &SignalPatch) -> Option<Signal> {
        let reschedule = patch.entry_time.is_some() || patch.trade_duration.is_some();
        let mut updated = None;
        for s in self
            .live
            .iter_mut()
            .chain(self.all.iter_mut())
            .filter(|s| s.message_id == id)
        {
            s.apply(patch);
            if reschedule {
                if let Ok(times) = schedule::martingale_times_for(
                    &s.entry_time,
                    &s.trade_duration,
                    DEFAULT_MARTINGALE_LEVELS,
                ) {
                    s.martingale_times = times;
                }
            }
            updated = Some(s.clone());
        }
        updated
    }

    pub async fn add(&mut self, form: &NewSignal) -> Result<Signal, BoardError> {
        form.validate()?;
        let signal = new_manual_signal(self.clock.now(), form);
        self.insert(signal).await
    }

    /// Adds a signal pasted as channel message text. Text that does not read
    /// as a signal never reaches the backend.
    pub async fn add_text(&mut self, text: &str, base_amount: f64) -> Result<Signal, BoardError> {
        let now = self.clock.now();
        let arrival = Arrival {
            message_id: MessageId(now.and_utc().timestamp_millis()),
            channel_type: "manual".to_string(),
            base_amount,
            martingale_levels: DEFAULT_MARTINGALE_LEVELS as u32,
        };
        let signal = parse::signal_from_text(text, &arrival, now)
            .ok_or_else(|| BoardError::Invalid("message text is not a signal".into()))?;
        self.insert(signal).await
    }

    async fn insert(&mut self, signal: Signal) -> Result<Signal, BoardError> {
        self.api.add_signal(&signal).await?;
        if signal.is_live() {
            self.live.insert(0, signal.clone());
        }
        self.all.insert(0, signal.clone());
        self.notices
            .push(Notice::new_signal(&signal.pair, signal.direction, &signal.entry_time));
        Ok(signal)
    }

    pub async fn remove(&mut self, id: MessageId) -> Result<(), BoardError> {
        self.api.delete_signal(id).await?;
        self.live.retain(|s| s.message_id != id);
        self.all.retain(|s| s.message_id != id);
        self.latch.forget(id);
        self.notices
            .push(Notice::success("Signal", "Signal deleted successfully"));
        Ok(())
    }
}

fn arrival_notices(before: &[Signal], after: &[Signal], min_payout: Option<f64>) -> Vec<Notice> {
    let mut notices = Vec::new();
    for s in after {
        match before.iter().find(|b| b.message_id == s.message_id) {
            None => {
                notices.push(Notice::new_signal(&s.pair, s.direction, &s.entry_time));
                if let Some(threshold) = min_payout {
                    if s.payout_percent > 0.0 && s.payout_percent < threshold {
                        notices.push(Notice::low_payout(&s.pair, s.payout_percent, threshold));
                    }
                }
            }
            Some(prev) => {
                let settled = prev.status != SignalStatus::Completed
                    && s.status == SignalStatus::Completed;
                if settled && s.trading_result == Some(TradeResult::Win) {
                    notices.push(Notice::trade_success(&s.pair, s.direction, s.total_profit));
                }
            }
        }
    }
    notices
}

impl std::fmt::Debug for SignalBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBoard")
            .field("live", &self.live.len())
            .field("all", &self.all.len())
            .field("latched", &self.latch.len())
            .finish()
    }
}
