use chrono::NaiveDateTime;
use dashmap::DashMap;

use super::{EditLockPolicy, LockState};
use crate::types::{MessageId, Signal};

/// Remembers every lock a signal has shown so that none re-opens.
///
/// The evaluator re-reads times of day against today's date; after midnight a
/// locked group would look editable again. Observing through the latch folds
/// each fresh evaluation into the stored one, so locks only accumulate.
#[derive(Debug, Default)]
pub struct LockLatch {
    policy: EditLockPolicy,
    states: DashMap<MessageId, LockState>,
}

impl LockLatch {
    pub fn new(policy: EditLockPolicy) -> Self {
        Self {
            policy,
            states: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &EditLockPolicy {
        &self.policy
    }

    pub fn observe(&self, now: NaiveDateTime, signal: &Signal) -> LockState {
        let fresh = self.policy.evaluate(now, signal);
        let mut entry = self
            .states
            .entry(signal.message_id)
            .or_insert(LockState::UNLOCKED);
        let latched = entry.tighten(fresh);
        if latched != *entry {
            tracing::debug!(message_id = %signal.message_id, state = %latched, "edit lock tightened");
        }
        *entry = latched;
        latched
    }

    pub fn latched(&self, id: MessageId) -> Option<LockState> {
        self.states.get(&id).map(|s| *s)
    }

    pub fn forget(&self, id: MessageId) -> Option<LockState> {
        self.states.remove(&id).map(|(_, s)| s)
    }

    /// Drops every record not in `keep` (signals gone from the backend).
    pub fn retain(&self, keep: impl Fn(MessageId) -> bool) {
        self.states.retain(|id, _| keep(*id));
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn signal() -> Signal {
        serde_json::from_value(serde_json::json!({
            "message_id": 3,
            "pair": "GBP/JPY",
            "entry_time": "23:59:30",
            "direction": "SELL",
            "martingale_times": [],
            "is_status": "pending"
        }))
        .unwrap()
    }

    #[test]
    fn lock_survives_midnight() {
        let latch = LockLatch::default();
        let s = signal();
        let before = NaiveDate::from_ymd_opt(2025, 7, 29)
            .unwrap()
            .and_hms_opt(23, 59, 25)
            .unwrap();

        assert!(!latch.observe(before, &s).basic_info);

        // Same time-of-day read against the next date looks open again.
        let after = before + Duration::seconds(60);
        assert!(EditLockPolicy::default().evaluate(after, &s).basic_info);
        assert!(!latch.observe(after, &s).basic_info);
    }

    #[test]
    fn forget_drops_record() {
        let latch = LockLatch::default();
        let s = signal();
        let now = NaiveDate::from_ymd_opt(2025, 7, 29)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        latch.observe(now, &s);
        assert_eq!(latch.latched(s.message_id), Some(LockState::UNLOCKED));
        assert_eq!(latch.forget(s.message_id), Some(LockState::UNLOCKED));
        assert!(latch.is_empty());
    }
}
