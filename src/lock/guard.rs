use serde::Serialize;
use thiserror::Error;

use super::{LockState, TimeOfDay, MARTINGALE_GATES};
use crate::types::{Signal, SignalPatch, SignalStatus};

/// Row-level actions offered for a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SignalActions {
    pub view: bool,
    pub edit: bool,
    pub delete: bool,
}

impl SignalActions {
    pub fn for_status(status: SignalStatus) -> Self {
        Self {
            view: true,
            edit: status != SignalStatus::Completed,
            delete: true,
        }
    }

    pub fn for_signal(signal: &Signal) -> Self {
        Self::for_status(signal.status)
    }
}

/// Field flags after the completed-status rule is layered over the time gates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EditPermissions {
    pub edit_enabled: bool,
    pub fields: LockState,
}

impl EditPermissions {
    pub fn resolve(lock: LockState, status: SignalStatus) -> Self {
        if SignalActions::for_status(status).edit {
            Self {
                edit_enabled: true,
                fields: lock,
            }
        } else {
            Self {
                edit_enabled: false,
                fields: LockState::LOCKED,
            }
        }
    }

    pub fn can_edit_basic(&self) -> bool {
        self.edit_enabled && self.fields.can_edit_basic()
    }

    /// Stake slot `index` of `martingale_amounts` (0 = entry stake).
    pub fn can_edit_amount(&self, index: usize) -> bool {
        self.edit_enabled && self.fields.can_edit_martingale(index)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PatchError {
    #[error("signal {0} is completed and can no longer be edited")]
    Completed(String),
    #[error("`{field}` is locked")]
    Locked { field: String },
}

/// Rejects a patch that changes any field whose group is locked.
///
/// Sending back an unchanged value for a locked field is fine; edit forms
/// submit every field they show.
pub fn check_patch(
    original: &Signal,
    patch: &SignalPatch,
    perms: &EditPermissions,
) -> Result<(), PatchError> {
    if !perms.edit_enabled {
        if patch.is_empty() {
            return Ok(());
        }
        return Err(PatchError::Completed(original.message_id.to_string()));
    }

    if !perms.can_edit_basic() {
        let basic_changes = [
            ("pair", patch.pair.as_ref().is_some_and(|p| p.trim() != original.pair.trim())),
            (
                "base_amount",
                patch.base_amount.is_some_and(|a| !same_amount(a, original.base_amount)),
            ),
            (
                "entry_time",
                patch
                    .entry_time
                    .as_deref()
                    .is_some_and(|t| !same_time(t, &original.entry_time)),
            ),
            ("direction", patch.direction.is_some_and(|d| d != original.direction)),
            (
                "trade_duration",
                patch
                    .trade_duration
                    .as_ref()
                    .is_some_and(|d| d.trim() != original.trade_duration.trim()),
            ),
        ];
        if let Some((field, _)) = basic_changes.iter().find(|(_, changed)| *changed) {
            return Err(PatchError::Locked {
                field: (*field).to_string(),
            });
        }
    }

    if let Some(amounts) = &patch.martingale_amounts {
        let slots = amounts.len().max(original.martingale_amounts.len());
        for index in 0..slots {
            let before = original.martingale_amounts.get(index).copied();
            let after = amounts.get(index).copied();
            let changed = match (before, after) {
                (Some(a), Some(b)) => !same_amount(a, b),
                (None, None) => false,
                _ => true,
            };
            if changed && !perms.can_edit_amount(index) {
                return Err(PatchError::Locked {
                    field: amount_field(index),
                });
            }
        }
    }

    Ok(())
}

fn amount_field(index: usize) -> String {
    if index == 0 {
        "martingale_amounts[0] (entry stake)".to_string()
    } else {
        format!(
            "martingale_amounts[{index}] (level {})",
            index.min(MARTINGALE_GATES)
        )
    }
}

fn same_amount(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.005
}

fn same_time(a: &str, b: &str) -> bool {
    match (TimeOfDay::parse(a), TimeOfDay::parse(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.trim() == b.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, MessageId};

    fn signal() -> Signal {
        serde_json::from_value(serde_json::json!({
            "message_id": 7,
            "pair": "EUR/USD",
            "base_amount": 25.0,
            "entry_time": "14:30",
            "direction": "BUY",
            "trade_duration": "5 minutes",
            "martingale_times": ["14:35", "14:40", "14:45"],
            "martingale_amounts": [25.0, 56.25, 126.56, 284.77],
            "is_status": "pending"
        }))
        .unwrap()
    }

    fn basic_locked() -> EditPermissions {
        let mut lock = LockState::UNLOCKED;
        lock.basic_info = false;
        EditPermissions::resolve(lock, SignalStatus::Pending)
    }

    #[test]
    fn completed_disables_everything() {
        let perms = EditPermissions::resolve(LockState::UNLOCKED, SignalStatus::Completed);
        assert!(!perms.can_edit_basic());
        assert!(!perms.can_edit_amount(2));
        assert!(!SignalActions::for_status(SignalStatus::Completed).edit);
        assert!(SignalActions::for_status(SignalStatus::Completed).delete);
        assert!(SignalActions::for_status(SignalStatus::Expired).edit);
    }

    #[test]
    fn locked_basic_field_rejected() {
        let s = signal();
        let patch = SignalPatch {
            direction: Some(Direction::Sell),
            ..Default::default()
        };
        assert_eq!(
            check_patch(&s, &patch, &basic_locked()),
            Err(PatchError::Locked {
                field: "direction".into()
            })
        );
    }

    #[test]
    fn unchanged_locked_values_pass() {
        let s = signal();
        let patch = SignalPatch {
            pair: Some("EUR/USD".into()),
            entry_time: Some("14:30:00".into()),
            base_amount: Some(25.0),
            martingale_amounts: Some(vec![25.0, 60.0, 126.56, 284.77]),
            is_available_martingale_level: Some(1),
            ..Default::default()
        };
        assert_eq!(check_patch(&s, &patch, &basic_locked()), Ok(()));
    }

    #[test]
    fn amount_slots_follow_their_level() {
        let s = signal();
        let mut lock = LockState::UNLOCKED;
        lock.martingale[2] = false;
        let perms = EditPermissions::resolve(lock, SignalStatus::Pending);

        let level_two = SignalPatch {
            martingale_amounts: Some(vec![25.0, 56.25, 130.0, 284.77]),
            ..Default::default()
        };
        assert_eq!(check_patch(&s, &level_two, &perms), Ok(()));

        let level_four = SignalPatch {
            martingale_amounts: Some(vec![25.0, 56.25, 126.56, 300.0]),
            ..Default::default()
        };
        assert!(matches!(
            check_patch(&s, &level_four, &perms),
            Err(PatchError::Locked { field }) if field.contains("level 3")
        ));
    }

    #[test]
    fn entry_stake_is_basic() {
        let s = signal();
        let patch = SignalPatch {
            martingale_amounts: Some(vec![30.0, 56.25, 126.56, 284.77]),
            ..Default::default()
        };
        assert!(check_patch(&s, &patch, &basic_locked()).is_err());
    }

    #[test]
    fn completed_rejects_any_change() {
        let mut s = signal();
        s.status = SignalStatus::Completed;
        s.message_id = MessageId(99);
        let perms = EditPermissions::resolve(LockState::UNLOCKED, s.status);
        let patch = SignalPatch {
            is_available_martingale_level: Some(2),
            ..Default::default()
        };
        assert_eq!(
            check_patch(&s, &patch, &perms),
            Err(PatchError::Completed("99".into()))
        );
    }
}
