use std::sync::Arc;
use thiserror::Error;

use super::BoardError;
use crate::api::{demo, DeskApi};
use crate::notify::{Notice, NotificationCenter};
use crate::types::{BaseSettings, TradingStatus};

pub const TRADING_MODES: [&str; 2] = ["demo", "live"];
pub const MAX_MARTINGALE_LEVELS: u32 = 3;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("unknown trading mode {0:?}")]
    Mode(String),
}

/// Rejects values the runner cannot trade with.
pub fn validate(settings: &BaseSettings) -> Result<(), SettingsError> {
    let positive = [
        ("base_amount", settings.base_amount),
        ("daily_profit_target", settings.daily_profit_target),
        ("balance_reference", settings.balance_reference),
    ];
    for (field, value) in positive {
        if value.is_nan() || value <= 0.0 {
            return Err(SettingsError::NotPositive { field });
        }
    }
    if settings.current_balance.is_nan() || settings.current_balance < 0.0 {
        return Err(SettingsError::OutOfRange {
            field: "current_balance",
            min: 0.0,
            max: f64::INFINITY,
        });
    }
    percent("max_loss_percent", settings.max_loss_percent)?;
    if let Some(payout) = settings.min_payout_percent {
        percent("min_payout_percent", payout)?;
    }
    if let Some(mode) = &settings.trading_mode {
        if !TRADING_MODES.contains(&mode.as_str()) {
            return Err(SettingsError::Mode(mode.clone()));
        }
    }
    if let Some(levels) = settings.max_martingale_level {
        if !(1..=MAX_MARTINGALE_LEVELS).contains(&levels) {
            return Err(SettingsError::OutOfRange {
                field: "max_martingale_level",
                min: 1.0,
                max: f64::from(MAX_MARTINGALE_LEVELS),
            });
        }
    }
    Ok(())
}

fn percent(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if value.is_nan() || value <= 0.0 || value > 100.0 {
        return Err(SettingsError::OutOfRange {
            field,
            min: 0.0,
            max: 100.0,
        });
    }
    Ok(())
}

/// Settings page: the base risk parameters plus the trading kill-switch.
pub struct SettingsForm {
    api: Arc<dyn DeskApi>,
    notices: Arc<NotificationCenter>,
    saved: Option<BaseSettings>,
    draft: BaseSettings,
}

impl SettingsForm {
    pub fn new(api: Arc<dyn DeskApi>, notices: Arc<NotificationCenter>) -> Self {
        Self {
            api,
            notices,
            saved: None,
            draft: demo::default_settings(),
        }
    }

    pub async fn load(&mut self) -> Result<&BaseSettings, BoardError> {
        let settings = self.api.base_settings().await?;
        self.saved = Some(settings.clone());
        self.draft = settings;
        Ok(&self.draft)
    }

    pub fn draft(&self) -> &BaseSettings {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut BaseSettings {
        &mut self.draft
    }

    pub fn is_dirty(&self) -> bool {
        self.saved.as_ref() != Some(&self.draft)
    }

    pub async fn save(&mut self) -> Result<(), BoardError> {
        validate(&self.draft)?;
        match self.api.update_base_settings(&self.draft).await {
            Ok(_) => {
                self.saved = Some(self.draft.clone());
                self.notices
                    .push(Notice::success("Settings", "Settings saved successfully"));
                Ok(())
            }
            Err(err) => {
                self.notices
                    .push(Notice::error("Settings", "Failed to save settings"));
                Err(err.into())
            }
        }
    }

    /// Defaults for every field except the current balance, which reflects
    /// the account rather than a preference. Not saved until [`Self::save`].
    pub fn reset_to_defaults(&mut self) {
        let current_balance = self.draft.current_balance;
        self.draft = BaseSettings {
            current_balance,
            ..demo::default_settings()
        };
        self.notices
            .push(Notice::info("Settings", "Settings reset to defaults"));
    }

    pub async fn trading_status(&self) -> Result<TradingStatus, BoardError> {
        Ok(self.api.trading_status().await?)
    }

    pub async fn today_profit(&self) -> Result<f64, BoardError> {
        Ok(self.api.today_profit().await?)
    }

    pub async fn stop_trading(&self) -> Result<TradingStatus, BoardError> {
        self.api.stop_trading().await?;
        self.notices
            .push(Notice::warning("Trading", "Trading manually stopped"));
        self.trading_status().await
    }

    pub async fn resume_trading(&self) -> Result<TradingStatus, BoardError> {
        self.api.resume_trading().await?;
        self.notices.push(Notice::success("Trading", "Trading resumed"));
        self.trading_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate(&demo::default_settings()), Ok(()));
    }

    #[test]
    fn rejects_bad_values() {
        let mut s = demo::default_settings();
        s.base_amount = 0.0;
        assert_eq!(
            validate(&s),
            Err(SettingsError::NotPositive { field: "base_amount" })
        );

        let mut s = demo::default_settings();
        s.max_loss_percent = 150.0;
        assert!(matches!(validate(&s), Err(SettingsError::OutOfRange { field: "max_loss_percent", .. })));

        let mut s = demo::default_settings();
        s.max_martingale_level = Some(4);
        assert!(validate(&s).is_err());

        let mut s = demo::default_settings();
        s.trading_mode = Some("paper".into());
        assert_eq!(validate(&s), Err(SettingsError::Mode("paper".into())));
    }
}
