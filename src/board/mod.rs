//! View-state for each page of the desk: what the page holds, what it is
//! allowed to do with it, and how it talks to the backend.

use thiserror::Error;

use crate::api::ApiError;
use crate::lock::PatchError;
use crate::schedule::ScheduleError;
use crate::types::MessageId;

pub mod bots;
pub mod channels;
pub mod settings;
pub mod signals;

pub use bots::{BotPanel, BotRow};
pub use channels::ChannelBook;
pub use settings::{SettingsError, SettingsForm};
pub use signals::{EditSession, NewSignal, SignalBoard};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("signal {0} not found")]
    NotFound(MessageId),
    #[error("{0}")]
    Invalid(String),
}
