//! Trading-signal desk primitives.
//!
//! This crate carries the logic behind a signal dashboard rather than its UI.
//! The centre of it is the *edit-lock policy*: a pending signal's fields freeze
//! ten seconds before each scheduled execution (entry and every martingale
//! level). Around it sit a typed client for the bot/signal backend, the
//! view-state each dashboard page keeps, report statistics, the reader for
//! channel message text, and the schedule and risk calculations the execution
//! side performs.

pub mod api;
pub mod board;
pub mod clock;
pub mod config;
pub mod lock;
pub mod notify;
pub mod parse;
pub mod poll;
pub mod report;
pub mod risk;
pub mod schedule;
pub mod types;

mod lenient;

pub use crate::api::{ApiError, DeskApi};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::DeskConfig;
pub use crate::lock::{EditLockPolicy, LockState};
