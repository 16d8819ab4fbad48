pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliArgs;

pub use crate::adapters::{HttpPortalGateway, LocalDiagnosticSink, LogReporter, SystemClock, TelegramReporter};
pub use crate::config::Settings;
pub use crate::core::{BookingEngine, RunStatus, Scheduler, SchedulerHandle, ShutdownSignal};
pub use crate::utils::error::{BookerError, Result};
