pub mod engine;
pub mod executor;
pub mod matcher;
pub mod outcome;
pub mod retry;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::domain::model::{BookingPreference, Slot, TimeWindow};
pub use crate::domain::outcome::{AttemptResult, AttemptStatus, RunResult, RunStatus, RunTrigger};
pub use crate::domain::ports::{Clock, DiagnosticSink, OutcomeReporter, SessionGateway};
pub use crate::utils::error::Result;
pub use engine::BookingEngine;
pub use executor::AttemptExecutor;
pub use matcher::{rank_candidates, select_slot};
pub use outcome::OutcomeEvent;
pub use retry::{AttemptRunner, Backoff, BackoffKind, RetryController, RetryPolicy};
pub use scheduler::{next_trigger_after, Scheduler, SchedulerHandle, ShutdownSignal, TriggerSettings};
