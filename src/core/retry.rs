//! 有上限的重試狀態機
//!
//! `Idle → Attempting → {Succeeded, Retrying, Exhausted, FatalAborted}`，
//! 加上收到關閉訊號時的 `Cancelled`。同一次執行中嘗試一定是依序進行的。

use crate::core::executor::AttemptExecutor;
use crate::core::scheduler::ShutdownSignal;
use crate::domain::model::BookingPreference;
use crate::domain::outcome::{AttemptResult, AttemptStatus, RunResult, RunStatus, RunTrigger};
use crate::domain::ports::{Clock, DiagnosticSink, SessionGateway};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

/// 執行單次嘗試的能力，讓控制器可以脫離真實網站測試
#[async_trait]
pub trait AttemptRunner: Send + Sync {
    async fn run_attempt(
        &self,
        preference: &BookingPreference,
        target_date: NaiveDate,
        attempt_number: u32,
    ) -> AttemptResult;
}

#[async_trait]
impl<G, D, C> AttemptRunner for AttemptExecutor<G, D, C>
where
    G: SessionGateway,
    D: DiagnosticSink,
    C: Clock,
{
    async fn run_attempt(
        &self,
        preference: &BookingPreference,
        target_date: NaiveDate,
        attempt_number: u32,
    ) -> AttemptResult {
        self.execute(preference, target_date, attempt_number).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `initial * 2^(n-1)`，上限 `max`
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// 第 `retry` 次重試（從 1 開始）前的等待時間
    pub fn delay_for(&self, retry: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_count: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// 根據剛完成的第 `attempt` 次嘗試決定下一個狀態
    pub fn next_state(&self, attempt: u32, status: AttemptStatus) -> RetryState {
        match status {
            AttemptStatus::Booked => RetryState::Succeeded,
            // 帳密在同一次執行中不會改變
            AttemptStatus::AuthError => RetryState::FatalAborted,
            AttemptStatus::NoMatchingSlot | AttemptStatus::SiteError | AttemptStatus::Timeout => {
                if attempt >= self.max_attempts() {
                    RetryState::Exhausted
                } else {
                    RetryState::Retrying {
                        attempt,
                        delay: self.backoff.delay_for(attempt),
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    Attempting { attempt: u32 },
    Retrying { attempt: u32, delay: Duration },
    Succeeded,
    Exhausted,
    FatalAborted,
    Cancelled,
}

impl RetryState {
    pub fn run_status(&self) -> Option<RunStatus> {
        match self {
            RetryState::Succeeded => Some(RunStatus::Booked),
            RetryState::Exhausted => Some(RunStatus::ExhaustedRetries),
            RetryState::FatalAborted => Some(RunStatus::FatalError),
            RetryState::Cancelled => Some(RunStatus::Cancelled),
            RetryState::Idle | RetryState::Attempting { .. } | RetryState::Retrying { .. } => None,
        }
    }
}

pub struct RetryController<A, C> {
    runner: A,
    clock: C,
    policy: RetryPolicy,
}

impl<A, C> RetryController<A, C>
where
    A: AttemptRunner,
    C: Clock,
{
    pub fn new(runner: A, clock: C, policy: RetryPolicy) -> Self {
        Self {
            runner,
            clock,
            policy,
        }
    }

    pub async fn run(
        &self,
        preference: &BookingPreference,
        target_date: NaiveDate,
        trigger: RunTrigger,
        shutdown: &mut ShutdownSignal,
    ) -> RunResult {
        let started_at = self.clock.now();
        let mut attempts: Vec<AttemptResult> = Vec::new();
        let mut state = RetryState::Idle;

        let final_status = loop {
            if let Some(status) = state.run_status() {
                break status;
            }

            state = match state {
                RetryState::Idle if shutdown.is_triggered() => RetryState::Cancelled,
                RetryState::Idle => RetryState::Attempting { attempt: 1 },
                RetryState::Attempting { attempt } => {
                    let result = self
                        .runner
                        .run_attempt(preference, target_date, attempt)
                        .await;
                    let next = self.policy.next_state(attempt, result.status());
                    attempts.push(result);
                    next
                }
                RetryState::Retrying { attempt, delay } => {
                    if shutdown.is_triggered() {
                        RetryState::Cancelled
                    } else {
                        tracing::info!(
                            "🔁 Retrying in {:?} ({}/{} attempts used)",
                            delay,
                            attempt,
                            self.policy.max_attempts()
                        );
                        tokio::select! {
                            _ = self.clock.sleep(delay) => RetryState::Attempting { attempt: attempt + 1 },
                            _ = shutdown.triggered() => RetryState::Cancelled,
                        }
                    }
                }
                terminal => terminal,
            };
            tracing::debug!("Retry state → {:?}", state);
        };

        match final_status {
            RunStatus::Booked => tracing::info!("🏁 Run finished: booked after {} attempt(s)", attempts.len()),
            RunStatus::Cancelled => tracing::warn!("🛑 Run cancelled after {} attempt(s)", attempts.len()),
            other => tracing::warn!("🏁 Run finished: {} after {} attempt(s)", other, attempts.len()),
        }

        RunResult {
            trigger,
            target_date,
            final_status,
            attempts,
            started_at,
            finished_at: self.clock.now(),
        }
    }
}
