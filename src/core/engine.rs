use crate::core::retry::{AttemptRunner, RetryController};
use crate::core::scheduler::ShutdownSignal;
use crate::domain::model::BookingPreference;
use crate::domain::outcome::{RunResult, RunStatus, RunTrigger};
use crate::domain::ports::{Clock, OutcomeReporter};
use crate::utils::error::{BookerError, Result};
use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// 一次執行的進入點：持有重試控制器、偏好設定與回報器
///
/// 同一時間只允許一個執行。排程觸發會排隊等待，手動觸發則直接拒絕。
pub struct BookingEngine<A, C> {
    controller: RetryController<A, C>,
    preference: BookingPreference,
    reporter: Arc<dyn OutcomeReporter>,
    clock: C,
    timezone: Tz,
    run_guard: Mutex<()>,
    reports: Mutex<JoinSet<()>>,
}

impl<A, C> BookingEngine<A, C>
where
    A: AttemptRunner,
    C: Clock,
{
    pub fn new(
        controller: RetryController<A, C>,
        preference: BookingPreference,
        reporter: Arc<dyn OutcomeReporter>,
        clock: C,
        timezone: Tz,
    ) -> Self {
        Self {
            controller,
            preference,
            reporter,
            clock,
            timezone,
            run_guard: Mutex::new(()),
            reports: Mutex::new(JoinSet::new()),
        }
    }

    pub fn preference(&self) -> &BookingPreference {
        &self.preference
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// 網站時區的「今天」
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.timezone).date_naive()
    }

    pub fn target_date(&self) -> NaiveDate {
        self.preference.target_date(self.today())
    }

    pub fn is_preferred_target(&self, target_date: NaiveDate) -> bool {
        self.preference.is_preferred_day(target_date.weekday())
    }

    pub fn reporter(&self) -> Arc<dyn OutcomeReporter> {
        Arc::clone(&self.reporter)
    }

    /// 排程觸發：若有執行中的手動執行則等待它結束
    ///
    /// `target_date` 由觸發當下決定，等待期間跨過午夜也不會改變。
    pub async fn run_scheduled(
        &self,
        target_date: NaiveDate,
        shutdown: &mut ShutdownSignal,
    ) -> RunStatus {
        let _guard = self.run_guard.lock().await;
        self.execute(RunTrigger::Scheduled, target_date, shutdown)
            .await
    }

    /// 手動觸發：已有執行進行中時回傳 `RunInProgress`
    pub async fn run_manual(
        &self,
        target_date: Option<NaiveDate>,
        shutdown: &mut ShutdownSignal,
    ) -> Result<RunStatus> {
        let _guard = self.run_guard.try_lock().map_err(|_| {
            tracing::warn!("⛔ Manual run rejected: another run is in progress");
            BookerError::RunInProgress
        })?;
        let target_date = target_date.unwrap_or_else(|| self.target_date());
        Ok(self
            .execute(RunTrigger::Manual, target_date, shutdown)
            .await)
    }

    async fn execute(
        &self,
        trigger: RunTrigger,
        target_date: NaiveDate,
        shutdown: &mut ShutdownSignal,
    ) -> RunStatus {
        tracing::info!(
            "🚀 Starting {:?} run for {} ({})",
            trigger,
            target_date,
            target_date.format("%A")
        );
        let run = self
            .controller
            .run(&self.preference, target_date, trigger, shutdown)
            .await;
        let status = run.final_status;
        self.dispatch(run).await;
        status
    }

    /// 交給回報器後不等待結果，執行結果的所有權一併移交
    async fn dispatch(&self, run: RunResult) {
        let reporter = Arc::clone(&self.reporter);
        let mut reports = self.reports.lock().await;
        while reports.try_join_next().is_some() {}
        reports.spawn(async move {
            if let Err(e) = reporter.report(run).await {
                tracing::error!("❌ Failed to deliver run outcome: {}", e);
                tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            }
        });
    }

    /// 關閉前等待尚未送出的回報
    pub async fn drain_reports(&self) {
        let mut reports = std::mem::take(&mut *self.reports.lock().await);
        while let Some(joined) = reports.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("⚠️ Report task ended abnormally: {}", e);
            }
        }
    }
}
