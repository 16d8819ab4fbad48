//! 每日定時觸發預約執行
//!
//! 排程器在程式啟動時建立一次，`start` 之後由 [`SchedulerHandle`] 控制，
//! 關閉時等待執行中的嘗試收尾（包含關閉會話）後才結束。

use crate::core::engine::BookingEngine;
use crate::core::retry::AttemptRunner;
use crate::domain::outcome::RunStatus;
use crate::domain::ports::Clock;
use crate::utils::error::{BookerError, Result};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// 關閉訊號的接收端
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// 永遠不會觸發的訊號（單次執行與測試用）
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等到收到關閉訊號；發送端消失時永遠等待
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// 下一個觸發時間：嚴格晚於 `now`，且在 `tz` 的牆上時間等於 `at`
///
/// 夏令時間造成不存在的時間會順延到隔天；重複的時間取較早者。
pub fn next_trigger_after(now: DateTime<Utc>, at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let local_today = now.with_timezone(&tz).date_naive();
    for offset in 0..=7 {
        let Some(day) = local_today.checked_add_days(Days::new(offset)) else {
            break;
        };
        let Some(candidate) = tz.from_local_datetime(&day.and_time(at)).earliest() else {
            continue;
        };
        let candidate = candidate.with_timezone(&Utc);
        if candidate > now {
            return candidate;
        }
    }
    now + chrono::Duration::days(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSettings {
    pub trigger_time: NaiveTime,
    pub timezone: Tz,
    pub misfire_grace: Duration,
    pub skip_non_preferred_days: bool,
}

pub struct Scheduler<A, C> {
    engine: Arc<BookingEngine<A, C>>,
    clock: C,
    settings: TriggerSettings,
}

impl<A, C> Scheduler<A, C>
where
    A: AttemptRunner + 'static,
    C: Clock + Clone + 'static,
{
    pub fn new(engine: Arc<BookingEngine<A, C>>, clock: C, settings: TriggerSettings) -> Self {
        Self {
            engine,
            clock,
            settings,
        }
    }

    pub fn next_trigger(&self) -> DateTime<Utc> {
        next_trigger_after(
            self.clock.now(),
            self.settings.trigger_time,
            self.settings.timezone,
        )
    }

    pub fn start(self) -> SchedulerHandle<A, C> {
        let (shutdown_tx, shutdown) = ShutdownSignal::channel();
        let engine = Arc::clone(&self.engine);
        let task = tokio::spawn(self.run_loop(shutdown));
        tracing::info!("⏰ Scheduler started");
        SchedulerHandle {
            engine,
            shutdown_tx,
            task,
        }
    }

    async fn run_loop(self, mut shutdown: ShutdownSignal) {
        let tz = self.settings.timezone;
        loop {
            let now = self.clock.now();
            let planned = next_trigger_after(now, self.settings.trigger_time, tz);
            let wait = (planned - now).to_std().unwrap_or_default();
            tracing::info!(
                "⏰ Next booking trigger at {} ({:?} from now)",
                planned.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z"),
                wait
            );

            tokio::select! {
                _ = self.clock.sleep(wait) => {}
                _ = shutdown.triggered() => break,
            }

            let lateness = (self.clock.now() - planned).to_std().unwrap_or_default();
            if lateness > self.settings.misfire_grace {
                tracing::warn!(
                    "⚠️ Trigger for {} fired {:?} late (grace {:?}), skipping",
                    planned.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S"),
                    lateness,
                    self.settings.misfire_grace
                );
                continue;
            }

            let target_date: NaiveDate = self.engine.target_date();
            if self.settings.skip_non_preferred_days && !self.engine.is_preferred_target(target_date) {
                tracing::info!(
                    "📅 Target date {} is a {} - skipped (not a preferred day)",
                    target_date,
                    target_date.format("%A")
                );
                continue;
            }

            let status = self.engine.run_scheduled(target_date, &mut shutdown).await;
            tracing::info!("📋 Scheduled run ended: {}", status);

            if shutdown.is_triggered() {
                break;
            }
        }
        tracing::info!("⏹️ Scheduler loop stopped");
    }
}

pub struct SchedulerHandle<A, C> {
    engine: Arc<BookingEngine<A, C>>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl<A, C> SchedulerHandle<A, C>
where
    A: AttemptRunner + 'static,
    C: Clock + Clone + 'static,
{
    /// 繞過計時器立即執行一次；與排程執行互斥
    pub async fn run_now(&self, target_date: Option<NaiveDate>) -> Result<RunStatus> {
        let mut shutdown = ShutdownSignal {
            rx: self.shutdown_tx.subscribe(),
        };
        self.engine.run_manual(target_date, &mut shutdown).await
    }

    /// 發出關閉訊號，等待排程迴圈結束並送出剩餘的回報
    pub async fn shutdown(self) -> Result<()> {
        tracing::info!("🛑 Shutting down scheduler");
        let _ = self.shutdown_tx.send(true);
        let joined = self.task.await;
        self.engine.drain_reports().await;
        joined.map_err(|e| BookerError::SchedulerError {
            message: format!("scheduler task failed: {}", e),
        })
    }
}
