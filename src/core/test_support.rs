//! 核心單元測試共用的假實作

use crate::domain::model::{Artifact, DiagnosticRef, Slot};
use crate::domain::outcome::RunResult;
use crate::domain::ports::{Clock, DiagnosticSink, OutcomeReporter, SessionGateway};
use crate::utils::error::{BookerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailWith {
    Auth,
    Site,
    SlotTaken,
    Hang,
}

impl FailWith {
    async fn into_error(self, operation: &str) -> BookerError {
        match self {
            FailWith::Auth => BookerError::AuthError {
                message: format!("{} rejected credentials", operation),
            },
            FailWith::Site => BookerError::SiteError {
                message: format!("{} returned an unexpected page", operation),
            },
            FailWith::SlotTaken => BookerError::SlotUnavailable {
                message: format!("{} lost the race", operation),
            },
            FailWith::Hang => std::future::pending().await,
        }
    }
}

#[derive(Debug, Default)]
pub struct GatewayLog {
    pub opened: u32,
    pub closed: Vec<u32>,
    pub listed: Vec<NaiveDate>,
    pub booked: Vec<Slot>,
    pub captures: u32,
}

#[derive(Clone, Default)]
pub struct FakeGateway {
    pub slots: Vec<Slot>,
    pub open_failure: Option<FailWith>,
    pub list_failure: Option<FailWith>,
    pub book_failure: Option<FailWith>,
    pub capture_failure: bool,
    pub log: Arc<Mutex<GatewayLog>>,
}

impl FakeGateway {
    pub fn with_slots(slots: Vec<Slot>) -> Self {
        Self {
            slots,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> u32 {
        self.log.lock().unwrap().opened
    }

    pub fn closed(&self) -> Vec<u32> {
        self.log.lock().unwrap().closed.clone()
    }

    pub fn booked(&self) -> Vec<Slot> {
        self.log.lock().unwrap().booked.clone()
    }
}

#[async_trait]
impl SessionGateway for FakeGateway {
    type Session = u32;

    async fn open(&self) -> Result<u32> {
        if let Some(failure) = self.open_failure {
            return Err(failure.into_error("open").await);
        }
        let mut log = self.log.lock().unwrap();
        log.opened += 1;
        Ok(log.opened)
    }

    async fn list_slots(&self, _session: &mut u32, date: NaiveDate) -> Result<Vec<Slot>> {
        if let Some(failure) = self.list_failure {
            return Err(failure.into_error("list_slots").await);
        }
        self.log.lock().unwrap().listed.push(date);
        Ok(self.slots.clone())
    }

    async fn book(&self, _session: &mut u32, slot: &Slot) -> Result<()> {
        if let Some(failure) = self.book_failure {
            return Err(failure.into_error("book").await);
        }
        self.log.lock().unwrap().booked.push(slot.clone());
        Ok(())
    }

    async fn capture(&self, session: &mut u32) -> Result<Artifact> {
        if self.capture_failure {
            return Err(BookerError::SiteError {
                message: "page already gone".to_string(),
            });
        }
        self.log.lock().unwrap().captures += 1;
        Ok(Artifact::screenshot(
            format!("session{}", session),
            vec![0x89, 0x50, 0x4e, 0x47],
        ))
    }

    async fn close(&self, session: u32) -> Result<()> {
        self.log.lock().unwrap().closed.push(session);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemorySink {
    pub saved: Arc<Mutex<Vec<(Artifact, u32)>>>,
}

impl MemorySink {
    pub fn count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

#[async_trait]
impl DiagnosticSink for MemorySink {
    async fn save(
        &self,
        artifact: Artifact,
        attempt_number: u32,
        _timestamp: DateTime<Utc>,
    ) -> Result<DiagnosticRef> {
        let location = format!("memory/{}_attempt{}", artifact.label, attempt_number).into();
        let kind = artifact.kind;
        self.saved.lock().unwrap().push((artifact, attempt_number));
        Ok(DiagnosticRef { kind, location })
    }
}

/// 不真正等待的時鐘：`sleep` 直接推進時間；超過上限後永久等待
#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<DateTime<Utc>>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
    max_sleeps: Option<usize>,
    lag: Duration,
}

impl FakeClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
            max_sleeps: None,
            lag: Duration::ZERO,
        }
    }

    /// 每次醒來都比預定晚 `lag`（模擬主機休眠）
    pub fn with_lag(mut self, lag: Duration) -> Self {
        self.lag = lag;
        self
    }

    pub fn with_max_sleeps(mut self, max_sleeps: usize) -> Self {
        self.max_sleeps = Some(max_sleeps);
        self
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.len()
        };
        if self.max_sleeps.is_some_and(|max| count > max) {
            std::future::pending::<()>().await;
        }
        {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::from_std(duration + self.lag).unwrap();
        }
        tokio::task::yield_now().await;
    }
}

#[derive(Clone, Default)]
pub struct RecordingReporter {
    pub runs: Arc<Mutex<Vec<RunResult>>>,
    pub announcements: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn runs(&self) -> Vec<RunResult> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutcomeReporter for RecordingReporter {
    async fn report(&self, run: RunResult) -> Result<()> {
        self.runs.lock().unwrap().push(run);
        Ok(())
    }

    async fn announce(&self, message: &str) -> Result<()> {
        self.announcements.lock().unwrap().push(message.to_string());
        Ok(())
    }
}
