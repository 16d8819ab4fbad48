#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use court_booker::adapters::portal::PortalOptions;
use court_booker::domain::outcome::RunResult;
use court_booker::domain::ports::{Clock, OutcomeReporter};
use court_booker::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 新加坡時間 2026-10-17 00:00:05，目標日期為 2026-10-24（星期六）
pub fn trigger_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 16, 0, 5).unwrap()
}

/// 固定時間、不真正等待的時鐘，記錄每次等待長度
#[derive(Clone)]
pub struct InstantClock {
    now: DateTime<Utc>,
    pub sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl InstantClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for InstantClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

#[derive(Clone, Default)]
pub struct RecordingReporter {
    pub runs: Arc<Mutex<Vec<RunResult>>>,
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
}

pub fn portal_options(base_url: String) -> PortalOptions {
    PortalOptions {
        base_url,
        login_path: "/api/login".to_string(),
        slots_path: "/api/facilities/tennis/slots".to_string(),
        booking_path: "/api/facilities/tennis/bookings".to_string(),
        username: "resident".to_string(),
        password: "secret".to_string(),
        booking_duration: chrono::Duration::hours(1),
        request_timeout: Duration::from_secs(5),
    }
}
