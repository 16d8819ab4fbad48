mod common;

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime, Weekday};
use common::{InstantClock, RecordingReporter};
use court_booker::adapters::diagnostics::LocalDiagnosticSink;
use court_booker::adapters::portal::HttpPortalGateway;
use court_booker::core::executor::AttemptExecutor;
use court_booker::core::retry::{Backoff, RetryController, RetryPolicy};
use court_booker::domain::model::{BookingPreference, TimeWindow};
use court_booker::domain::outcome::{AttemptStatus, RunStatus, RunTrigger};
use court_booker::{BookingEngine, ShutdownSignal};
use httpmock::prelude::*;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

type Engine =
    BookingEngine<AttemptExecutor<HttpPortalGateway, LocalDiagnosticSink, InstantClock>, InstantClock>;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn build_engine(
    base_url: String,
    diagnostics_dir: &Path,
    clock: InstantClock,
    reporter: RecordingReporter,
) -> Result<Engine> {
    let gateway = HttpPortalGateway::new(common::portal_options(base_url))?;
    let executor = AttemptExecutor::new(
        gateway,
        Some(LocalDiagnosticSink::new(diagnostics_dir)),
        clock.clone(),
        Duration::from_secs(5),
    );
    let policy = RetryPolicy {
        retry_count: 2,
        backoff: Backoff::Fixed(Duration::from_secs(5)),
    };
    let preference = BookingPreference {
        preferred_days: vec![Weekday::Sat, Weekday::Sun],
        time_window: TimeWindow::new(t(8, 0), t(11, 0))?,
        court_priority: vec!["Court 1".to_string(), "Court 2".to_string()],
        advance_booking_days: 7,
    };
    Ok(BookingEngine::new(
        RetryController::new(executor, clock.clone(), policy),
        preference,
        Arc::new(reporter),
        clock,
        chrono_tz::Asia::Singapore,
    ))
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// 優先球場在時間窗內的時段被預約
#[tokio::test]
async fn test_books_highest_priority_slot() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/login");
            then.status(200);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/facilities/tennis/slots")
                .query_param("date", "2026-10-24");
            then.status(200).json_body(json!([
                { "court": "Court 2", "time": "08:00 - 09:00", "status": "available" },
                { "court": "Court 1", "time": "09:00 - 10:00", "status": "available" },
                { "court": "Court 1", "time": "10:30 - 11:30", "status": "available" }
            ]));
        })
        .await;
    let booking = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/facilities/tennis/bookings")
                .json_body(json!({
                    "court": "Court 1",
                    "date": "2026-10-24",
                    "start_time": "09:00",
                    "end_time": "10:00"
                }));
            then.status(200);
        })
        .await;

    let temp = TempDir::new()?;
    let clock = InstantClock::at(common::trigger_instant());
    let reporter = RecordingReporter::default();
    let engine = build_engine(server.base_url(), temp.path(), clock.clone(), reporter.clone())?;

    let status = engine.run_manual(None, &mut ShutdownSignal::never()).await?;
    engine.drain_reports().await;

    assert_eq!(status, RunStatus::Booked);
    booking.assert_async().await;
    assert!(clock.sleeps().is_empty());
    assert!(files_in(temp.path()).is_empty());

    let runs = reporter.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].trigger, RunTrigger::Manual);
    let slot = runs[0].booked_slot().unwrap();
    assert_eq!(slot.court_id, "Court 1");
    assert_eq!(slot.start_time, t(9, 0));
    Ok(())
}

/// 網站持續出錯：重試用盡，每次嘗試都留下診斷檔
#[tokio::test]
async fn test_site_errors_exhaust_retries_with_diagnostics() -> Result<()> {
    let server = MockServer::start_async().await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/login");
            then.status(200);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/facilities/tennis/slots");
            then.status(500).body("<html>upstream error</html>");
        })
        .await;

    let temp = TempDir::new()?;
    let clock = InstantClock::at(common::trigger_instant());
    let reporter = RecordingReporter::default();
    let engine = build_engine(server.base_url(), temp.path(), clock.clone(), reporter.clone())?;

    let status = engine.run_manual(None, &mut ShutdownSignal::never()).await?;
    engine.drain_reports().await;

    assert_eq!(status, RunStatus::ExhaustedRetries);
    login.assert_hits_async(3).await;
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 2]);

    let files = files_in(temp.path());
    assert_eq!(
        files,
        vec![
            "error_20261016_160005_attempt1.log",
            "error_20261016_160005_attempt2.log",
            "error_20261016_160005_attempt3.log",
        ]
    );
    let captured = std::fs::read_to_string(temp.path().join(&files[0]))?;
    assert!(captured.contains("upstream error"));

    let runs = reporter.runs();
    assert_eq!(runs[0].attempt_count(), 3);
    assert!(runs[0]
        .attempts
        .iter()
        .all(|a| a.status() == AttemptStatus::SiteError && a.diagnostic().is_some()));
    Ok(())
}

/// 帳密錯誤不重試
#[tokio::test]
async fn test_rejected_credentials_abort_the_run() -> Result<()> {
    let server = MockServer::start_async().await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/login");
            then.status(403);
        })
        .await;

    let temp = TempDir::new()?;
    let clock = InstantClock::at(common::trigger_instant());
    let reporter = RecordingReporter::default();
    let engine = build_engine(server.base_url(), temp.path(), clock.clone(), reporter.clone())?;

    let date = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
    let status = engine.run_manual(Some(date), &mut ShutdownSignal::never()).await?;
    engine.drain_reports().await;

    assert_eq!(status, RunStatus::FatalError);
    login.assert_hits_async(1).await;
    assert!(clock.sleeps().is_empty());
    assert_eq!(
        files_in(temp.path()),
        vec!["login_failed_20261016_160005_attempt1.log"]
    );

    let runs = reporter.runs();
    assert_eq!(runs[0].target_date, date);
    assert_eq!(runs[0].last_attempt().unwrap().status(), AttemptStatus::AuthError);
    Ok(())
}

/// 登入成功後會話被拒：視為網站錯誤並重試
#[tokio::test]
async fn test_session_rejected_after_login_is_retried() -> Result<()> {
    let server = MockServer::start_async().await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/login");
            then.status(200);
        })
        .await;
    let listing = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/facilities/tennis/slots");
            then.status(401).body("session expired");
        })
        .await;

    let temp = TempDir::new()?;
    let clock = InstantClock::at(common::trigger_instant());
    let reporter = RecordingReporter::default();
    let engine = build_engine(server.base_url(), temp.path(), clock.clone(), reporter.clone())?;

    let status = engine.run_manual(None, &mut ShutdownSignal::never()).await?;
    engine.drain_reports().await;

    assert_eq!(status, RunStatus::ExhaustedRetries);
    login.assert_hits_async(3).await;
    listing.assert_hits_async(3).await;
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 2]);

    let runs = reporter.runs();
    assert!(runs[0]
        .attempts
        .iter()
        .all(|a| a.status() == AttemptStatus::SiteError));
    Ok(())
}
