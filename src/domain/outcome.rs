use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::model::{DiagnosticRef, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptStatus {
    Booked,
    NoMatchingSlot,
    SiteError,
    AuthError,
    Timeout,
}

impl AttemptStatus {
    /// 需要擷取診斷資料的狀態
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            AttemptStatus::SiteError | AttemptStatus::AuthError | AttemptStatus::Timeout
        )
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AttemptStatus::Booked => "booked",
            AttemptStatus::NoMatchingSlot => "no matching slot",
            AttemptStatus::SiteError => "site error",
            AttemptStatus::AuthError => "authentication error",
            AttemptStatus::Timeout => "timeout",
        };
        f.write_str(label)
    }
}

/// 單次嘗試的結果，建立後不可變
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptResult {
    status: AttemptStatus,
    slot: Option<Slot>,
    diagnostic: Option<DiagnosticRef>,
    detail: Option<String>,
    attempt_number: u32,
    timestamp: DateTime<Utc>,
}

impl AttemptResult {
    pub fn booked(slot: Slot, attempt_number: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            status: AttemptStatus::Booked,
            slot: Some(slot),
            diagnostic: None,
            detail: None,
            attempt_number,
            timestamp,
        }
    }

    pub fn no_match(attempt_number: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            status: AttemptStatus::NoMatchingSlot,
            slot: None,
            diagnostic: None,
            detail: None,
            attempt_number,
            timestamp,
        }
    }

    /// 失敗結果；`Booked` 以外的狀態才會有 slot 為空的保證
    pub fn failed(
        status: AttemptStatus,
        detail: impl Into<String>,
        diagnostic: Option<DiagnosticRef>,
        attempt_number: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        debug_assert!(status != AttemptStatus::Booked);
        Self {
            status,
            slot: None,
            diagnostic,
            detail: Some(detail.into()),
            attempt_number,
            timestamp,
        }
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn slot(&self) -> Option<&Slot> {
        self.slot.as_ref()
    }

    pub fn diagnostic(&self) -> Option<&DiagnosticRef> {
        self.diagnostic.as_ref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Booked,
    ExhaustedRetries,
    FatalError,
    /// 收到關閉訊號，在嘗試之間停止
    Cancelled,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Booked)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunStatus::Booked => "booked",
            RunStatus::ExhaustedRetries => "exhausted retries",
            RunStatus::FatalError => "fatal error",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

/// 一次完整執行（一到多次嘗試）的結果，獨佔其嘗試紀錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub trigger: RunTrigger,
    pub target_date: NaiveDate,
    pub final_status: RunStatus,
    pub attempts: Vec<AttemptResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn booked_slot(&self) -> Option<&Slot> {
        self.attempts
            .iter()
            .rev()
            .find(|a| a.status() == AttemptStatus::Booked)
            .and_then(|a| a.slot())
    }

    pub fn last_attempt(&self) -> Option<&AttemptResult> {
        self.attempts.last()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}
