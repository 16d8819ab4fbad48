use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::error::Result;
use crate::utils::validation::validate_time_window;

/// 網站上可預約的一個時段（球場 + 日期 + 時間）
///
/// 每次列出時段時重新建立，讀取後不可變。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub court_id: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
}

impl Slot {
    pub fn new(
        date: NaiveDate,
        court_id: impl Into<String>,
        start_time: NaiveTime,
        end_time: NaiveTime,
        available: bool,
    ) -> Self {
        Self {
            date,
            court_id: court_id.into(),
            start_time,
            end_time,
            available,
        }
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    /// `HH:MM - HH:MM`
    pub fn time_label(&self) -> String {
        format!(
            "{} - {}",
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        )
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}) {}",
            self.court_id,
            self.date,
            self.weekday(),
            self.time_label()
        )
    }
}

/// 半開區間 `[start, end)`，建構時保證 `start < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        validate_time_window("booking.time_window", start, end)?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// 時段必須完全落在窗口內
    pub fn contains(&self, start: NaiveTime, end: NaiveTime) -> bool {
        start >= self.start && end <= self.end && start < end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingPreference {
    /// 順序代表優先權，成員判斷與順序無關
    pub preferred_days: Vec<Weekday>,
    pub time_window: TimeWindow,
    /// 越前面越優先，不在列表中的球場排在最後
    pub court_priority: Vec<String>,
    pub advance_booking_days: u32,
}

impl BookingPreference {
    pub fn target_date(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_days(Days::new(u64::from(self.advance_booking_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn is_preferred_day(&self, day: Weekday) -> bool {
        self.preferred_days.contains(&day)
    }

    pub fn court_rank(&self, court_id: &str) -> Option<usize> {
        self.court_priority.iter().position(|c| c == court_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Screenshot,
    Log,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "png",
            ArtifactKind::Log => "log",
        }
    }
}

/// 失敗時擷取的診斷資料（截圖或頁面內容）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub label: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn screenshot(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            kind: ArtifactKind::Screenshot,
            label: label.into(),
            bytes,
        }
    }

    pub fn log(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Log,
            label: label.into(),
            bytes: text.into().into_bytes(),
        }
    }
}

/// 已寫出的診斷資料位置，核心只記錄不回讀
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRef {
    pub kind: ArtifactKind,
    pub location: PathBuf,
}

impl std::fmt::Display for DiagnosticRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.location.display())
    }
}
