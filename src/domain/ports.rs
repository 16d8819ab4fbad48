use crate::domain::model::{Artifact, DiagnosticRef, Slot};
use crate::domain::outcome::RunResult;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;

/// 與預約網站的會話介面（登入、列出時段、預約、關閉）
///
/// `close` 取得會話所有權，因此同一個會話不會被重複使用；
/// 任何步驟失敗之後呼叫 `close` 都必須是安全的。
#[async_trait]
pub trait SessionGateway: Send + Sync {
    type Session: Send;

    async fn open(&self) -> Result<Self::Session>;

    async fn list_slots(&self, session: &mut Self::Session, date: NaiveDate) -> Result<Vec<Slot>>;

    async fn book(&self, session: &mut Self::Session, slot: &Slot) -> Result<()>;

    /// 擷取目前頁面狀態，用於失敗診斷
    async fn capture(&self, session: &mut Self::Session) -> Result<Artifact>;

    async fn close(&self, session: Self::Session) -> Result<()>;
}

#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn save(
        &self,
        artifact: Artifact,
        attempt_number: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<DiagnosticRef>;
}

#[async_trait]
pub trait OutcomeReporter: Send + Sync {
    async fn report(&self, run: RunResult) -> Result<()>;

    /// 啟動通知等非執行結果的訊息
    async fn announce(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// 時間來源；測試以假時鐘取代真實等待
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}
