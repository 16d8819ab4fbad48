use crate::core::matcher::select_slot;
use crate::domain::model::{Artifact, BookingPreference, DiagnosticRef, Slot};
use crate::domain::outcome::{AttemptResult, AttemptStatus};
use crate::domain::ports::{Clock, DiagnosticSink, SessionGateway};
use crate::utils::error::{BookerError, Result};
use chrono::NaiveDate;
use std::future::Future;
use std::time::Duration;

/// 執行一次完整的預約嘗試：開啟會話 → 列出時段 → 選擇 → 預約 → 關閉
///
/// 所有失敗都會轉成 `AttemptResult`，不會往外拋出錯誤。
/// 只要會話成功開啟，不論哪一步失敗都一定會關閉。
pub struct AttemptExecutor<G, D, C> {
    gateway: G,
    diagnostics: Option<D>,
    clock: C,
    step_timeout: Duration,
}

impl<G, D, C> AttemptExecutor<G, D, C>
where
    G: SessionGateway,
    D: DiagnosticSink,
    C: Clock,
{
    pub fn new(gateway: G, diagnostics: Option<D>, clock: C, step_timeout: Duration) -> Self {
        Self {
            gateway,
            diagnostics,
            clock,
            step_timeout,
        }
    }

    pub async fn execute(
        &self,
        preference: &BookingPreference,
        target_date: NaiveDate,
        attempt_number: u32,
    ) -> AttemptResult {
        tracing::info!("🎾 Attempt #{} for {}", attempt_number, target_date);

        let mut session = match self.step("open", self.gateway.open()).await {
            Ok(session) => session,
            Err(e) => {
                let status = classify(&e);
                tracing::warn!("❌ Attempt #{} could not open a session: {}", attempt_number, e);
                let diagnostic = self
                    .save_diagnostic(Artifact::log(artifact_label(status), e.to_string()), attempt_number)
                    .await;
                return AttemptResult::failed(
                    status,
                    e.to_string(),
                    diagnostic,
                    attempt_number,
                    self.clock.now(),
                );
            }
        };

        let result = match self.drive(&mut session, preference, target_date).await {
            Ok(Some(slot)) => {
                tracing::info!("✅ Attempt #{} booked {}", attempt_number, slot);
                AttemptResult::booked(slot, attempt_number, self.clock.now())
            }
            Ok(None) => {
                tracing::info!(
                    "🔍 Attempt #{} found no slot matching preferences on {}",
                    attempt_number,
                    target_date
                );
                AttemptResult::no_match(attempt_number, self.clock.now())
            }
            Err(e) => {
                let status = classify_in_session(&e);
                tracing::warn!("❌ Attempt #{} failed ({}): {}", attempt_number, status, e);
                let diagnostic = self
                    .capture_failure(&mut session, status, &e, attempt_number)
                    .await;
                AttemptResult::failed(
                    status,
                    e.to_string(),
                    diagnostic,
                    attempt_number,
                    self.clock.now(),
                )
            }
        };

        if let Err(e) = self.step("close", self.gateway.close(session)).await {
            tracing::warn!("⚠️ Session close reported an error: {}", e);
        }

        result
    }

    async fn drive(
        &self,
        session: &mut G::Session,
        preference: &BookingPreference,
        target_date: NaiveDate,
    ) -> Result<Option<Slot>> {
        let slots = self
            .step("list_slots", self.gateway.list_slots(session, target_date))
            .await?;
        tracing::debug!("Portal listed {} slots for {}", slots.len(), target_date);

        let Some(slot) = select_slot(&slots, preference, target_date).cloned() else {
            return Ok(None);
        };
        tracing::info!("🎯 Selected {}", slot);

        self.step("book", self.gateway.book(session, &slot)).await?;
        Ok(Some(slot))
    }

    /// 每個步驟都有時間上限，逾時視為 `TimeoutError`
    async fn step<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.step_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(BookerError::TimeoutError {
                operation: operation.to_string(),
                seconds: self.step_timeout.as_secs(),
            }),
        }
    }

    async fn capture_failure(
        &self,
        session: &mut G::Session,
        status: AttemptStatus,
        error: &BookerError,
        attempt_number: u32,
    ) -> Option<DiagnosticRef> {
        self.diagnostics.as_ref()?;

        let artifact = match self.step("capture", self.gateway.capture(session)).await {
            Ok(mut artifact) => {
                artifact.label = artifact_label(status).to_string();
                artifact
            }
            Err(capture_error) => {
                tracing::debug!("Capture failed, saving error text instead: {}", capture_error);
                Artifact::log(
                    artifact_label(status),
                    format!("{}\ncapture failed: {}", error, capture_error),
                )
            }
        };

        self.save_diagnostic(artifact, attempt_number).await
    }

    async fn save_diagnostic(&self, artifact: Artifact, attempt_number: u32) -> Option<DiagnosticRef> {
        let sink = self.diagnostics.as_ref()?;
        match sink.save(artifact, attempt_number, self.clock.now()).await {
            Ok(reference) => {
                tracing::info!("📸 Diagnostic saved: {}", reference);
                Some(reference)
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to save diagnostic: {}", e);
                None
            }
        }
    }
}

/// 閘道錯誤 → 嘗試狀態
pub fn classify(error: &BookerError) -> AttemptStatus {
    match error {
        BookerError::AuthError { .. } => AttemptStatus::AuthError,
        e if e.is_timeout() => AttemptStatus::Timeout,
        _ => AttemptStatus::SiteError,
    }
}

/// 會話開啟後被網站拒絕屬於暫時狀況，不是帳密錯誤
fn classify_in_session(error: &BookerError) -> AttemptStatus {
    match classify(error) {
        AttemptStatus::AuthError => AttemptStatus::SiteError,
        status => status,
    }
}

fn artifact_label(status: AttemptStatus) -> &'static str {
    match status {
        AttemptStatus::AuthError => "login_failed",
        AttemptStatus::Timeout => "timeout",
        _ => "error",
    }
}
