use crate::core::outcome::OutcomeEvent;
use crate::domain::outcome::RunResult;
use crate::domain::ports::OutcomeReporter;
use crate::utils::error::Result;
use async_trait::async_trait;

/// 沒有設定 Telegram 時使用，結果只寫進日誌
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

#[async_trait]
impl OutcomeReporter for LogReporter {
    async fn report(&self, run: RunResult) -> Result<()> {
        let event = OutcomeEvent::from_run(&run);
        if run.final_status.is_success() {
            tracing::info!("🎉 {}", event.headline);
            for line in &event.lines {
                tracing::info!("   {}", line);
            }
        } else {
            tracing::warn!("📣 {}", event.headline);
            for line in &event.lines {
                tracing::warn!("   {}", line);
            }
        }
        Ok(())
    }

    async fn announce(&self, message: &str) -> Result<()> {
        tracing::info!("📣 {}", message);
        Ok(())
    }
}
