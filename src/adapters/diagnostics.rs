use crate::domain::model::{Artifact, DiagnosticRef};
use crate::domain::ports::DiagnosticSink;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// 把診斷資料寫到本機目錄
///
/// 檔名格式：`{label}_{YYYYmmdd_HHMMSS}_attempt{n}.{png|log}`，目錄不存在時自動建立。
#[derive(Debug, Clone)]
pub struct LocalDiagnosticSink {
    directory: PathBuf,
}

impl LocalDiagnosticSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn file_name(artifact: &Artifact, attempt_number: u32, timestamp: DateTime<Utc>) -> String {
        let label: String = artifact
            .label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!(
            "{}_{}_attempt{}.{}",
            label,
            timestamp.format("%Y%m%d_%H%M%S"),
            attempt_number,
            artifact.kind.extension()
        )
    }
}

#[async_trait]
impl DiagnosticSink for LocalDiagnosticSink {
    async fn save(
        &self,
        artifact: Artifact,
        attempt_number: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<DiagnosticRef> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let location = self
            .directory
            .join(Self::file_name(&artifact, attempt_number, timestamp));
        tokio::fs::write(&location, &artifact.bytes).await?;
        tracing::debug!("Wrote {} bytes to {}", artifact.bytes.len(), location.display());
        Ok(DiagnosticRef {
            kind: artifact.kind,
            location,
        })
    }
}
