use crate::config::settings::NotificationSettings;
use crate::core::outcome::{escape_html, OutcomeEvent};
use crate::domain::outcome::RunResult;
use crate::domain::ports::OutcomeReporter;
use crate::utils::error::{BookerError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// 透過 Telegram Bot API 發送結果通知
pub struct TelegramReporter {
    client: Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramReporter {
    pub fn new(
        api_base: &str,
        bot_token: &str,
        chat_id: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(request_timeout).build()?,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
            chat_id: chat_id.into(),
        })
    }

    /// 未啟用、缺少 token / chat id，或仍是未代換的 `${VAR}` 時回傳 `None`
    pub fn from_settings(
        settings: &NotificationSettings,
        request_timeout: Duration,
    ) -> Result<Option<Self>> {
        if !settings.enabled {
            tracing::info!("🔕 Notifications disabled");
            return Ok(None);
        }
        let token = usable(settings.telegram_bot_token.as_deref());
        let chat_id = usable(settings.telegram_chat_id.as_deref());
        match (token, chat_id) {
            (Some(token), Some(chat_id)) => {
                Self::new(&settings.api_base, token, chat_id, request_timeout).map(Some)
            }
            _ => {
                tracing::warn!("⚠️ Telegram notifications enabled but token/chat_id not set");
                Ok(None)
            }
        }
    }

    pub async fn send(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await
            .map_err(|e| BookerError::NotificationError {
                message: format!("Telegram request failed: {}", e),
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::info!("📨 Telegram message sent");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(BookerError::NotificationError {
                message: format!("Telegram API returned {}: {}", status, body),
            })
        }
    }
}

fn usable(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty() && !v.contains("${"))
}

#[async_trait]
impl OutcomeReporter for TelegramReporter {
    async fn report(&self, run: RunResult) -> Result<()> {
        let event = OutcomeEvent::from_run(&run);
        self.send(&event.render_html()).await
    }

    async fn announce(&self, message: &str) -> Result<()> {
        self.send(&escape_html(message)).await
    }
}
