//! 以 HTTP 呼叫管理處網站後端的會話實作

use crate::domain::model::{Artifact, Slot};
use crate::domain::ports::SessionGateway;
use crate::utils::error::{BookerError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

const SLOT_TIME_PATTERN: &str = r"(?i)(\d{1,2})(?::(\d{2}))?\s*(AM|PM)?";

#[derive(Debug, Clone)]
pub struct PortalOptions {
    pub base_url: String,
    pub login_path: String,
    pub slots_path: String,
    pub booking_path: String,
    pub username: String,
    pub password: String,
    pub booking_duration: chrono::Duration,
    pub request_timeout: Duration,
}

/// 一個登入後的網站會話；每次嘗試都會建立新的 cookie 容器
pub struct PortalSession {
    client: Client,
    last_body: String,
}

pub struct HttpPortalGateway {
    login_url: Url,
    slots_url: Url,
    booking_url: Url,
    username: String,
    password: String,
    booking_duration: chrono::Duration,
    request_timeout: Duration,
    time_pattern: Regex,
}

#[derive(Debug, Deserialize)]
struct RawSlot {
    court: String,
    #[serde(default)]
    date: Option<String>,
    time: String,
    #[serde(default)]
    status: Option<String>,
}

impl HttpPortalGateway {
    pub fn new(options: PortalOptions) -> Result<Self> {
        let base = Url::parse(&options.base_url).map_err(|e| BookerError::InvalidConfigValueError {
            field: "portal.base_url".to_string(),
            value: options.base_url.clone(),
            reason: e.to_string(),
        })?;
        let join = |field: &str, path: &str| {
            base.join(path).map_err(|e| BookerError::InvalidConfigValueError {
                field: field.to_string(),
                value: path.to_string(),
                reason: e.to_string(),
            })
        };

        Ok(Self {
            login_url: join("portal.login_path", &options.login_path)?,
            slots_url: join("portal.slots_path", &options.slots_path)?,
            booking_url: join("portal.booking_path", &options.booking_path)?,
            username: options.username,
            password: options.password,
            booking_duration: options.booking_duration,
            request_timeout: options.request_timeout,
            time_pattern: Regex::new(SLOT_TIME_PATTERN).map_err(|e| BookerError::ConfigError {
                message: format!("invalid slot time pattern: {}", e),
            })?,
        })
    }

    /// 解析 `08:00 - 09:00`、`8:00 AM`、`1:30PM-2:30PM` 這類時間標籤
    ///
    /// 只有開始時間時，結束時間為開始時間加上預約長度；跨過午夜視為無法解析。
    pub fn parse_time_label(&self, label: &str) -> Option<(NaiveTime, NaiveTime)> {
        let mut times = self.time_pattern.captures_iter(label).filter_map(|caps| {
            let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
            let minute: u32 = match caps.get(2) {
                Some(m) => m.as_str().parse().ok()?,
                None => 0,
            };
            let hour = match caps.get(3).map(|m| m.as_str().to_ascii_uppercase()) {
                Some(ref meridiem) if hour == 0 || hour > 12 => {
                    tracing::debug!("Hour {} is not valid with {}", hour, meridiem);
                    return None;
                }
                Some(ref meridiem) if meridiem == "PM" && hour != 12 => hour + 12,
                Some(ref meridiem) if meridiem == "AM" && hour == 12 => 0,
                _ => hour,
            };
            NaiveTime::from_hms_opt(hour, minute, 0)
        });

        let start = times.next()?;
        let end = match times.next() {
            Some(end) => end,
            None => {
                let (end, wrapped) = start.overflowing_add_signed(self.booking_duration);
                if wrapped != 0 {
                    return None;
                }
                end
            }
        };
        (start < end).then_some((start, end))
    }

    fn parse_slots(&self, body: &str, date: NaiveDate) -> Result<Vec<Slot>> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| BookerError::SiteError {
                message: format!("slot listing is not JSON ({}): {}", e, snippet(body)),
            })?;
        let serde_json::Value::Array(items) = value else {
            return Err(BookerError::SiteError {
                message: format!("slot listing is not a JSON array: {}", snippet(body)),
            });
        };

        let mut slots = Vec::with_capacity(items.len());
        for item in items {
            let raw: RawSlot = match serde_json::from_value(item) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::debug!("Skipping malformed slot entry: {}", e);
                    continue;
                }
            };
            let Some((start, end)) = self.parse_time_label(&raw.time) else {
                tracing::debug!("Skipping slot with unreadable time label: {:?}", raw.time);
                continue;
            };
            let slot_date = match raw.date.as_deref() {
                Some(text) => match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
                    Ok(parsed) => parsed,
                    Err(_) => {
                        tracing::debug!("Skipping slot with unreadable date: {:?}", text);
                        continue;
                    }
                },
                None => date,
            };
            let available = raw.status.as_deref().is_some_and(is_available_status);
            slots.push(Slot::new(slot_date, raw.court.trim(), start, end, available));
        }

        tracing::info!(
            "📋 Portal listed {} slot(s) for {}, {} available",
            slots.len(),
            date,
            slots.iter().filter(|s| s.available).count()
        );
        Ok(slots)
    }
}

/// `booked`、`disabled`、`unavailable` 優先於 `available`
fn is_available_status(status: &str) -> bool {
    let status = status.to_ascii_lowercase();
    if ["booked", "disabled", "unavailable"]
        .iter()
        .any(|marker| status.contains(marker))
    {
        return false;
    }
    status.contains("available")
}

fn snippet(body: &str) -> String {
    const LIMIT: usize = 200;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// 讀出回應內容並記在會話上，供失敗時擷取
async fn read_body(session: &mut PortalSession, response: Response) -> Result<(StatusCode, String)> {
    let status = response.status();
    let body = response.text().await?;
    tracing::debug!("Portal response status: {}", status);
    session.last_body = body.clone();
    Ok((status, body))
}

fn is_auth_rejection(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

#[async_trait]
impl SessionGateway for HttpPortalGateway {
    type Session = PortalSession;

    async fn open(&self) -> Result<PortalSession> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(self.request_timeout)
            .build()?;
        let mut session = PortalSession {
            client,
            last_body: String::new(),
        };

        tracing::debug!("Logging in at {}", self.login_url);
        let response = session
            .client
            .post(self.login_url.clone())
            .json(&json!({ "username": self.username, "password": self.password }))
            .send()
            .await?;
        let (status, body) = read_body(&mut session, response).await?;

        if is_auth_rejection(status) {
            return Err(BookerError::AuthError {
                message: format!("login rejected with status {}", status),
            });
        }
        if !status.is_success() {
            return Err(BookerError::SiteError {
                message: format!("login failed with status {}: {}", status, snippet(&body)),
            });
        }

        tracing::info!("🔐 Logged in as {}", self.username);
        Ok(session)
    }

    async fn list_slots(&self, session: &mut PortalSession, date: NaiveDate) -> Result<Vec<Slot>> {
        let response = session
            .client
            .get(self.slots_url.clone())
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await?;
        let (status, body) = read_body(session, response).await?;

        if is_auth_rejection(status) {
            return Err(BookerError::SiteError {
                message: format!("session rejected during slot listing with status {}", status),
            });
        }
        if !status.is_success() {
            return Err(BookerError::SiteError {
                message: format!("slot listing failed with status {}: {}", status, snippet(&body)),
            });
        }

        self.parse_slots(&body, date)
    }

    async fn book(&self, session: &mut PortalSession, slot: &Slot) -> Result<()> {
        let response = session
            .client
            .post(self.booking_url.clone())
            .json(&json!({
                "court": slot.court_id,
                "date": slot.date.format("%Y-%m-%d").to_string(),
                "start_time": slot.start_time.format("%H:%M").to_string(),
                "end_time": slot.end_time.format("%H:%M").to_string(),
            }))
            .send()
            .await?;
        let (status, body) = read_body(session, response).await?;

        match status {
            s if s.is_success() => {
                tracing::info!("✅ Portal confirmed booking of {}", slot);
                Ok(())
            }
            s if s == StatusCode::CONFLICT || s == StatusCode::GONE => Err(BookerError::SlotUnavailable {
                message: format!("{} is no longer available", slot),
            }),
            s if is_auth_rejection(s) => Err(BookerError::SiteError {
                message: format!("session rejected during booking with status {}", s),
            }),
            s => Err(BookerError::SiteError {
                message: format!("booking failed with status {}: {}", s, snippet(&body)),
            }),
        }
    }

    async fn capture(&self, session: &mut PortalSession) -> Result<Artifact> {
        Ok(Artifact::log("portal_response", session.last_body.clone()))
    }

    async fn close(&self, session: PortalSession) -> Result<()> {
        drop(session);
        tracing::debug!("Portal session closed");
        Ok(())
    }
}
