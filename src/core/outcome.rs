//! 將執行結果整理成通知訊息

use crate::domain::outcome::{RunResult, RunStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeEvent {
    pub headline: String,
    pub lines: Vec<String>,
}

impl OutcomeEvent {
    pub fn from_run(run: &RunResult) -> Self {
        if let (RunStatus::Booked, Some(slot)) = (run.final_status, run.booked_slot()) {
            return Self {
                headline: "Tennis court booked!".to_string(),
                lines: vec![
                    format!("Court: {}", slot.court_id),
                    format!("Date: {} ({})", slot.date, slot.date.format("%a")),
                    format!("Time: {}", slot.time_label()),
                ],
            };
        }

        let reason = match (run.final_status, run.last_attempt()) {
            (RunStatus::Cancelled, _) => "run cancelled by shutdown".to_string(),
            (_, Some(last)) => match last.detail() {
                Some(detail) => format!("{} ({})", last.status(), detail),
                None => last.status().to_string(),
            },
            (status, None) => status.to_string(),
        };

        let mut lines = vec![
            format!("Reason: {}", reason),
            format!("Target date: {} ({})", run.target_date, run.target_date.format("%a")),
            format!("Attempts: {}", run.attempt_count()),
        ];
        for attempt in &run.attempts {
            let mut line = format!("#{} {}", attempt.attempt_number(), attempt.status());
            if let Some(diagnostic) = attempt.diagnostic() {
                line.push_str(&format!(" [{}]", diagnostic));
            }
            lines.push(line);
        }

        Self {
            headline: "Tennis court booking failed!".to_string(),
            lines,
        }
    }

    pub fn render_text(&self) -> String {
        format!("{}\n\n{}", self.headline, self.lines.join("\n"))
    }

    /// Telegram HTML 模式：標題加粗，內容跳脫
    pub fn render_html(&self) -> String {
        let body: Vec<String> = self.lines.iter().map(|l| escape_html(l)).collect();
        format!("<b>{}</b>\n\n{}", escape_html(&self.headline), body.join("\n"))
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}
