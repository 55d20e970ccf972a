use crate::config::Config;
use crate::error::{DigestError, Result};
use crate::store::{HypothesisRow, ReportRow};
use crate::trends::TrendDirection;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const MAX_DIGEST_HYPOTHESES: usize = 3;

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

/// Telegram Bot API channel: one `sendMessage` to a fixed chat.
pub struct TelegramChannel {
    client: reqwest::Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn from_config(config: &Config) -> Result<Self> {
        let bot_token = config.resolve_bot_token().ok_or_else(|| {
            DigestError::NotificationUnavailable(
                "bot token is not configured (notify_bot_token or SITEPULSE_BOT_TOKEN)".to_string(),
            )
        })?;

        if config.notify_chat_id.trim().is_empty() {
            return Err(DigestError::NotificationUnavailable(
                "notify_chat_id is not configured".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.notify_timeout_seconds.max(1)))
            .build()
            .map_err(|error| {
                DigestError::NotificationUnavailable(format!(
                    "failed to build notification HTTP client: {error}"
                ))
            })?;

        Ok(Self {
            client,
            base_url: "https://api.telegram.org".to_string(),
            bot_token,
            chat_id: config.notify_chat_id.clone(),
        })
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    async fn send(&self, text: &str) -> Result<()> {
        let endpoint = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);

        let response = self
            .client
            .post(&endpoint)
            .json(&json!({"chat_id": self.chat_id, "text": text}))
            .send()
            .await
            .map_err(|error| {
                DigestError::NotificationUnavailable(format!("notification send failed: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DigestError::NotificationUnavailable(format!(
                "notification API error {status}: {body}"
            )));
        }

        Ok(())
    }
}

/// Channel for the current config, or `None` when notifications are off
/// or misconfigured. Delivery is best-effort, so a broken channel setup
/// must never block collection.
pub fn channel_from_config(config: &Config) -> Option<Box<dyn NotificationChannel>> {
    if !config.notify_enabled {
        return None;
    }

    match TelegramChannel::from_config(config) {
        Ok(channel) => Some(Box::new(channel)),
        Err(error) => {
            tracing::warn!(error = %error, "notification channel unavailable");
            None
        }
    }
}

/// Condensed plain-text digest for the chat channel: period header, key
/// metrics with trend arrows, summary, top hypotheses, quick wins.
pub fn format_digest(report: &ReportRow, hypotheses: &[HypothesisRow]) -> String {
    let mut lines = vec![format!(
        "Weekly digest - {} to {}",
        report.period_start, report.period_end
    )];

    if let Some(raw) = &report.raw_metrics {
        lines.push(String::new());
        lines.push(metric_line(report, "sessions", "Sessions", raw.sessions.to_string()));
        lines.push(metric_line(report, "users", "Users", raw.total_users.to_string()));
        lines.push(metric_line(
            report,
            "bounce_rate",
            "Bounce rate",
            format!("{:.0}%", raw.bounce_rate * 100.0),
        ));
        lines.push(metric_line(
            report,
            "whatsapp_clicks",
            "WhatsApp clicks",
            raw.whatsapp_clicks.to_string(),
        ));
        lines.push(metric_line(
            report,
            "phone_clicks",
            "Phone clicks",
            raw.phone_clicks.to_string(),
        ));
        lines.push(metric_line(
            report,
            "inquiry_submissions",
            "Inquiries",
            raw.inquiry_submissions.to_string(),
        ));
    }

    if let Some(summary) = &report.summary {
        lines.push(String::new());
        lines.push(summary.clone());
    }

    let mut top = hypotheses.to_vec();
    top.sort_by_key(|hypothesis| hypothesis.priority.rank());

    if !top.is_empty() {
        lines.push(String::new());
        lines.push("Top hypotheses:".to_string());
        for (index, hypothesis) in top.iter().take(MAX_DIGEST_HYPOTHESES).enumerate() {
            lines.push(format!(
                "{}. {} - {}",
                index + 1,
                hypothesis.title,
                hypothesis.problem
            ));
        }
    }

    if let Some(quick_wins) = &report.quick_wins {
        if !quick_wins.is_empty() {
            lines.push(String::new());
            lines.push("Quick wins:".to_string());
            for win in quick_wins {
                lines.push(format!("- {}: {}", win.title, win.description));
            }
        }
    }

    lines.join("\n")
}

fn metric_line(report: &ReportRow, key: &str, label: &str, value: String) -> String {
    let trend = report
        .trends
        .as_ref()
        .and_then(|trends| trends.get(key))
        .map(|trend| {
            format!(
                " {} {:+.1}%",
                direction_arrow(trend.direction),
                trend.change_percent
            )
        })
        .unwrap_or_default();

    format!("{label}: {value}{trend}")
}

fn direction_arrow(direction: TrendDirection) -> &'static str {
    match direction {
        TrendDirection::Up => "\u{25b2}",
        TrendDirection::Down => "\u{25bc}",
        TrendDirection::Flat => "\u{25c6}",
    }
}
