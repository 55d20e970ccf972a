pub mod client;

use crate::error::Result;
use crate::period::ReportPeriod;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const EVENT_WHATSAPP_CLICK: &str = "whatsapp_click";
pub const EVENT_PHONE_CLICK: &str = "phone_click";
pub const EVENT_EMAIL_CLICK: &str = "email_click";
pub const EVENT_INQUIRY_SUBMIT: &str = "inquiry_submit";

/// Sitewide totals for the period. Bounce rate is a fraction in [0, 1].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overview {
    pub sessions: u64,
    pub total_users: u64,
    pub new_users: u64,
    pub bounce_rate: f64,
    pub avg_session_duration: f64,
    pub page_views: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageStats {
    pub path: String,
    pub views: u64,
    pub bounce_rate: f64,
    pub avg_duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCount {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSource {
    pub source: String,
    pub medium: String,
    pub sessions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSplit {
    pub device: String,
    pub sessions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountrySplit {
    pub country: String,
    pub sessions: u64,
}

/// Immutable aggregate view of one reporting week. Assembled from six
/// provider sub-queries; never constructed partially.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub period: ReportPeriod,
    pub overview: Overview,
    pub pages: Vec<PageStats>,
    pub events: Vec<EventCount>,
    pub traffic_sources: Vec<TrafficSource>,
    pub device_split: Vec<DeviceSplit>,
    pub country_split: Vec<CountrySplit>,
}

impl MetricsSnapshot {
    /// True when the provider recorded no traffic at all for the period,
    /// which the pipeline treats as "no prior data" for the previous week.
    pub fn is_empty(&self) -> bool {
        self.overview.sessions == 0 && self.overview.page_views == 0
    }

    pub fn event_count(&self, name: &str) -> u64 {
        self.events
            .iter()
            .find(|event| event.name == name)
            .map(|event| event.count)
            .unwrap_or(0)
    }
}

/// Flattened UI-facing subset of a snapshot, persisted on the report row
/// and used as the input to trend computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMetrics {
    pub sessions: u64,
    pub total_users: u64,
    pub new_users: u64,
    pub bounce_rate: f64,
    pub page_views: u64,
    pub whatsapp_clicks: u64,
    pub phone_clicks: u64,
    pub email_clicks: u64,
    pub inquiry_submissions: u64,
}

impl RawMetrics {
    pub fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        Self {
            sessions: snapshot.overview.sessions,
            total_users: snapshot.overview.total_users,
            new_users: snapshot.overview.new_users,
            bounce_rate: snapshot.overview.bounce_rate,
            page_views: snapshot.overview.page_views,
            whatsapp_clicks: snapshot.event_count(EVENT_WHATSAPP_CLICK),
            phone_clicks: snapshot.event_count(EVENT_PHONE_CLICK),
            email_clicks: snapshot.event_count(EVENT_EMAIL_CLICK),
            inquiry_submissions: snapshot.event_count(EVENT_INQUIRY_SUBMIT),
        }
    }
}

#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn fetch_snapshot(&self, period: &ReportPeriod) -> Result<MetricsSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            period: ReportPeriod::last_completed(
                NaiveDate::parse_from_str("2026-08-06", "%Y-%m-%d").expect("date"),
            ),
            overview: Overview {
                sessions: 1000,
                total_users: 820,
                new_users: 640,
                bounce_rate: 0.42,
                avg_session_duration: 93.5,
                page_views: 3100,
            },
            pages: Vec::new(),
            events: vec![
                EventCount {
                    name: EVENT_WHATSAPP_CLICK.to_string(),
                    count: 40,
                },
                EventCount {
                    name: EVENT_INQUIRY_SUBMIT.to_string(),
                    count: 7,
                },
            ],
            traffic_sources: Vec::new(),
            device_split: Vec::new(),
            country_split: Vec::new(),
        }
    }

    #[test]
    fn raw_metrics_flatten_conversion_events() {
        let raw = RawMetrics::from_snapshot(&snapshot());

        assert_eq!(raw.sessions, 1000);
        assert_eq!(raw.whatsapp_clicks, 40);
        assert_eq!(raw.inquiry_submissions, 7);
        assert_eq!(raw.phone_clicks, 0);
    }

    #[test]
    fn empty_snapshot_detection() {
        let mut empty = snapshot();
        empty.overview = Overview::default();
        empty.events.clear();

        assert!(empty.is_empty());
        assert!(!snapshot().is_empty());
    }
}
