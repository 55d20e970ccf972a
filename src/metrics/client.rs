use crate::config::Config;
use crate::error::{DigestError, Result};
use crate::metrics::{
    CountrySplit, DeviceSplit, EventCount, MetricsProvider, MetricsSnapshot, Overview, PageStats,
    TrafficSource,
};
use crate::period::ReportPeriod;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

const PAGES_LIMIT: u32 = 20;
const EVENTS_LIMIT: u32 = 20;
const SOURCES_LIMIT: u32 = 10;
const SPLIT_LIMIT: u32 = 10;

/// GA4 Data API (`runReport`) client. Any provider exposing equivalent
/// aggregate dimensional queries fits behind [`MetricsProvider`]; this is
/// the one the site actually uses.
pub struct HttpMetricsProvider {
    client: reqwest::Client,
    base_url: String,
    property_id: String,
}

impl HttpMetricsProvider {
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.provider_property_id.trim().is_empty() {
            return Err(DigestError::ProviderUnavailable(
                "provider_property_id is not configured".to_string(),
            ));
        }

        let api_key = config.resolve_provider_key().ok_or_else(|| {
            DigestError::ProviderUnavailable(
                "provider API key is not configured (provider_api_key or SITEPULSE_PROVIDER_KEY)"
                    .to_string(),
            )
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|error| {
                DigestError::ProviderUnavailable(format!("invalid provider API key: {error}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.provider_timeout_seconds.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|error| {
                DigestError::ProviderUnavailable(format!(
                    "failed to build analytics HTTP client: {error}"
                ))
            })?;

        Ok(Self {
            client,
            base_url: config.provider_base_url.trim_end_matches('/').to_string(),
            property_id: config.provider_property_id.clone(),
        })
    }

    async fn run_report(
        &self,
        period: &ReportPeriod,
        dimensions: &[&str],
        metrics: &[&str],
        order_metric: Option<&str>,
        limit: u32,
    ) -> Result<Vec<ReportRow>> {
        let endpoint = format!(
            "{}/properties/{}:runReport",
            self.base_url, self.property_id
        );

        // GA4 date ranges are inclusive on both ends.
        let mut body = json!({
            "dateRanges": [{
                "startDate": period.start_str(),
                "endDate": period.last_day().format("%Y-%m-%d").to_string(),
            }],
            "dimensions": dimensions.iter().map(|name| json!({"name": name})).collect::<Vec<_>>(),
            "metrics": metrics.iter().map(|name| json!({"name": name})).collect::<Vec<_>>(),
            "limit": limit.to_string(),
        });

        if let Some(metric) = order_metric {
            body["orderBys"] = json!([{"metric": {"metricName": metric}, "desc": true}]);
        }

        let response = self
            .client
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                DigestError::ProviderUnavailable(format!("analytics request failed: {error}"))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|error| {
            DigestError::ProviderQuery(format!("failed to read analytics response: {error}"))
        })?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DigestError::ProviderUnavailable(format!(
                "analytics auth rejected ({status}): {text}"
            )));
        }

        if !status.is_success() {
            return Err(DigestError::ProviderQuery(format!(
                "analytics query error ({status}): {text}"
            )));
        }

        let parsed: RunReportResponse = serde_json::from_str(&text).map_err(|error| {
            DigestError::ProviderQuery(format!("malformed analytics response: {error}"))
        })?;

        Ok(parsed.rows)
    }

    async fn query_overview(&self, period: &ReportPeriod) -> Result<Overview> {
        let rows = self
            .run_report(
                period,
                &[],
                &[
                    "sessions",
                    "totalUsers",
                    "newUsers",
                    "bounceRate",
                    "averageSessionDuration",
                    "screenPageViews",
                ],
                None,
                1,
            )
            .await?;

        // No rows means no traffic in the window; every total is 0.
        let Some(row) = rows.first() else {
            return Ok(Overview::default());
        };

        Ok(Overview {
            sessions: row.metric_u64(0),
            total_users: row.metric_u64(1),
            new_users: row.metric_u64(2),
            bounce_rate: row.metric_f64(3).clamp(0.0, 1.0),
            avg_session_duration: row.metric_f64(4),
            page_views: row.metric_u64(5),
        })
    }

    async fn query_pages(&self, period: &ReportPeriod) -> Result<Vec<PageStats>> {
        let rows = self
            .run_report(
                period,
                &["pagePath"],
                &["screenPageViews", "bounceRate", "averageSessionDuration"],
                Some("screenPageViews"),
                PAGES_LIMIT,
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| PageStats {
                path: row.dimension(0),
                views: row.metric_u64(0),
                bounce_rate: row.metric_f64(1).clamp(0.0, 1.0),
                avg_duration: row.metric_f64(2),
            })
            .collect())
    }

    async fn query_events(&self, period: &ReportPeriod) -> Result<Vec<EventCount>> {
        let rows = self
            .run_report(
                period,
                &["eventName"],
                &["eventCount"],
                Some("eventCount"),
                EVENTS_LIMIT,
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| EventCount {
                name: row.dimension(0),
                count: row.metric_u64(0),
            })
            .collect())
    }

    async fn query_traffic_sources(&self, period: &ReportPeriod) -> Result<Vec<TrafficSource>> {
        let rows = self
            .run_report(
                period,
                &["sessionSource", "sessionMedium"],
                &["sessions"],
                Some("sessions"),
                SOURCES_LIMIT,
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| TrafficSource {
                source: row.dimension(0),
                medium: row.dimension(1),
                sessions: row.metric_u64(0),
            })
            .collect())
    }

    async fn query_device_split(&self, period: &ReportPeriod) -> Result<Vec<DeviceSplit>> {
        let rows = self
            .run_report(
                period,
                &["deviceCategory"],
                &["sessions"],
                Some("sessions"),
                SPLIT_LIMIT,
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| DeviceSplit {
                device: row.dimension(0),
                sessions: row.metric_u64(0),
            })
            .collect())
    }

    async fn query_country_split(&self, period: &ReportPeriod) -> Result<Vec<CountrySplit>> {
        let rows = self
            .run_report(
                period,
                &["country"],
                &["sessions"],
                Some("sessions"),
                SPLIT_LIMIT,
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| CountrySplit {
                country: row.dimension(0),
                sessions: row.metric_u64(0),
            })
            .collect())
    }
}

#[async_trait]
impl MetricsProvider for HttpMetricsProvider {
    async fn fetch_snapshot(&self, period: &ReportPeriod) -> Result<MetricsSnapshot> {
        // Fan out the six sub-queries and join; the first failure fails the
        // snapshot, so trend comparisons never see partial data.
        let (overview, pages, events, traffic_sources, device_split, country_split) = tokio::try_join!(
            self.query_overview(period),
            self.query_pages(period),
            self.query_events(period),
            self.query_traffic_sources(period),
            self.query_device_split(period),
            self.query_country_split(period),
        )?;

        Ok(MetricsSnapshot {
            period: *period,
            overview,
            pages,
            events,
            traffic_sources,
            device_split,
            country_split,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct RunReportResponse {
    #[serde(default)]
    rows: Vec<ReportRow>,
}

#[derive(Debug, Deserialize)]
struct ReportRow {
    #[serde(default, rename = "dimensionValues")]
    dimension_values: Vec<CellValue>,
    #[serde(default, rename = "metricValues")]
    metric_values: Vec<CellValue>,
}

#[derive(Debug, Deserialize)]
struct CellValue {
    #[serde(default)]
    value: Value,
}

impl ReportRow {
    fn dimension(&self, index: usize) -> String {
        self.dimension_values
            .get(index)
            .and_then(|cell| cell.value.as_str())
            .unwrap_or("(not set)")
            .to_string()
    }

    // Metric cells arrive as strings; anything absent or unparseable is 0.
    fn metric_f64(&self, index: usize) -> f64 {
        self.metric_values
            .get(index)
            .and_then(|cell| match &cell.value {
                Value::String(raw) => raw.parse::<f64>().ok(),
                Value::Number(number) => number.as_f64(),
                _ => None,
            })
            .unwrap_or(0.0)
    }

    fn metric_u64(&self, index: usize) -> u64 {
        self.metric_f64(index).max(0.0).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpMetricsProvider, ReportRow, RunReportResponse};
    use crate::config::Config;
    use crate::error::DigestError;
    use crate::metrics::MetricsProvider;
    use crate::period::ReportPeriod;
    use chrono::NaiveDate;

    fn provider_config() -> Config {
        Config {
            provider_base_url: "http://127.0.0.1:1".to_string(),
            provider_property_id: "123456".to_string(),
            provider_api_key: Some("test-token".to_string()),
            provider_timeout_seconds: 2,
            ..Config::default()
        }
    }

    #[test]
    fn missing_property_id_is_provider_unavailable() {
        let config = Config {
            provider_property_id: String::new(),
            ..provider_config()
        };

        assert!(matches!(
            HttpMetricsProvider::from_config(&config),
            Err(DigestError::ProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_provider_fails_the_whole_snapshot() {
        let provider = HttpMetricsProvider::from_config(&provider_config()).expect("client");
        let period = ReportPeriod::starting(
            NaiveDate::parse_from_str("2026-07-27", "%Y-%m-%d").expect("date"),
        )
        .expect("monday");

        // All six sub-queries fail here, but one is enough: try_join!
        // surfaces the first error and no partial snapshot escapes.
        let error = provider
            .fetch_snapshot(&period)
            .await
            .expect_err("unreachable endpoint");

        assert!(matches!(error, DigestError::ProviderUnavailable(_)));
    }

    #[test]
    fn metric_cells_default_to_zero() {
        let parsed: RunReportResponse = serde_json::from_str(
            r#"{"rows":[{"dimensionValues":[{"value":"/yachts"}],"metricValues":[{"value":"153"},{}]}]}"#,
        )
        .expect("parse");

        let row = &parsed.rows[0];
        assert_eq!(row.dimension(0), "/yachts");
        assert_eq!(row.metric_u64(0), 153);
        assert_eq!(row.metric_u64(1), 0);
        assert_eq!(row.metric_f64(5), 0.0);
    }

    #[test]
    fn missing_rows_key_parses_as_empty() {
        let parsed: RunReportResponse = serde_json::from_str("{}").expect("parse");
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn row_without_dimensions_is_not_set() {
        let row: ReportRow =
            serde_json::from_str(r#"{"metricValues":[{"value":"1"}]}"#).expect("parse");
        assert_eq!(row.dimension(0), "(not set)");
    }
}
