use crate::metrics::RawMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric keys compared week over week, in display order.
pub const TRACKED_METRICS: [&str; 8] = [
    "sessions",
    "users",
    "bounce_rate",
    "page_views",
    "whatsapp_clicks",
    "phone_clicks",
    "email_clicks",
    "inquiry_submissions",
];

/// Movement below this |percent| is reported as flat.
const FLAT_THRESHOLD_PERCENT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricTrend {
    pub value: f64,
    pub previous_value: f64,
    pub change_percent: f64,
    pub direction: TrendDirection,
}

/// Week-over-week change for a single metric.
///
/// `previous == 0` is treated as: no change when the metric stayed at 0,
/// a full +100% increase otherwise. Dashboards depend on that convention.
pub fn compute_trend(current: f64, previous: f64) -> MetricTrend {
    let change_percent = if previous == 0.0 {
        if current == 0.0 { 0.0 } else { 100.0 }
    } else {
        (current - previous) / previous * 100.0
    };

    let direction = if change_percent.abs() < FLAT_THRESHOLD_PERCENT {
        TrendDirection::Flat
    } else if change_percent > 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    };

    MetricTrend {
        value: current,
        previous_value: previous,
        change_percent,
        direction,
    }
}

pub fn build_trend_map(
    current: &RawMetrics,
    previous: &RawMetrics,
) -> BTreeMap<String, MetricTrend> {
    TRACKED_METRICS
        .iter()
        .map(|key| {
            (
                key.to_string(),
                compute_trend(metric_value(current, key), metric_value(previous, key)),
            )
        })
        .collect()
}

fn metric_value(metrics: &RawMetrics, key: &str) -> f64 {
    match key {
        "sessions" => metrics.sessions as f64,
        "users" => metrics.total_users as f64,
        "bounce_rate" => metrics.bounce_rate,
        "page_views" => metrics.page_views as f64,
        "whatsapp_clicks" => metrics.whatsapp_clicks as f64,
        "phone_clicks" => metrics.phone_clicks as f64,
        "email_clicks" => metrics.email_clicks as f64,
        "inquiry_submissions" => metrics.inquiry_submissions as f64,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::{TrendDirection, build_trend_map, compute_trend};
    use crate::metrics::RawMetrics;

    #[test]
    fn zero_over_zero_is_flat() {
        let trend = compute_trend(0.0, 0.0);
        assert_eq!(trend.change_percent, 0.0);
        assert_eq!(trend.direction, TrendDirection::Flat);
    }

    #[test]
    fn growth_from_zero_is_a_full_increase() {
        let trend = compute_trend(35.0, 0.0);
        assert_eq!(trend.change_percent, 100.0);
        assert_eq!(trend.direction, TrendDirection::Up);
    }

    #[test]
    fn fifty_percent_up() {
        let trend = compute_trend(150.0, 100.0);
        assert_eq!(trend.change_percent, 50.0);
        assert_eq!(trend.direction, TrendDirection::Up);
    }

    #[test]
    fn sub_one_percent_movement_is_flat_in_both_signs() {
        assert_eq!(compute_trend(1005.0, 1000.0).direction, TrendDirection::Flat);
        assert_eq!(compute_trend(995.0, 1000.0).direction, TrendDirection::Flat);
        assert_eq!(compute_trend(989.0, 1000.0).direction, TrendDirection::Down);
    }

    #[test]
    fn trend_map_covers_all_tracked_metrics() {
        let current = RawMetrics {
            sessions: 1000,
            whatsapp_clicks: 40,
            ..RawMetrics::default()
        };
        let previous = RawMetrics {
            sessions: 800,
            whatsapp_clicks: 40,
            ..RawMetrics::default()
        };

        let map = build_trend_map(&current, &previous);

        assert_eq!(map.len(), super::TRACKED_METRICS.len());
        let sessions = &map["sessions"];
        assert_eq!(sessions.change_percent, 25.0);
        assert_eq!(sessions.direction, TrendDirection::Up);

        let whatsapp = &map["whatsapp_clicks"];
        assert_eq!(whatsapp.change_percent, 0.0);
        assert_eq!(whatsapp.direction, TrendDirection::Flat);
    }
}
