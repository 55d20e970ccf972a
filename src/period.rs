use anyhow::{Context, Result, bail};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// A half-open reporting window `[start, end)` covering one calendar week.
///
/// `start` is always a Monday and `end` the following Monday. Period
/// uniqueness in the report store is keyed on `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportPeriod {
    pub fn starting(start: NaiveDate) -> Result<Self> {
        if start.weekday() != Weekday::Mon {
            bail!(
                "Report periods are calendar weeks and must start on a Monday, got {start} ({})",
                start.weekday()
            );
        }

        Ok(Self {
            start,
            end: start + Duration::days(7),
        })
    }

    /// The most recent fully elapsed week before `today`.
    pub fn last_completed(today: NaiveDate) -> Self {
        let this_monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));

        Self {
            start: this_monday - Duration::days(7),
            end: this_monday,
        }
    }

    pub fn previous(&self) -> Self {
        Self {
            start: self.start - Duration::days(7),
            end: self.start,
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let start = NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .with_context(|| format!("Invalid date format: {input}. Example: 2026-07-27"))?;

        Self::starting(start)
    }

    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }

    /// Last day inside the window, for providers with inclusive date ranges.
    pub fn last_day(&self) -> NaiveDate {
        self.end - Duration::days(1)
    }

    pub fn label(&self) -> String {
        format!("{} to {}", self.start_str(), self.last_day().format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::ReportPeriod;
    use chrono::{Datelike, NaiveDate, Weekday};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn last_completed_week_is_monday_started_and_elapsed() {
        // 2026-08-06 is a Thursday.
        let period = ReportPeriod::last_completed(date("2026-08-06"));

        assert_eq!(period.start, date("2026-07-27"));
        assert_eq!(period.end, date("2026-08-03"));
        assert_eq!(period.start.weekday(), Weekday::Mon);
        assert!(period.end <= date("2026-08-06"));
    }

    #[test]
    fn last_completed_on_a_monday_ends_today() {
        let period = ReportPeriod::last_completed(date("2026-08-03"));

        assert_eq!(period.start, date("2026-07-27"));
        assert_eq!(period.end, date("2026-08-03"));
    }

    #[test]
    fn previous_shifts_back_one_week() {
        let period = ReportPeriod::starting(date("2026-07-27")).expect("monday");
        let previous = period.previous();

        assert_eq!(previous.start, date("2026-07-20"));
        assert_eq!(previous.end, period.start);
    }

    #[test]
    fn rejects_non_monday_start() {
        assert!(ReportPeriod::parse("2026-07-28").is_err());
        assert!(ReportPeriod::parse("2026-07-27").is_ok());
    }
}
