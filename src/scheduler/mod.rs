use crate::period::ReportPeriod;
use anyhow::{Context, Result};
use chrono::{
    DateTime, Datelike, Duration as ChronoDuration, Local, LocalResult, NaiveDate, NaiveTime,
    TimeZone, Weekday,
};
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

const RESCHEDULE_POLL_SECONDS: u64 = 30;

/// Poll-based weekly scheduler. Re-reads the schedule every poll so
/// config edits take effect without a restart; fires `task` with the last
/// completed week once per scheduled slot.
pub async fn run_weekly_scheduler<S, F, Fut>(mut schedule_provider: S, mut task: F) -> Result<()>
where
    S: FnMut() -> Result<(Weekday, NaiveTime)>,
    F: FnMut(ReportPeriod) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut last_logged_schedule = None;

    loop {
        let schedule = match schedule_provider() {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "failed to load digest schedule");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        let delay = match delay_until_next_run(schedule.0, schedule.1, Local::now()) {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "invalid digest schedule");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        if last_logged_schedule != Some(schedule) {
            info!(
                seconds = delay.as_secs(),
                day = %schedule.0,
                time = %schedule.1,
                "next weekly digest scheduled"
            );
            last_logged_schedule = Some(schedule);
        }

        if delay > Duration::from_secs(RESCHEDULE_POLL_SECONDS) {
            sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
            continue;
        }

        sleep(delay).await;

        let period = ReportPeriod::last_completed(Local::now().date_naive());
        if let Err(error) = task(period).await {
            error!(error = %error, period = %period.label(), "scheduled collection failed");
        }

        sleep(Duration::from_secs(1)).await;
    }
}

fn delay_until_next_run(day: Weekday, time: NaiveTime, now: DateTime<Local>) -> Result<Duration> {
    let today = now.date_naive();
    let days_ahead = i64::from(
        (day.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7,
    );

    let candidate_date = today + ChronoDuration::days(days_ahead);
    let candidate = local_datetime(candidate_date, time)?;

    let next_run = if candidate > now {
        candidate
    } else {
        local_datetime(candidate_date + ChronoDuration::days(7), time)?
    };

    (next_run - now)
        .to_std()
        .context("Failed to compute next execution delay")
}

fn local_datetime(date: NaiveDate, time: NaiveTime) -> Result<DateTime<Local>> {
    match Local.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(datetime) => Ok(datetime),
        // DST gap: fall back to the same wall-clock time the next day.
        _ => Local
            .from_local_datetime(&(date + ChronoDuration::days(1)).and_time(time))
            .single()
            .context("Failed to convert schedule time"),
    }
}

#[cfg(test)]
mod tests {
    use super::delay_until_next_run;
    use chrono::{Local, NaiveTime, TimeZone, Weekday};

    fn thursday_noon() -> chrono::DateTime<Local> {
        // 2026-08-06 is a Thursday.
        Local
            .with_ymd_and_hms(2026, 8, 6, 12, 0, 0)
            .single()
            .expect("local datetime")
    }

    #[test]
    fn delay_is_positive_and_within_a_week_for_every_weekday() {
        let time = NaiveTime::from_hms_opt(8, 30, 0).expect("time");

        for day in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            let delay = delay_until_next_run(day, time, thursday_noon()).expect("delay");
            assert!(delay.as_secs() > 0);
            assert!(delay.as_secs() <= 8 * 24 * 3600);
        }
    }

    #[test]
    fn later_slot_today_fires_today() {
        let time = NaiveTime::from_hms_opt(13, 0, 0).expect("time");
        let delay = delay_until_next_run(Weekday::Thu, time, thursday_noon()).expect("delay");

        assert_eq!(delay.as_secs(), 3600);
    }

    #[test]
    fn elapsed_slot_today_moves_to_next_week() {
        let time = NaiveTime::from_hms_opt(8, 0, 0).expect("time");
        let delay = delay_until_next_run(Weekday::Thu, time, thursday_noon()).expect("delay");

        assert!(delay.as_secs() > 6 * 24 * 3600);
    }
}
