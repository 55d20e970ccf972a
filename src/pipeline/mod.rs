use crate::analysis::{ModelClient, analyze};
use crate::error::{DigestError, Result};
use crate::metrics::{MetricsProvider, RawMetrics};
use crate::notify::{NotificationChannel, format_digest};
use crate::period::ReportPeriod;
use crate::store::Database;
use crate::trends::build_trend_map;
use tracing::{info, warn};

#[derive(Debug)]
pub struct CollectionOutcome {
    pub report_id: i64,
    pub hypothesis_ids: Vec<i64>,
}

/// Runs one full collection for `period`: duplicate check, snapshot fetch,
/// trend computation, model analysis, persistence, notification.
///
/// Every failure after report creation lands the report in `error` with
/// the message recorded; retries are a new trigger, never an internal
/// loop. Notification is best-effort and cannot fail the run.
pub async fn run_collection(
    database: &mut Database,
    provider: &dyn MetricsProvider,
    model: &dyn ModelClient,
    channel: Option<&dyn NotificationChannel>,
    business_context: &str,
    period: ReportPeriod,
) -> Result<CollectionOutcome> {
    if database
        .non_error_report_for_period(&period.start_str())?
        .is_some()
    {
        return Err(DigestError::DuplicatePeriod {
            start: period.start_str(),
        });
    }

    let report_id = database.create_report(&period)?;
    info!(report_id, period = %period.label(), "collection started");

    match collect_and_analyze(database, provider, model, business_context, &period, report_id).await
    {
        Ok(hypothesis_ids) => {
            info!(
                report_id,
                hypotheses = hypothesis_ids.len(),
                "report complete"
            );

            if let Some(channel) = channel {
                let report = database.get_report(report_id)?;
                let hypotheses = database.hypotheses_for_report(report_id)?;

                if let Err(error) = channel.send(&format_digest(&report, &hypotheses)).await {
                    warn!(report_id, error = %error, "digest notification failed");
                }
            }

            Ok(CollectionOutcome {
                report_id,
                hypothesis_ids,
            })
        }
        Err(error) => {
            if let Err(store_error) = database.fail_report(report_id, &error.to_string()) {
                warn!(report_id, error = %store_error, "failed to record report error state");
            }

            Err(error)
        }
    }
}

async fn collect_and_analyze(
    database: &mut Database,
    provider: &dyn MetricsProvider,
    model: &dyn ModelClient,
    business_context: &str,
    period: &ReportPeriod,
    report_id: i64,
) -> Result<Vec<i64>> {
    let current = provider.fetch_snapshot(period).await?;
    let previous = provider.fetch_snapshot(&period.previous()).await?;

    let raw_metrics = RawMetrics::from_snapshot(&current);
    database.begin_analysis(report_id, &raw_metrics)?;

    // An all-zero previous week means there is no prior data to compare
    // against, not a week that was 100% worse.
    let previous = (!previous.is_empty()).then_some(previous);
    let trends = previous
        .as_ref()
        .map(|snapshot| build_trend_map(&raw_metrics, &RawMetrics::from_snapshot(snapshot)));

    let analysis = analyze(model, &current, previous.as_ref(), business_context).await?;

    database.complete_report(report_id, trends.as_ref(), &analysis)
}
