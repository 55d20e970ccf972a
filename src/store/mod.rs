pub mod queries;

use crate::analysis::{AnalysisResult, Category, PageInsight, Priority, QuickWin, TrafficAnalysis};
use crate::error::{DigestError, Result};
use crate::metrics::RawMetrics;
use crate::period::ReportPeriod;
use crate::trends::MetricTrend;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Collecting,
    Analyzing,
    Complete,
    Error,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collecting => "collecting",
            Self::Analyzing => "analyzing",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "collecting" => Some(Self::Collecting),
            "analyzing" => Some(Self::Analyzing),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HypothesisStatus {
    New,
    Accepted,
    Rejected,
    Implemented,
    Tested,
}

impl HypothesisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Implemented => "implemented",
            Self::Tested => "tested",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "new" => Some(Self::New),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "implemented" => Some(Self::Implemented),
            "tested" => Some(Self::Tested),
            _ => None,
        }
    }
}

/// Report lifecycle as data: `collecting → analyzing → complete | error`,
/// with `error` also reachable straight from `collecting`. Terminal states
/// allow nothing.
pub fn report_next_states(from: ReportStatus) -> &'static [ReportStatus] {
    match from {
        ReportStatus::Collecting => &[ReportStatus::Analyzing, ReportStatus::Error],
        ReportStatus::Analyzing => &[ReportStatus::Complete, ReportStatus::Error],
        ReportStatus::Complete | ReportStatus::Error => &[],
    }
}

/// Hypothesis triage lifecycle as data. `rejected` can be reopened;
/// `tested` is terminal.
pub fn hypothesis_next_states(from: HypothesisStatus) -> &'static [HypothesisStatus] {
    match from {
        HypothesisStatus::New => &[HypothesisStatus::Accepted, HypothesisStatus::Rejected],
        HypothesisStatus::Accepted => &[HypothesisStatus::Implemented, HypothesisStatus::Rejected],
        HypothesisStatus::Rejected => &[HypothesisStatus::New],
        HypothesisStatus::Implemented => &[HypothesisStatus::Tested],
        HypothesisStatus::Tested => &[],
    }
}

fn ensure_report_transition(from: ReportStatus, to: ReportStatus) -> Result<()> {
    if report_next_states(from).contains(&to) {
        Ok(())
    } else {
        Err(DigestError::InvalidStatusTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

fn ensure_hypothesis_transition(from: HypothesisStatus, to: HypothesisStatus) -> Result<()> {
    if hypothesis_next_states(from).contains(&to) {
        Ok(())
    } else {
        Err(DigestError::InvalidStatusTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub id: i64,
    pub period_start: String,
    pub period_end: String,
    pub status: ReportStatus,
    pub raw_metrics: Option<RawMetrics>,
    pub trends: Option<BTreeMap<String, MetricTrend>>,
    pub summary: Option<String>,
    pub page_insights: Option<Vec<PageInsight>>,
    pub traffic_analysis: Option<TrafficAnalysis>,
    pub quick_wins: Option<Vec<QuickWin>>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HypothesisRow {
    pub id: i64,
    pub report_id: i64,
    pub title: String,
    pub problem: String,
    pub solution: String,
    pub expected_impact: String,
    pub priority: Priority,
    pub category: Category,
    pub status: HypothesisStatus,
    pub notes: Option<String>,
    pub created_at: i64,
}

// Raw column values before enum/JSON decoding.
struct ReportRecord {
    id: i64,
    period_start: String,
    period_end: String,
    status: String,
    raw_metrics: Option<String>,
    trends: Option<String>,
    summary: Option<String>,
    page_insights: Option<String>,
    traffic_analysis: Option<String>,
    quick_wins: Option<String>,
    error_message: Option<String>,
    created_at: i64,
    completed_at: Option<i64>,
}

struct HypothesisRecord {
    id: i64,
    report_id: i64,
    title: String,
    problem: String,
    solution: String,
    expected_impact: String,
    priority: String,
    category: String,
    status: String,
    notes: Option<String>,
    created_at: i64,
}

const REPORT_COLUMNS: &str = "id, period_start, period_end, status, raw_metrics, trends, summary, \
     page_insights, traffic_analysis, quick_wins, error_message, created_at, completed_at";

const HYPOTHESIS_COLUMNS: &str = "id, report_id, title, problem, solution, expected_impact, \
     priority, category, status, notes, created_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        for statement in queries::schema_statements() {
            self.conn.execute(statement, [])?;
        }

        Ok(())
    }

    // ── Report lifecycle ────────────────────────────────────────────

    pub fn create_report(&self, period: &ReportPeriod) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO reports (period_start, period_end, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                period.start_str(),
                period.end_str(),
                ReportStatus::Collecting.as_str(),
                Utc::now().timestamp()
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_report(&self, id: i64) -> Result<ReportRow> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1"),
                params![id],
                map_report_record,
            )
            .optional()?
            .ok_or(DigestError::ReportNotFound(id))?;

        decode_report(record)
    }

    pub fn latest_report(&self) -> Result<Option<ReportRow>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {REPORT_COLUMNS} FROM reports ORDER BY period_start DESC, id DESC LIMIT 1"
                ),
                [],
                map_report_record,
            )
            .optional()?;

        record.map(decode_report).transpose()
    }

    pub fn list_reports(&self, limit: usize) -> Result<Vec<ReportRow>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports ORDER BY period_start DESC, id DESC LIMIT ?1"
        ))?;

        let records = statement
            .query_map(params![limit as i64], map_report_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        records.into_iter().map(decode_report).collect()
    }

    /// The duplicate-trigger precondition: any report for this period start
    /// that is not in `error` blocks a new collection run.
    pub fn non_error_report_for_period(&self, period_start: &str) -> Result<Option<ReportRow>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {REPORT_COLUMNS} FROM reports \
                     WHERE period_start = ?1 AND status != 'error' \
                     ORDER BY id DESC LIMIT 1"
                ),
                params![period_start],
                map_report_record,
            )
            .optional()?;

        record.map(decode_report).transpose()
    }

    pub fn begin_analysis(&self, id: i64, raw_metrics: &RawMetrics) -> Result<()> {
        let current = self.report_status(id)?;
        ensure_report_transition(current, ReportStatus::Analyzing)?;

        self.conn.execute(
            "UPDATE reports SET status = ?1, raw_metrics = ?2 WHERE id = ?3",
            params![
                ReportStatus::Analyzing.as_str(),
                serde_json::to_string(raw_metrics)?,
                id
            ],
        )?;

        Ok(())
    }

    /// Terminal success: narrative fields and the hypothesis batch land in
    /// one transaction so a report is never `complete` without its
    /// hypotheses (or vice versa).
    pub fn complete_report(
        &mut self,
        id: i64,
        trends: Option<&BTreeMap<String, MetricTrend>>,
        analysis: &AnalysisResult,
    ) -> Result<Vec<i64>> {
        let transaction = self.conn.transaction()?;

        let current = transaction
            .query_row(
                "SELECT status FROM reports WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or(DigestError::ReportNotFound(id))?;
        let current = ReportStatus::parse(&current)
            .ok_or_else(|| DigestError::CorruptRecord(format!("unknown report status: {current}")))?;
        ensure_report_transition(current, ReportStatus::Complete)?;

        let trends_json = trends.map(serde_json::to_string).transpose()?;

        transaction.execute(
            "UPDATE reports SET status = ?1, trends = ?2, summary = ?3, page_insights = ?4, \
             traffic_analysis = ?5, quick_wins = ?6, completed_at = ?7 WHERE id = ?8",
            params![
                ReportStatus::Complete.as_str(),
                trends_json,
                analysis.summary,
                serde_json::to_string(&analysis.page_insights)?,
                serde_json::to_string(&analysis.traffic_analysis)?,
                serde_json::to_string(&analysis.quick_wins)?,
                Utc::now().timestamp(),
                id
            ],
        )?;

        let created_at = Utc::now().timestamp();
        let mut hypothesis_ids = Vec::with_capacity(analysis.hypotheses.len());

        for draft in &analysis.hypotheses {
            transaction.execute(
                "INSERT INTO hypotheses (report_id, title, problem, solution, expected_impact, \
                 priority, category, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    draft.title,
                    draft.problem,
                    draft.solution,
                    draft.expected_impact,
                    draft.priority.as_str(),
                    draft.category.as_str(),
                    HypothesisStatus::New.as_str(),
                    created_at
                ],
            )?;
            hypothesis_ids.push(transaction.last_insert_rowid());
        }

        transaction.commit()?;

        Ok(hypothesis_ids)
    }

    /// Terminal failure; no narrative fields are written.
    pub fn fail_report(&self, id: i64, message: &str) -> Result<()> {
        let current = self.report_status(id)?;
        ensure_report_transition(current, ReportStatus::Error)?;

        self.conn.execute(
            "UPDATE reports SET status = ?1, error_message = ?2 WHERE id = ?3",
            params![ReportStatus::Error.as_str(), message, id],
        )?;

        Ok(())
    }

    fn report_status(&self, id: i64) -> Result<ReportStatus> {
        let raw = self
            .conn
            .query_row(
                "SELECT status FROM reports WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or(DigestError::ReportNotFound(id))?;

        ReportStatus::parse(&raw)
            .ok_or_else(|| DigestError::CorruptRecord(format!("unknown report status: {raw}")))
    }

    // ── Hypothesis lifecycle ────────────────────────────────────────

    pub fn get_hypothesis(&self, id: i64) -> Result<HypothesisRow> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {HYPOTHESIS_COLUMNS} FROM hypotheses WHERE id = ?1"),
                params![id],
                map_hypothesis_record,
            )
            .optional()?
            .ok_or(DigestError::HypothesisNotFound(id))?;

        decode_hypothesis(record)
    }

    pub fn hypotheses_for_report(&self, report_id: i64) -> Result<Vec<HypothesisRow>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {HYPOTHESIS_COLUMNS} FROM hypotheses WHERE report_id = ?1 ORDER BY id ASC"
        ))?;

        let records = statement
            .query_map(params![report_id], map_hypothesis_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        records.into_iter().map(decode_hypothesis).collect()
    }

    /// Single-row status write. The transition is validated against the
    /// value read inside the same transaction, so concurrent writers get
    /// last-write-wins with the state machine still enforced.
    pub fn set_hypothesis_status(&mut self, id: i64, to: HypothesisStatus) -> Result<HypothesisRow> {
        let transaction = self.conn.transaction()?;

        let current = transaction
            .query_row(
                "SELECT status FROM hypotheses WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or(DigestError::HypothesisNotFound(id))?;
        let current = HypothesisStatus::parse(&current).ok_or_else(|| {
            DigestError::CorruptRecord(format!("unknown hypothesis status: {current}"))
        })?;

        ensure_hypothesis_transition(current, to)?;

        transaction.execute(
            "UPDATE hypotheses SET status = ?1 WHERE id = ?2",
            params![to.as_str(), id],
        )?;
        transaction.commit()?;

        self.get_hypothesis(id)
    }

    /// Notes are free-form operator annotations, settable in any status.
    pub fn set_hypothesis_notes(&self, id: i64, notes: Option<&str>) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE hypotheses SET notes = ?1 WHERE id = ?2",
            params![notes, id],
        )?;

        if updated == 0 {
            return Err(DigestError::HypothesisNotFound(id));
        }

        Ok(())
    }
}

fn map_report_record(row: &rusqlite::Row<'_>) -> std::result::Result<ReportRecord, rusqlite::Error> {
    Ok(ReportRecord {
        id: row.get(0)?,
        period_start: row.get(1)?,
        period_end: row.get(2)?,
        status: row.get(3)?,
        raw_metrics: row.get(4)?,
        trends: row.get(5)?,
        summary: row.get(6)?,
        page_insights: row.get(7)?,
        traffic_analysis: row.get(8)?,
        quick_wins: row.get(9)?,
        error_message: row.get(10)?,
        created_at: row.get(11)?,
        completed_at: row.get(12)?,
    })
}

fn map_hypothesis_record(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<HypothesisRecord, rusqlite::Error> {
    Ok(HypothesisRecord {
        id: row.get(0)?,
        report_id: row.get(1)?,
        title: row.get(2)?,
        problem: row.get(3)?,
        solution: row.get(4)?,
        expected_impact: row.get(5)?,
        priority: row.get(6)?,
        category: row.get(7)?,
        status: row.get(8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn decode_report(record: ReportRecord) -> Result<ReportRow> {
    let status = ReportStatus::parse(&record.status).ok_or_else(|| {
        DigestError::CorruptRecord(format!("unknown report status: {}", record.status))
    })?;

    Ok(ReportRow {
        id: record.id,
        period_start: record.period_start,
        period_end: record.period_end,
        status,
        raw_metrics: decode_json(record.raw_metrics.as_deref())?,
        trends: decode_json(record.trends.as_deref())?,
        summary: record.summary,
        page_insights: decode_json(record.page_insights.as_deref())?,
        traffic_analysis: decode_json(record.traffic_analysis.as_deref())?,
        quick_wins: decode_json(record.quick_wins.as_deref())?,
        error_message: record.error_message,
        created_at: record.created_at,
        completed_at: record.completed_at,
    })
}

fn decode_hypothesis(record: HypothesisRecord) -> Result<HypothesisRow> {
    let priority = Priority::parse(&record.priority).ok_or_else(|| {
        DigestError::CorruptRecord(format!("unknown hypothesis priority: {}", record.priority))
    })?;
    let category = Category::parse(&record.category).ok_or_else(|| {
        DigestError::CorruptRecord(format!("unknown hypothesis category: {}", record.category))
    })?;
    let status = HypothesisStatus::parse(&record.status).ok_or_else(|| {
        DigestError::CorruptRecord(format!("unknown hypothesis status: {}", record.status))
    })?;

    Ok(HypothesisRow {
        id: record.id,
        report_id: record.report_id,
        title: record.title,
        problem: record.problem,
        solution: record.solution,
        expected_impact: record.expected_impact,
        priority,
        category,
        status,
        notes: record.notes,
        created_at: record.created_at,
    })
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: Option<&str>) -> Result<Option<T>> {
    raw.map(|value| {
        serde_json::from_str(value)
            .map_err(|error| DigestError::CorruptRecord(format!("bad JSON column: {error}")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::{Database, HypothesisStatus, ReportStatus};
    use crate::analysis::{
        AnalysisResult, Category, HypothesisDraft, PageInsight, Priority, QuickWin,
        TrafficAnalysis,
    };
    use crate::error::DigestError;
    use crate::metrics::RawMetrics;
    use crate::period::ReportPeriod;
    use crate::trends::build_trend_map;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn open_database(dir: &TempDir) -> Database {
        Database::open(&dir.path().join("sitepulse.db")).expect("open database")
    }

    fn period() -> ReportPeriod {
        ReportPeriod::starting(
            NaiveDate::parse_from_str("2026-07-27", "%Y-%m-%d").expect("date"),
        )
        .expect("monday")
    }

    fn sample_analysis(hypothesis_count: usize) -> AnalysisResult {
        let hypotheses = (0..hypothesis_count)
            .map(|index| HypothesisDraft {
                title: format!("Hypothesis {index}"),
                problem: "Mobile bounce rate is high".to_string(),
                solution: "Simplify the inquiry form".to_string(),
                expected_impact: "More inquiry submissions".to_string(),
                priority: if index == 0 {
                    Priority::High
                } else {
                    Priority::Medium
                },
                category: Category::Ux,
            })
            .collect();

        AnalysisResult {
            summary: "Traffic grew, conversions stayed flat.".to_string(),
            hypotheses,
            quick_wins: vec![QuickWin {
                title: "Compress hero images".to_string(),
                description: "Top pages ship multi-MB JPEGs".to_string(),
                effort: crate::analysis::Effort::Low,
            }],
            page_insights: vec![PageInsight {
                path: "/yachts".to_string(),
                insight: "Strong views, weak conversion".to_string(),
            }],
            traffic_analysis: TrafficAnalysis {
                summary: "Organic search dominates".to_string(),
                top_sources: vec!["google / organic".to_string()],
            },
        }
    }

    fn raw_metrics(sessions: u64) -> RawMetrics {
        RawMetrics {
            sessions,
            ..RawMetrics::default()
        }
    }

    #[test]
    fn transition_tables_cover_exactly_the_legal_moves() {
        use super::{hypothesis_next_states, report_next_states};

        let report_states = [
            ReportStatus::Collecting,
            ReportStatus::Analyzing,
            ReportStatus::Complete,
            ReportStatus::Error,
        ];
        for from in report_states {
            for to in report_states {
                let legal = matches!(
                    (from, to),
                    (ReportStatus::Collecting, ReportStatus::Analyzing)
                        | (ReportStatus::Collecting, ReportStatus::Error)
                        | (ReportStatus::Analyzing, ReportStatus::Complete)
                        | (ReportStatus::Analyzing, ReportStatus::Error)
                );
                assert_eq!(report_next_states(from).contains(&to), legal);
            }
        }

        let hypothesis_states = [
            HypothesisStatus::New,
            HypothesisStatus::Accepted,
            HypothesisStatus::Rejected,
            HypothesisStatus::Implemented,
            HypothesisStatus::Tested,
        ];
        for from in hypothesis_states {
            for to in hypothesis_states {
                let legal = matches!(
                    (from, to),
                    (HypothesisStatus::New, HypothesisStatus::Accepted)
                        | (HypothesisStatus::New, HypothesisStatus::Rejected)
                        | (HypothesisStatus::Accepted, HypothesisStatus::Implemented)
                        | (HypothesisStatus::Accepted, HypothesisStatus::Rejected)
                        | (HypothesisStatus::Rejected, HypothesisStatus::New)
                        | (HypothesisStatus::Implemented, HypothesisStatus::Tested)
                );
                assert_eq!(hypothesis_next_states(from).contains(&to), legal);
            }
        }
    }

    #[test]
    fn report_happy_path_persists_narrative_and_hypotheses() {
        let dir = TempDir::new().expect("tempdir");
        let mut database = open_database(&dir);

        let report_id = database.create_report(&period()).expect("create");
        database
            .begin_analysis(report_id, &raw_metrics(1000))
            .expect("begin analysis");

        let trends = build_trend_map(&raw_metrics(1000), &raw_metrics(800));
        let ids = database
            .complete_report(report_id, Some(&trends), &sample_analysis(4))
            .expect("complete");

        assert_eq!(ids.len(), 4);

        let report = database.get_report(report_id).expect("get");
        assert_eq!(report.status, ReportStatus::Complete);
        assert_eq!(report.raw_metrics.expect("raw").sessions, 1000);
        assert_eq!(
            report.trends.expect("trends")["sessions"].change_percent,
            25.0
        );
        assert!(report.summary.is_some());
        assert!(report.completed_at.is_some());

        let hypotheses = database.hypotheses_for_report(report_id).expect("list");
        assert_eq!(hypotheses.len(), 4);
        assert!(
            hypotheses
                .iter()
                .all(|hypothesis| hypothesis.status == HypothesisStatus::New)
        );
    }

    #[test]
    fn failed_report_records_message_and_stays_terminal() {
        let dir = TempDir::new().expect("tempdir");
        let mut database = open_database(&dir);

        let report_id = database.create_report(&period()).expect("create");
        database
            .fail_report(report_id, "analytics provider unavailable: timeout")
            .expect("fail");

        let report = database.get_report(report_id).expect("get");
        assert_eq!(report.status, ReportStatus::Error);
        assert_eq!(
            report.error_message.as_deref(),
            Some("analytics provider unavailable: timeout")
        );
        assert!(report.summary.is_none());

        // Terminal: no completion, no second failure.
        assert!(matches!(
            database.complete_report(report_id, None, &sample_analysis(3)),
            Err(DigestError::InvalidStatusTransition { .. })
        ));
        assert!(matches!(
            database.fail_report(report_id, "again"),
            Err(DigestError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn complete_requires_analyzing_first() {
        let dir = TempDir::new().expect("tempdir");
        let mut database = open_database(&dir);

        let report_id = database.create_report(&period()).expect("create");

        assert!(matches!(
            database.complete_report(report_id, None, &sample_analysis(3)),
            Err(DigestError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn hypothesis_lifecycle_follows_the_transition_table() {
        let dir = TempDir::new().expect("tempdir");
        let mut database = open_database(&dir);

        let report_id = database.create_report(&period()).expect("create");
        database
            .begin_analysis(report_id, &raw_metrics(10))
            .expect("begin");
        let ids = database
            .complete_report(report_id, None, &sample_analysis(3))
            .expect("complete");
        let id = ids[0];

        for status in [
            HypothesisStatus::Accepted,
            HypothesisStatus::Implemented,
            HypothesisStatus::Tested,
        ] {
            let row = database.set_hypothesis_status(id, status).expect("advance");
            assert_eq!(row.status, status);
        }

        // tested is terminal.
        assert!(matches!(
            database.set_hypothesis_status(id, HypothesisStatus::New),
            Err(DigestError::InvalidStatusTransition { .. })
        ));

        // rejected hypotheses can be reopened.
        let other = ids[1];
        database
            .set_hypothesis_status(other, HypothesisStatus::Rejected)
            .expect("reject");
        let reopened = database
            .set_hypothesis_status(other, HypothesisStatus::New)
            .expect("reopen");
        assert_eq!(reopened.status, HypothesisStatus::New);
    }

    #[test]
    fn notes_are_settable_in_any_status() {
        let dir = TempDir::new().expect("tempdir");
        let mut database = open_database(&dir);

        let report_id = database.create_report(&period()).expect("create");
        database
            .begin_analysis(report_id, &raw_metrics(10))
            .expect("begin");
        let ids = database
            .complete_report(report_id, None, &sample_analysis(3))
            .expect("complete");

        database
            .set_hypothesis_notes(ids[0], Some("checked with design"))
            .expect("notes on new");

        database
            .set_hypothesis_status(ids[0], HypothesisStatus::Rejected)
            .expect("reject");
        database
            .set_hypothesis_notes(ids[0], Some("rejected: out of season"))
            .expect("notes on rejected");

        let row = database.get_hypothesis(ids[0]).expect("get");
        assert_eq!(row.notes.as_deref(), Some("rejected: out of season"));

        assert!(matches!(
            database.set_hypothesis_notes(9999, Some("nope")),
            Err(DigestError::HypothesisNotFound(9999))
        ));
    }

    #[test]
    fn duplicate_period_check_ignores_errored_reports() {
        let dir = TempDir::new().expect("tempdir");
        let database = open_database(&dir);

        let first = database.create_report(&period()).expect("create");
        assert!(
            database
                .non_error_report_for_period(&period().start_str())
                .expect("query")
                .is_some()
        );

        database.fail_report(first, "boom").expect("fail");
        assert!(
            database
                .non_error_report_for_period(&period().start_str())
                .expect("query")
                .is_none()
        );
    }

    #[test]
    fn list_reports_is_newest_first() {
        let dir = TempDir::new().expect("tempdir");
        let database = open_database(&dir);

        let older = period().previous();
        database.create_report(&older).expect("older");
        database.create_report(&period()).expect("newer");

        let reports = database.list_reports(10).expect("list");
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].period_start, period().start_str());

        let latest = database.latest_report().expect("latest").expect("some");
        assert_eq!(latest.period_start, period().start_str());
    }
}
