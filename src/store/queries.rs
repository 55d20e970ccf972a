pub const CREATE_REPORTS: &str = r#"
CREATE TABLE IF NOT EXISTS reports (
  id               INTEGER PRIMARY KEY AUTOINCREMENT,
  period_start     TEXT NOT NULL,
  period_end       TEXT NOT NULL,
  status           TEXT NOT NULL DEFAULT 'collecting',
  raw_metrics      TEXT,
  trends           TEXT,
  summary          TEXT,
  page_insights    TEXT,
  traffic_analysis TEXT,
  quick_wins       TEXT,
  error_message    TEXT,
  created_at       INTEGER NOT NULL,
  completed_at     INTEGER
);
"#;

pub const CREATE_HYPOTHESES: &str = r#"
CREATE TABLE IF NOT EXISTS hypotheses (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  report_id       INTEGER NOT NULL REFERENCES reports(id),
  title           TEXT NOT NULL,
  problem         TEXT NOT NULL,
  solution        TEXT NOT NULL,
  expected_impact TEXT NOT NULL,
  priority        TEXT NOT NULL,
  category        TEXT NOT NULL,
  status          TEXT NOT NULL DEFAULT 'new',
  notes           TEXT,
  created_at      INTEGER NOT NULL
);
"#;

pub const INDEX_REPORTS_PERIOD_START: &str =
    "CREATE INDEX IF NOT EXISTS idx_reports_period_start ON reports(period_start);";

pub const INDEX_REPORTS_CREATED_AT: &str =
    "CREATE INDEX IF NOT EXISTS idx_reports_created_at ON reports(created_at);";

pub const INDEX_HYPOTHESES_REPORT_ID: &str =
    "CREATE INDEX IF NOT EXISTS idx_hypotheses_report_id ON hypotheses(report_id);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_REPORTS,
        CREATE_HYPOTHESES,
        INDEX_REPORTS_PERIOD_START,
        INDEX_REPORTS_CREATED_AT,
        INDEX_HYPOTHESES_REPORT_ID,
    ]
}
