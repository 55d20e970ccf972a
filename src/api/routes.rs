use crate::analysis::client::HttpModelClient;
use crate::config::Config;
use crate::error::DigestError;
use crate::metrics::client::HttpMetricsProvider;
use crate::notify;
use crate::period::ReportPeriod;
use crate::pipeline;
use crate::store::{Database, HypothesisRow, HypothesisStatus, ReportRow};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/collect", post(collect))
        .route("/api/v1/reports", get(report_list))
        .route("/api/v1/reports/:id", get(report_by_id))
        .route("/api/v1/reports/:id/hypotheses", get(report_hypotheses))
        .route("/api/v1/hypotheses/:id/status", put(hypothesis_status_put))
        .route("/api/v1/hypotheses/:id/notes", put(hypothesis_notes_put))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ReportsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CollectRequest {
    start: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusUpdatePayload {
    status: String,
}

#[derive(Debug, Deserialize)]
struct NotesUpdatePayload {
    notes: String,
}

#[derive(Debug, Serialize)]
struct ReportsPayload {
    reports: Vec<ReportRow>,
    latest_hypotheses: Vec<HypothesisRow>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    latest_report_period: Option<String>,
    latest_report_status: Option<String>,
    api_port: u16,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let latest = database.latest_report()?;

    Ok(Json(StatusPayload {
        latest_report_period: latest.as_ref().map(|report| report.period_start.clone()),
        latest_report_status: latest
            .as_ref()
            .map(|report| report.status.as_str().to_string()),
        api_port: state.config.api_port,
    }))
}

/// The guarded collection trigger. Runs the full pipeline for the
/// requested week (default: last completed week) and returns either the
/// new report id or the failure message verbatim.
async fn collect(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Option<Json<CollectRequest>>,
) -> ApiResult<Json<serde_json::Value>> {
    require_trigger_token(&state.config, &headers)?;

    let period = match body.as_ref().and_then(|request| request.start.as_deref()) {
        Some(start) => {
            ReportPeriod::parse(start).map_err(|error| ApiError::BadRequest(error.to_string()))?
        }
        None => ReportPeriod::last_completed(Local::now().date_naive()),
    };

    let provider = HttpMetricsProvider::from_config(&state.config)?;
    let model = HttpModelClient::from_config(&state.config)?;
    let channel = notify::channel_from_config(&state.config);

    let mut database = Database::open(&state.config.db_path)?;
    let outcome = pipeline::run_collection(
        &mut database,
        &provider,
        &model,
        channel.as_deref(),
        &state.config.business_context,
        period,
    )
    .await?;

    Ok(Json(json!({
        "report_id": outcome.report_id,
        "hypotheses": outcome.hypothesis_ids.len(),
        "period_start": period.start_str(),
    })))
}

async fn report_list(
    State(state): State<ApiState>,
    Query(query): Query<ReportsQuery>,
) -> ApiResult<Json<ReportsPayload>> {
    let limit = query.limit.unwrap_or(8).clamp(1, 52);
    let database = Database::open(&state.config.db_path)?;

    let reports = database.list_reports(limit)?;
    let latest_hypotheses = match reports.first() {
        Some(report) => database.hypotheses_for_report(report.id)?,
        None => Vec::new(),
    };

    Ok(Json(ReportsPayload {
        reports,
        latest_hypotheses,
    }))
}

async fn report_by_id(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ReportRow>> {
    let database = Database::open(&state.config.db_path)?;
    Ok(Json(database.get_report(id)?))
}

async fn report_hypotheses(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<HypothesisRow>>> {
    let database = Database::open(&state.config.db_path)?;

    // 404 on unknown reports instead of an empty list.
    database.get_report(id)?;

    Ok(Json(database.hypotheses_for_report(id)?))
}

async fn hypothesis_status_put(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(payload): Json<StatusUpdatePayload>,
) -> ApiResult<Json<HypothesisRow>> {
    let status = HypothesisStatus::parse(&payload.status).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Unknown hypothesis status: {}. Expected new|accepted|rejected|implemented|tested",
            payload.status
        ))
    })?;

    let mut database = Database::open(&state.config.db_path)?;
    Ok(Json(database.set_hypothesis_status(id, status)?))
}

async fn hypothesis_notes_put(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(payload): Json<NotesUpdatePayload>,
) -> ApiResult<Json<HypothesisRow>> {
    let database = Database::open(&state.config.db_path)?;

    let notes = payload.notes.trim();
    database.set_hypothesis_notes(id, (!notes.is_empty()).then_some(notes))?;

    Ok(Json(database.get_hypothesis(id)?))
}

fn require_trigger_token(config: &Config, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = config.resolve_trigger_token() else {
        warn!("collection trigger rejected: trigger_token is not configured");
        return Err(DigestError::Unauthorized.into());
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected => Ok(()),
        _ => Err(DigestError::Unauthorized.into()),
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<DigestError> for ApiError {
    fn from(value: DigestError) -> Self {
        match value {
            DigestError::Unauthorized => Self::Unauthorized,
            DigestError::DuplicatePeriod { .. } | DigestError::InvalidStatusTransition { .. } => {
                Self::Conflict(value.to_string())
            }
            DigestError::ReportNotFound(_) | DigestError::HypothesisNotFound(_) => {
                Self::NotFound(value.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "missing or invalid trigger credential".to_string(),
            ),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
