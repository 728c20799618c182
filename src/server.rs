use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::alert::engine::{evaluate_alerts, AlertEvent};
use crate::alert::rules::apply_alert_rules;
use crate::config::Config;
use crate::drift::history::{record_from_outcome, summarize_runs, RunRecord};
use crate::drift::{
    check_and_report, validate_threshold, CheckOutcome, CheckStatus, DriftReport, GateDecision,
    NoEvaluableFeatures,
};
use crate::output::ReportFormat;
use crate::snapshot::store::RunStore;
use crate::snapshot::LoadError;

#[derive(Clone)]
struct ApiState {
    config: Config,
    db_path: PathBuf,
    report_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unprocessable(error: &LoadError) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: error.to_string(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast_ref::<LoadError>() {
            Some(load) => Self::unprocessable(load),
            None => Self::internal(format!("{error:#}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Deserialize)]
struct CheckRequest {
    baseline: PathBuf,
    current: PathBuf,
    threshold: Option<f64>,
    /// Relative to `[report] dir`.
    report: Option<PathBuf>,
    format: Option<ReportFormat>,
    exclude: Option<Vec<String>>,
    record: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct CheckResponse {
    status: CheckStatus,
    exit_code: u8,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<DriftReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<GateDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    no_evaluable_features: Option<NoEvaluableFeatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_path: Option<PathBuf>,
    alerts: Vec<AlertEvent>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    summary: String,
    records: Vec<RunRecord>,
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let state = ApiState {
        db_path: config.resolved_db_path(),
        report_dir: config.resolved_report_dir(),
        config,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/check", post(check))
        .route("/v1/history", get(history))
        .route("/v1/config", get(show_config))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("drift API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn check(
    State(state): State<ApiState>,
    Json(request): Json<CheckRequest>,
) -> ApiResult<CheckResponse> {
    let mut settings = state.config.drift_settings();
    if let Some(threshold) = request.threshold {
        settings.threshold =
            validate_threshold(threshold).map_err(|e| ApiError::bad_request(e.to_string()))?;
    }
    if let Some(exclude) = request.exclude.clone() {
        settings.excluded_columns = exclude;
    }
    let report_path = request
        .report
        .as_deref()
        .map(|requested| resolve_report_path(&state.report_dir, requested))
        .transpose()?;
    let options = state.config.load_options();
    let record = request.record.unwrap_or(state.config.storage.record_runs);
    let format = request.format.or(state.config.report.format);
    let db_path = state.db_path.clone();

    let response = tokio::task::spawn_blocking(move || -> Result<CheckResponse> {
        let outcome = check_and_report(
            &request.baseline,
            &request.current,
            report_path.as_deref(),
            &options,
            &settings,
            format,
        )?;
        let written = match &outcome {
            CheckOutcome::Evaluated { .. } => report_path,
            CheckOutcome::NoEvaluableFeatures(_) => None,
        };

        let previous = if record {
            record_run(&db_path, &request.baseline, &request.current, &outcome)?
        } else {
            None
        };
        let alerts = apply_alert_rules(
            evaluate_alerts(previous, &outcome),
            &state.config.alerts.rules,
        );

        Ok(into_response(outcome, written, alerts))
    })
    .await
    .map_err(ApiError::internal)??;

    Ok(ok(response))
}

async fn history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let limit = query.limit.unwrap_or(50).clamp(1, 1000);
    let db_path = state.db_path.clone();
    let records = tokio::task::spawn_blocking(move || -> Result<Vec<RunRecord>> {
        RunStore::open(&db_path)?.load_runs(limit)
    })
    .await
    .map_err(ApiError::internal)??;
    let summary = summarize_runs(&records);
    Ok(ok(HistoryResponse { summary, records }))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

/// Stores the run and returns the status of the run recorded before it.
fn record_run(
    db_path: &Path,
    baseline: &Path,
    current: &Path,
    outcome: &CheckOutcome,
) -> Result<Option<CheckStatus>> {
    let store = RunStore::open(db_path)?;
    let previous = store.load_runs(1)?.first().map(|r| r.status);
    let record = record_from_outcome(
        baseline.display().to_string(),
        current.display().to_string(),
        outcome,
    );
    store.insert_run(&record)?;
    Ok(previous)
}

/// Places a requested report path under `root`. Absolute paths and any `..`
/// component are rejected.
fn resolve_report_path(root: &Path, requested: &Path) -> std::result::Result<PathBuf, ApiError> {
    let mut relative = PathBuf::new();
    for component in requested.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ApiError::bad_request(format!(
                    "report path must be relative to the report directory: {}",
                    requested.display()
                )));
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(ApiError::bad_request("report path is empty"));
    }
    Ok(root.join(relative))
}

fn into_response(
    outcome: CheckOutcome,
    report_path: Option<PathBuf>,
    alerts: Vec<AlertEvent>,
) -> CheckResponse {
    let status = outcome.status();
    let message = outcome.message();
    let (report, decision, no_evaluable_features) = match outcome {
        CheckOutcome::Evaluated { report, decision } => (Some(report), Some(decision), None),
        CheckOutcome::NoEvaluableFeatures(empty) => (None, None, Some(empty)),
    };
    CheckResponse {
        status,
        exit_code: status.exit_code(),
        message,
        report,
        decision,
        no_evaluable_features,
        report_path,
        alerts,
    }
}
