//! HTTP surface of the dashboard: JSON views over one pipeline run per
//! request, plus the anomalies CSV download.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use energy_domain::{DetectedSchema, HeatmapGrid, ScoredPoint, HOURS_PER_DAY, WEEKDAY_NAMES};
use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime, PrimitiveDateTime};

use crate::{
    calendar::{DayStatus, HolidayLookup},
    config::{AppConfig, SourceKind},
    pipeline::{self, DashboardSummary, Pipeline, PipelineError, PipelineOutput, PipelineParams, TimeWindow},
    sinks::{export_anomalies_csv, ExportError},
    sources::CsvFileSource,
    timestamp::parse_timestamp,
    transform::LoadError,
};

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub holidays: Arc<HolidayLookup>,
}

impl AppState {
    pub fn new(config: AppConfig, holidays: HolidayLookup) -> Self {
        Self {
            config: Arc::new(config),
            holidays: Arc::new(holidays),
        }
    }
}

/// Query string or form body accepted by every dashboard route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    pub source: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub contamination: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid {field} '{value}'")]
    BadRequest { field: &'static str, value: String },
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to export anomalies: {0}")]
    Export(#[from] ExportError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Pipeline(PipelineError::Schema(_))
            | Self::Pipeline(PipelineError::Load(LoadError::NoValidRows { .. }))
            | Self::Pipeline(PipelineError::Load(LoadError::MissingColumn(_))) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Pipeline(_) | Self::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::info!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct AnomalyRow {
    #[serde(flatten)]
    pub point: ScoredPoint,
    pub day_status: DayStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holiday: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HeatmapView {
    pub days: [&'static str; 7],
    pub hours: Vec<u8>,
    pub counts: [[u32; HOURS_PER_DAY]; 7],
}

impl From<&HeatmapGrid> for HeatmapView {
    fn from(grid: &HeatmapGrid) -> Self {
        Self {
            days: WEEKDAY_NAMES,
            hours: (0..HOURS_PER_DAY as u8).collect(),
            counts: *grid.counts(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub source: &'static str,
    pub contamination: f64,
    pub schema: DetectedSchema,
    pub loaded_rows: usize,
    pub dropped_rows: usize,
    pub summary: DashboardSummary,
    pub series: Vec<ScoredPoint>,
    pub heatmap: HeatmapView,
    pub latest_anomalies: Vec<AnomalyRow>,
}

#[derive(Debug, Serialize)]
pub struct HeatmapResponse {
    pub source: &'static str,
    pub heatmap: HeatmapView,
}

#[derive(Debug, Serialize)]
pub struct AnomaliesResponse {
    pub source: &'static str,
    pub anomalies: Vec<AnomalyRow>,
}

/// A request after parameter validation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ResolvedRequest {
    source: SourceKind,
    window: TimeWindow,
    contamination: f64,
}

fn resolve(config: &AppConfig, query: &DashboardQuery) -> Result<ResolvedRequest, ApiError> {
    Ok(ResolvedRequest {
        source: SourceKind::from_param(query.source.as_deref()),
        window: TimeWindow {
            start: parse_bound("start", query.start.as_deref())?,
            end: parse_bound("end", query.end.as_deref())?,
        },
        contamination: config.detection.resolve_contamination(query.contamination.as_deref()),
    })
}

fn parse_bound(field: &'static str, value: Option<&str>) -> Result<Option<PrimitiveDateTime>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_timestamp(text).map(Some).ok_or_else(|| ApiError::BadRequest {
            field,
            value: text.to_string(),
        }),
    }
}

async fn run_request(state: &AppState, request: ResolvedRequest) -> Result<PipelineOutput, ApiError> {
    let config = &state.config;
    let source = CsvFileSource::new(
        request.source.as_str(),
        config.sources.path_for(request.source).clone(),
    );
    let pipeline = Arc::new(Pipeline::new(
        config.schema.clone(),
        PipelineParams {
            bucket: config.detection.bucket,
            window: request.window,
            detector: config.detection.detector_params(request.contamination),
        },
    ));

    Ok(pipeline::run_source(&source, pipeline).await?)
}

fn anomaly_rows(holidays: &HolidayLookup, points: Vec<ScoredPoint>) -> Vec<AnomalyRow> {
    points
        .into_iter()
        .map(|point| AnomalyRow {
            day_status: holidays.day_status(point.ts),
            holiday: holidays.label(point.ts.date()).map(str::to_string),
            point,
        })
        .collect()
}

async fn home(State(state): State<AppState>, Query(query): Query<DashboardQuery>) -> Result<Json<HomeResponse>, ApiError> {
    dashboard(state, query).await
}

async fn home_form(State(state): State<AppState>, Form(query): Form<DashboardQuery>) -> Result<Json<HomeResponse>, ApiError> {
    dashboard(state, query).await
}

async fn dashboard(state: AppState, query: DashboardQuery) -> Result<Json<HomeResponse>, ApiError> {
    metrics::counter!("http_requests_total", "route" => "home").increment(1);

    let request = resolve(&state.config, &query)?;
    let output = run_request(&state, request).await?;
    let dashboard_cfg = &state.config.dashboard;

    let latest = output.latest_anomalies(dashboard_cfg.home_table_limit);
    Ok(Json(HomeResponse {
        source: request.source.as_str(),
        contamination: request.contamination,
        summary: output.summary(dashboard_cfg.tariff_per_kwh),
        heatmap: HeatmapView::from(&output.heatmap),
        latest_anomalies: anomaly_rows(&state.holidays, latest),
        schema: output.schema,
        loaded_rows: output.loaded_rows,
        dropped_rows: output.dropped_rows,
        series: output.series,
    }))
}

async fn heatmap(State(state): State<AppState>, Query(query): Query<DashboardQuery>) -> Result<Json<HeatmapResponse>, ApiError> {
    metrics::counter!("http_requests_total", "route" => "heatmap").increment(1);

    let request = resolve(&state.config, &query)?;
    let output = run_request(&state, request).await?;

    Ok(Json(HeatmapResponse {
        source: request.source.as_str(),
        heatmap: HeatmapView::from(&output.heatmap),
    }))
}

async fn anomalies(State(state): State<AppState>, Query(query): Query<DashboardQuery>) -> Result<Json<AnomaliesResponse>, ApiError> {
    metrics::counter!("http_requests_total", "route" => "anomalies").increment(1);

    let request = resolve(&state.config, &query)?;
    let output = run_request(&state, request).await?;
    let latest = output.latest_anomalies(state.config.dashboard.anomalies_table_limit);

    Ok(Json(AnomaliesResponse {
        source: request.source.as_str(),
        anomalies: anomaly_rows(&state.holidays, latest),
    }))
}

async fn download_anomalies(State(state): State<AppState>, Query(query): Query<DashboardQuery>) -> Result<Response, ApiError> {
    metrics::counter!("http_requests_total", "route" => "download_anomalies").increment(1);

    let request = resolve(&state.config, &query)?;
    let output = run_request(&state, request).await?;
    let flagged: Vec<ScoredPoint> = output.anomalies().copied().collect();
    let body = export_anomalies_csv(&flagged)?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download_filename(request.source, OffsetDateTime::now_utc())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

fn download_filename(source: SourceKind, now: OffsetDateTime) -> String {
    let stamp = now
        .format(format_description!("[year][month][day]"))
        .unwrap_or_else(|_| "export".to_string());
    format!("anomalies_{}_{stamp}.csv", source.as_str())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home).post(home_form))
        .route("/home", get(home).post(home_form))
        .route("/heatmap", get(heatmap))
        .route("/anomalies", get(anomalies))
        .route("/download_anomalies", get(download_anomalies))
        .with_state(state)
}

pub async fn serve(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid server bind address '{bind_addr}': {e}"))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "dashboard listening");
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}
