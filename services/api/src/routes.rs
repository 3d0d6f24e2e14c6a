use crate::infra::{deserialize_optional_date, AppState};
use crate::pipeline::ScheduleInputs;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{Local, NaiveDate};
use inspection_scheduler::config::ConfigError;
use inspection_scheduler::error::AppError;
use inspection_scheduler::workflows::inspections::{RepairReport, Unit};
use inspection_scheduler::workflows::rent_roll::{events_to_csv, units_to_csv};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleRequest {
    pub(crate) units_csv: String,
    #[serde(default)]
    pub(crate) prior_schedule_csv: Option<String>,
    #[serde(default)]
    pub(crate) tenants_csv: Option<String>,
    #[serde(default)]
    pub(crate) last_inspection_csv: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) max_per_day: Option<usize>,
    #[serde(default)]
    pub(crate) max_per_week: Option<usize>,
    #[serde(default)]
    pub(crate) format: ExportFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ExportFormat {
    #[default]
    Json,
    UnitsCsv,
    EventsCsv,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScheduleResponse {
    pub(crate) today: NaiveDate,
    pub(crate) earliest_date: NaiveDate,
    pub(crate) horizon_date: NaiveDate,
    pub(crate) report: RepairReport,
    pub(crate) units: Vec<Unit>,
}

pub(crate) fn router() -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/schedule", post(schedule_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn schedule_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ScheduleRequest>,
) -> Result<Response, AppError> {
    let ScheduleRequest {
        units_csv,
        prior_schedule_csv,
        tenants_csv,
        last_inspection_csv,
        today,
        max_per_day,
        max_per_week,
        format,
    } = payload;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let mut scheduling = (*state.scheduling).clone();
    scheduling.max_per_day = max_per_day.unwrap_or(scheduling.max_per_day);
    scheduling.max_per_week = max_per_week.unwrap_or(scheduling.max_per_week);
    let policy = scheduling.policy(today).map_err(|err| match err {
        ConfigError::InvalidPolicy(reason) => AppError::BadRequest(reason),
        other => AppError::Config(other),
    })?;

    let (earliest_date, horizon_date) = (policy.earliest_date, policy.horizon_date);

    // Import, repair and rendering are CPU bound; keep them off the async workers.
    tokio::task::spawn_blocking(move || -> Result<Response, AppError> {
        let inputs = ScheduleInputs {
            units: units_csv.as_bytes(),
            prior_schedule: prior_schedule_csv.as_deref().map(str::as_bytes),
            last_inspection: last_inspection_csv.as_deref().map(str::as_bytes),
            tenants: tenants_csv.as_deref().map(str::as_bytes),
        };
        let outcome = inputs.run(&policy)?;
        info!(
            units = outcome.units.len(),
            mutations = outcome.report.mutations(),
            ?format,
            "schedule request served"
        );

        let response = match format {
            ExportFormat::Json => Json(ScheduleResponse {
                today,
                earliest_date,
                horizon_date,
                report: outcome.report,
                units: outcome.units,
            })
            .into_response(),
            ExportFormat::UnitsCsv => csv_response(units_to_csv(&outcome.units)?),
            ExportFormat::EventsCsv => csv_response(events_to_csv(&outcome.units)?),
        };
        Ok(response)
    })
    .await
    .map_err(|err| AppError::Task(format!("schedule task join error: {}", err)))?
}

fn csv_response(body: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response()
}
