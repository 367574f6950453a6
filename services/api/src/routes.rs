use crate::infra::{as_of_moment, deserialize_date, deserialize_optional_date, AppState};
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{Local, NaiveDate};
use lending_ops::engine::{
    application_debt, by_entity, category_summary, classify, compile, matching_rule, over_time,
    portfolio_overview, reconcile, schedule, status_distribution, ApplicationId, Category,
    CategoryCount, DebtSummary, EntityBucket, EntityDimension, FilterSpec, Granularity, Payment,
    PortfolioOverview, ScheduleEntry, StatusDistribution, TimeSeries,
};
use lending_ops::error::AppError;
use lending_ops::repository::RepositoryError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/applications/query", post(query_endpoint))
        .route(
            "/api/v1/applications/:application_id/debt",
            get(debt_endpoint),
        )
        .route("/api/v1/schedule", post(schedule_endpoint))
        .route("/api/v1/reconcile", post(reconcile_endpoint))
        .route("/api/v1/status/:raw_status", get(status_endpoint))
        .layer(Extension(state))
}

fn today_or(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Local::now().date_naive())
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
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueryRequest {
    #[serde(default)]
    pub(crate) filter: FilterSpec,
    #[serde(default)]
    pub(crate) granularity: Granularity,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QueryResponse {
    pub(crate) as_of: NaiveDate,
    pub(crate) total: usize,
    pub(crate) matched: usize,
    pub(crate) application_ids: Vec<ApplicationId>,
    pub(crate) categories: Vec<CategoryCount>,
    pub(crate) by_fillial: Vec<EntityBucket>,
    pub(crate) by_merchant: Vec<EntityBucket>,
    pub(crate) statuses: StatusDistribution,
    pub(crate) timeline: TimeSeries,
    pub(crate) portfolio: PortfolioOverview,
}

pub(crate) async fn query_endpoint(
    Extension(state): Extension<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let applications = state.repository.list()?;
    let directory = state.repository.directory()?;
    let filter = compile(&request.filter, &directory)?;
    let matched = filter.apply(&applications);
    let as_of = today_or(request.as_of);

    debug!(
        total = applications.len(),
        matched = matched.len(),
        granularity = %request.granularity,
        "application query evaluated"
    );

    Ok(Json(QueryResponse {
        as_of,
        total: applications.len(),
        matched: matched.len(),
        application_ids: matched.iter().map(|application| application.id).collect(),
        categories: category_summary(matched.iter().copied()),
        by_fillial: by_entity(matched.iter().copied(), EntityDimension::Fillial, &directory),
        by_merchant: by_entity(matched.iter().copied(), EntityDimension::Merchant, &directory),
        statuses: status_distribution(matched.iter().copied()),
        timeline: over_time(matched.iter().copied(), request.granularity),
        portfolio: portfolio_overview(matched.iter().copied(), as_of_moment(as_of))?,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DebtQuery {
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) as_of: Option<NaiveDate>,
}

pub(crate) async fn debt_endpoint(
    Extension(state): Extension<AppState>,
    Path(application_id): Path<u64>,
    Query(query): Query<DebtQuery>,
) -> Result<Json<DebtSummary>, AppError> {
    let application = state
        .repository
        .fetch(ApplicationId(application_id))?
        .ok_or(RepositoryError::NotFound(application_id))?;
    let as_of = as_of_moment(today_or(query.as_of));

    Ok(Json(application_debt(&application, as_of)?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleRequest {
    pub(crate) total: i64,
    pub(crate) term_months: i64,
    #[serde(deserialize_with = "deserialize_date")]
    pub(crate) start_date: NaiveDate,
}

pub(crate) async fn schedule_endpoint(
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<Vec<ScheduleEntry>>, AppError> {
    let entries = schedule(request.total, request.term_months, request.start_date)?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReconcileRequest {
    pub(crate) schedule: Vec<ScheduleEntry>,
    #[serde(default)]
    pub(crate) payments: Vec<Payment>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) as_of: Option<NaiveDate>,
}

pub(crate) async fn reconcile_endpoint(
    Json(request): Json<ReconcileRequest>,
) -> Result<Json<DebtSummary>, AppError> {
    let as_of = as_of_moment(today_or(request.as_of));
    let summary = reconcile(&request.schedule, &request.payments, as_of)?;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusClassification {
    pub(crate) raw_status: String,
    pub(crate) category: Category,
    pub(crate) label: &'static str,
    pub(crate) rule: Option<usize>,
}

pub(crate) async fn status_endpoint(Path(raw_status): Path<String>) -> Json<StatusClassification> {
    let category = classify(&raw_status);
    Json(StatusClassification {
        rule: matching_rule(&raw_status),
        category,
        label: category.label(),
        raw_status,
    })
}
