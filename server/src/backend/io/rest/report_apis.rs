//! # REST API for Reports
//!
//! Portfolio at risk and income for a period. Both are computed on request.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::backend::io::rest::mappers::report_mapper::ReportMapper;
use crate::backend::io::rest::ApiError;
use crate::backend::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ParQuery {
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/par", get(par_report))
        .route("/profit-loss", get(profit_loss))
}

pub async fn par_report(
    State(state): State<AppState>,
    Query(query): Query<ParQuery>,
) -> impl IntoResponse {
    info!("GET /api/reports/par - as_of: {:?}", query.as_of);

    match state.report_service.par_report(query.as_of).await {
        Ok(report) => (StatusCode::OK, Json(ReportMapper::to_par_report(report))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn profit_loss(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> impl IntoResponse {
    info!("GET /api/reports/profit-loss - {:?}", query);

    match state.report_service.profit_loss(query.start_date, query.end_date).await {
        Ok(report) => (StatusCode::OK, Json(ReportMapper::to_profit_loss(report))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
