//! # REST API for Disbursements
//!
//! One endpoint per channel, plus the disbursement history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use shared::{DisburseBankRequest, DisburseManualRequest, DisburseMpesaRequest, DisbursementListQuery};
use tracing::info;

use crate::backend::domain::DisbursementChannel;
use crate::backend::io::rest::mappers::disbursement_mapper::DisbursementMapper;
use crate::backend::io::rest::ApiError;
use crate::backend::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/loans/:id/disburse/mpesa", post(disburse_mpesa))
        .route("/loans/:id/disburse/bank", post(disburse_bank))
        .route("/loans/:id/disburse/manual", post(disburse_manual))
        .route("/history", get(list_disbursements))
        .route("/:id", get(get_disbursement))
}

async fn disburse(state: AppState, loan_id: i64, channel: DisbursementChannel) -> axum::response::Response {
    match state.disbursement_service.disburse(loan_id, channel).await {
        Ok(disbursement) => {
            (StatusCode::CREATED, Json(DisbursementMapper::to_dto(disbursement))).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn disburse_mpesa(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<DisburseMpesaRequest>,
) -> impl IntoResponse {
    info!("POST /api/disbursements/loans/{}/disburse/mpesa", id);
    disburse(state, id, DisbursementChannel::Mpesa { phone: request.phone }).await
}

pub async fn disburse_bank(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<DisburseBankRequest>,
) -> impl IntoResponse {
    info!("POST /api/disbursements/loans/{}/disburse/bank - reference: {}", id, request.bank_reference);
    disburse(state, id, DisbursementChannel::Bank { reference: request.bank_reference }).await
}

pub async fn disburse_manual(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<DisburseManualRequest>,
) -> impl IntoResponse {
    info!("POST /api/disbursements/loans/{}/disburse/manual", id);
    disburse(state, id, DisbursementChannel::Manual { notes: Some(request.notes) }).await
}

pub async fn list_disbursements(
    State(state): State<AppState>,
    Query(query): Query<DisbursementListQuery>,
) -> impl IntoResponse {
    info!("GET /api/disbursements/history - loan: {:?}", query.loan_id);

    match state.disbursement_service.list_disbursements(query.loan_id).await {
        Ok(disbursements) => {
            (StatusCode::OK, Json(DisbursementMapper::to_dto_list(disbursements))).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn get_disbursement(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    info!("GET /api/disbursements/{}", id);

    match state.disbursement_service.get_disbursement(id).await {
        Ok(disbursement) => (StatusCode::OK, Json(DisbursementMapper::to_dto(disbursement))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
