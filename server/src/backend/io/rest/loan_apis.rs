//! # REST API for Loans
//!
//! Submission, the two-level approval, repayments and the derived views
//! (schedule and balance) of a single loan.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use shared::{ApprovalRequest, CreateLoanRequest, LoanStatus, RepayRequest};
use tracing::info;

use crate::backend::domain::commands::loans::LoanFilter;
use crate::backend::domain::commands::repayments::ApplyRepaymentCommand;
use crate::backend::io::rest::mappers::ledger_mapper::LedgerMapper;
use crate::backend::io::rest::mappers::loan_mapper::LoanMapper;
use crate::backend::io::rest::ApiError;
use crate::backend::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LoanListQuery {
    pub status: Option<LoanStatus>,
    pub client_id: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_loans).post(submit_loan))
        .route("/:id", get(get_loan))
        .route("/:id/approve", post(decide_loan))
        .route("/:id/repay", post(repay_loan))
        .route("/:id/repayments", get(list_repayments))
        .route("/:id/schedule", get(get_schedule))
        .route("/:id/balance", get(get_balance))
}

pub async fn submit_loan(
    State(state): State<AppState>,
    Json(request): Json<CreateLoanRequest>,
) -> impl IntoResponse {
    info!(
        "POST /api/loans - client: {}, product: {}, amount: {}",
        request.client_id, request.product_id, request.amount
    );

    match state.loan_service.submit(LoanMapper::to_submit_command(request)).await {
        Ok(details) => (StatusCode::CREATED, Json(LoanMapper::to_dto(details))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn list_loans(
    State(state): State<AppState>,
    Query(query): Query<LoanListQuery>,
) -> impl IntoResponse {
    info!("GET /api/loans - query: {:?}", query);

    let filter = LoanFilter {
        status: query.status.map(LoanMapper::status_to_kind),
        client_id: query.client_id,
    };
    match state.loan_service.list_loans(filter).await {
        Ok(loans) => (StatusCode::OK, Json(LoanMapper::to_dto_list(loans))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn get_loan(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    info!("GET /api/loans/{}", id);

    match state.loan_service.get_loan(id).await {
        Ok(details) => (StatusCode::OK, Json(LoanMapper::to_dto(details))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn decide_loan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ApprovalRequest>,
) -> impl IntoResponse {
    info!(
        "POST /api/loans/{}/approve - level: {}, action: {:?}, actor: {}",
        id, request.level, request.action, request.actor
    );

    match state.loan_service.decide(LoanMapper::to_decide_command(id, request)).await {
        Ok(details) => (StatusCode::OK, Json(LoanMapper::to_dto(details))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn repay_loan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<RepayRequest>,
) -> impl IntoResponse {
    info!("POST /api/loans/{}/repay - amount: {}, method: {:?}", id, request.amount, request.method);

    let command = ApplyRepaymentCommand {
        loan_id: id,
        amount: request.amount,
        payment_date: request.payment_date,
        method: LedgerMapper::method_to_domain(request.method),
        reference: request.reference,
        notes: request.notes,
    };
    let outcome = match state.ledger_service.apply_repayment(command).await {
        Ok(outcome) => outcome,
        Err(e) => return ApiError::from(e).into_response(),
    };
    match state.ledger_service.balance(id).await {
        Ok(balance) => (
            StatusCode::CREATED,
            Json(LedgerMapper::to_repayment_response(outcome, balance)),
        )
            .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn list_repayments(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    info!("GET /api/loans/{}/repayments", id);

    match state.ledger_service.list_repayments(id).await {
        Ok(repayments) => {
            let repayments: Vec<_> = repayments.into_iter().map(LedgerMapper::repayment_to_dto).collect();
            (StatusCode::OK, Json(repayments)).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn get_schedule(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    info!("GET /api/loans/{}/schedule", id);

    match state.loan_service.schedule(id).await {
        Ok(schedule) => {
            (StatusCode::OK, Json(LedgerMapper::to_schedule_response(id, schedule))).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn get_balance(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    info!("GET /api/loans/{}/balance", id);

    match state.ledger_service.balance(id).await {
        Ok(balance) => (StatusCode::OK, Json(LedgerMapper::balance_to_dto(balance))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
