//! # REST API for M-Pesa Reconciliation
//!
//! Inbound payments are posted here by the gateway adapter, listed for an
//! operator while unmatched, and booked against the loan the operator picks.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use shared::{IncomingMpesaTransactionRequest, ReconcileRequest};
use tracing::info;

use crate::backend::io::rest::mappers::mpesa_mapper::MpesaMapper;
use crate::backend::io::rest::ApiError;
use crate::backend::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/unmatched", get(list_unmatched))
        .route("/transactions", post(record_incoming))
        .route("/:tx_id/reconcile", post(reconcile))
}

pub async fn list_unmatched(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/mpesa/unmatched");

    match state.reconciliation_service.list_unmatched().await {
        Ok(transactions) => {
            let transactions: Vec<_> = transactions.into_iter().map(MpesaMapper::to_dto).collect();
            (StatusCode::OK, Json(transactions)).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn record_incoming(
    State(state): State<AppState>,
    Json(request): Json<IncomingMpesaTransactionRequest>,
) -> impl IntoResponse {
    info!("POST /api/mpesa/transactions - receipt: {}", request.transaction_id);

    match state
        .reconciliation_service
        .record_incoming(MpesaMapper::to_command(request))
        .await
    {
        Ok(transaction) => (StatusCode::OK, Json(MpesaMapper::to_dto(transaction))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn reconcile(
    State(state): State<AppState>,
    Path(tx_id): Path<i64>,
    Json(request): Json<ReconcileRequest>,
) -> impl IntoResponse {
    info!("POST /api/mpesa/{}/reconcile - loan: {}", tx_id, request.loan_id);

    match state.reconciliation_service.reconcile(tx_id, request.loan_id).await {
        Ok(outcome) => (StatusCode::OK, Json(MpesaMapper::to_reconcile_response(outcome))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::loan_service::test_support::{application, decision, seed_product};
    use crate::backend::domain::state_machine::ApprovalDecision;
    use crate::backend::domain::DisbursementChannel;
    use crate::backend::io::rest::test_support::{send, test_state};
    use axum::http::Method;
    use rust_decimal::Decimal;
    use serde_json::json;
    use shared::{ErrorResponse, LoanStatus, MpesaTransaction, PaymentMethod, ReconcileResponse};

    async fn active_loan_id(state: &AppState) -> i64 {
        let product_id = seed_product(&state.connection).await;
        let loan = state
            .loan_service
            .submit(application(product_id, 10_000, 5))
            .await
            .expect("Failed to submit loan")
            .loan;
        for (level, actor) in [(1, "officer"), (2, "manager")] {
            state
                .loan_service
                .decide(decision(loan.id, level, ApprovalDecision::Approve, "", actor))
                .await
                .expect("Approval failed");
        }
        state
            .disbursement_service
            .disburse(loan.id, DisbursementChannel::Manual { notes: None })
            .await
            .expect("Failed to disburse");
        loan.id
    }

    fn incoming(receipt: &str, amount: &str) -> serde_json::Value {
        json!({
            "transaction_id": receipt,
            "phone": "254712345678",
            "bill_reference": "LOAN1",
            "amount": amount,
            "received_at": "2024-02-20T08:30:00Z"
        })
    }

    #[tokio::test]
    async fn test_ingest_list_and_reconcile() {
        let state = test_state().await;
        let app = router().with_state(state.clone());
        let loan_id = active_loan_id(&state).await;

        let (status, tx): (_, MpesaTransaction) =
            send(&app, Method::POST, "/transactions", Some(incoming("QGH7XK2P9L", "2200"))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!tx.matched);

        let (_, again): (_, MpesaTransaction) =
            send(&app, Method::POST, "/transactions", Some(incoming("QGH7XK2P9L", "2200"))).await;
        assert_eq!(again.id, tx.id);

        let (_, unmatched): (_, Vec<MpesaTransaction>) = send(&app, Method::GET, "/unmatched", None).await;
        assert_eq!(unmatched.len(), 1);

        let uri = format!("/{}/reconcile", tx.id);
        let (status, outcome): (_, ReconcileResponse) =
            send(&app, Method::POST, &uri, Some(json!({"loan_id": loan_id}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(outcome.transaction.matched);
        assert_eq!(outcome.transaction.loan_id, Some(loan_id));
        assert_eq!(outcome.repayment.method, PaymentMethod::Mpesa);
        assert_eq!(outcome.repayment.amount, Decimal::from(2_200));
        assert_eq!(outcome.loan_status, LoanStatus::Active);

        let (status, body): (_, ErrorResponse) =
            send(&app, Method::POST, &uri, Some(json!({"loan_id": loan_id}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "already_reconciled");

        let (_, unmatched): (_, Vec<MpesaTransaction>) = send(&app, Method::GET, "/unmatched", None).await;
        assert!(unmatched.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_unknown_targets() {
        let state = test_state().await;
        let app = router().with_state(state);

        let (status, tx): (_, MpesaTransaction) =
            send(&app, Method::POST, "/transactions", Some(incoming("QGH7XK2P9M", "500"))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _): (_, ErrorResponse) =
            send(&app, Method::POST, &format!("/{}/reconcile", tx.id), Some(json!({"loan_id": 77}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body): (_, ErrorResponse) =
            send(&app, Method::POST, "/transactions", Some(incoming("QGH7XK2P9N", "0"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "validation_error");
    }
}
