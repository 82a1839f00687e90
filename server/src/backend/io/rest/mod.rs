//! # REST API Interface Layer
//!
//! HTTP endpoints for the loan engine, nested under `/api`.
//!
//! Handlers translate DTOs from `shared` into domain commands, call one
//! service, and map the result back. Domain errors become status codes in
//! one place, [`ApiError`]:
//!
//! | Error | Status |
//! |---|---|
//! | validation | 400 |
//! | not found | 404 |
//! | invalid state, already disbursed, already reconciled | 409 |
//! | gateway | 502 |
//! | storage | 500 |

pub mod disbursement_apis;
pub mod health_apis;
pub mod loan_apis;
pub mod mappers;
pub mod mpesa_apis;
pub mod product_apis;
pub mod report_apis;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use shared::ErrorResponse;
use tracing::{error, warn};

use crate::backend::domain::LoanError;

/// A domain error on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub LoanError);

impl From<LoanError> for ApiError {
    fn from(err: LoanError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LoanError::Validation(_) => StatusCode::BAD_REQUEST,
            LoanError::NotFound { .. } => StatusCode::NOT_FOUND,
            LoanError::InvalidState(_)
            | LoanError::AlreadyDisbursed { .. }
            | LoanError::AlreadyReconciled { .. } => StatusCode::CONFLICT,
            LoanError::Gateway(_) => StatusCode::BAD_GATEWAY,
            LoanError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            LoanError::Storage(e) => {
                error!("Storage failure: {:#}", e);
                "Internal storage error".to_string()
            }
            LoanError::Gateway(e) => {
                error!("Gateway failure: {}", e);
                self.0.to_string()
            }
            other => {
                warn!(kind = other.kind(), "Request rejected: {}", other);
                other.to_string()
            }
        };
        let body = ErrorResponse {
            error: self.0.kind().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
