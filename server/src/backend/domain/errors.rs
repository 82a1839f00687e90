//! Error taxonomy for the loan engine.
//!
//! Every mutating operation either succeeds completely or fails with one of
//! these variants and leaves no partial effect behind.

use thiserror::Error;

use super::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum LoanError {
    /// Input rejected before any state was touched
    #[error("{0}")]
    Validation(String),

    /// Operation not legal for the loan's current lifecycle state
    #[error("{0}")]
    InvalidState(String),

    #[error("Loan {loan_id} has already been disbursed")]
    AlreadyDisbursed { loan_id: i64 },

    #[error("M-Pesa transaction {transaction_id} has already been reconciled")]
    AlreadyReconciled { transaction_id: i64 },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The payment gateway refused or never received the request; nothing was recorded
    #[error("Disbursement failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LoanError {
    pub fn validation(message: impl Into<String>) -> Self {
        LoanError::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        LoanError::InvalidState(message.into())
    }

    /// Short machine-readable name used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            LoanError::Validation(_) => "validation_error",
            LoanError::InvalidState(_) => "invalid_state",
            LoanError::AlreadyDisbursed { .. } => "already_disbursed",
            LoanError::AlreadyReconciled { .. } => "already_reconciled",
            LoanError::NotFound { .. } => "not_found",
            LoanError::Gateway(_) => "gateway_error",
            LoanError::Storage(_) => "storage_error",
        }
    }
}
