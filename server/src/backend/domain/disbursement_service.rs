//! # Disbursement Dispatcher
//!
//! Moves an approved loan to `active` by recording its one and only
//! disbursement through one of three channels:
//!
//! - **mpesa**: pushes the principal to the borrower's phone (B2C) and records
//!   the gateway's conversation id once the push is accepted
//! - **bank**: records the operator-supplied bank reference
//! - **manual**: records free-text notes, no reference
//!
//! A gateway failure records nothing and leaves the loan `approved`, so the
//! caller can retry. A second disbursement for the same loan fails with
//! `AlreadyDisbursed`, guarded by the loan lock here and by `UNIQUE(loan_id)`
//! in storage.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::errors::LoanError;
use super::gateway::{B2cRequest, DisbursementGateway};
use super::locks::KeyedLocks;
use super::models::{normalize_msisdn, Disbursement, Loan, NewDisbursement, PaymentMethod};
use crate::backend::storage::{Connection, DisbursementStorage, DisbursementWrite, LoanStorage};

/// Where the money goes and the channel-specific payload
#[derive(Debug, Clone, PartialEq)]
pub enum DisbursementChannel {
    Mpesa { phone: String },
    Bank { reference: String },
    Manual { notes: Option<String> },
}

impl DisbursementChannel {
    pub fn method(&self) -> PaymentMethod {
        match self {
            DisbursementChannel::Mpesa { .. } => PaymentMethod::Mpesa,
            DisbursementChannel::Bank { .. } => PaymentMethod::Bank,
            DisbursementChannel::Manual { .. } => PaymentMethod::Manual,
        }
    }

    /// Check and normalise the payload before any lock or gateway call
    fn validated(self) -> Result<Self, LoanError> {
        match self {
            DisbursementChannel::Mpesa { phone } => Ok(DisbursementChannel::Mpesa {
                phone: normalize_msisdn(&phone)?,
            }),
            DisbursementChannel::Bank { reference } => {
                let reference = reference.trim();
                if reference.is_empty() {
                    return Err(LoanError::validation("Bank reference cannot be empty"));
                }
                Ok(DisbursementChannel::Bank {
                    reference: reference.to_string(),
                })
            }
            DisbursementChannel::Manual { notes } => Ok(DisbursementChannel::Manual {
                notes: notes
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
            }),
        }
    }
}

#[derive(Clone)]
pub struct DisbursementService<C: Connection> {
    loan_repository: C::LoanRepository,
    disbursement_repository: C::DisbursementRepository,
    gateway: Arc<dyn DisbursementGateway>,
    locks: KeyedLocks,
}

impl<C: Connection> DisbursementService<C> {
    pub fn new(connection: Arc<C>, gateway: Arc<dyn DisbursementGateway>, locks: KeyedLocks) -> Self {
        Self {
            loan_repository: connection.create_loan_repository(),
            disbursement_repository: connection.create_disbursement_repository(),
            gateway,
            locks,
        }
    }

    pub async fn disburse(
        &self,
        loan_id: i64,
        channel: DisbursementChannel,
    ) -> Result<Disbursement, LoanError> {
        let channel = channel.validated()?;
        let method = channel.method();

        let _guard = self.locks.lock_loan(loan_id).await;
        let loan = self.load_loan(loan_id).await?;

        if self
            .disbursement_repository
            .get_disbursement_for_loan(loan_id)
            .await?
            .is_some()
        {
            warn!(loan_id, "Duplicate disbursement request refused");
            return Err(LoanError::AlreadyDisbursed { loan_id });
        }
        loan.status.activate(loan_id)?;

        let (reference, phone, notes) = match channel {
            DisbursementChannel::Mpesa { phone } => {
                let reference = self.push_to_phone(&loan, &phone).await?;
                (Some(reference), Some(phone), None)
            }
            DisbursementChannel::Bank { reference } => (Some(reference), None, None),
            DisbursementChannel::Manual { notes } => (None, None, notes),
        };

        let new_disbursement = NewDisbursement {
            loan_id,
            method,
            reference,
            phone,
            notes,
            amount: loan.terms.principal,
            disbursed_at: Utc::now(),
        };

        match self
            .disbursement_repository
            .record_disbursement(&new_disbursement)
            .await?
        {
            DisbursementWrite::Recorded(disbursement) => {
                info!(
                    loan_id,
                    disbursement_id = disbursement.id,
                    method = %method,
                    amount = %disbursement.amount,
                    "Disbursed loan"
                );
                Ok(disbursement)
            }
            DisbursementWrite::AlreadyDisbursed => {
                if method == PaymentMethod::Mpesa {
                    error!(
                        loan_id,
                        reference = ?new_disbursement.reference,
                        "M-Pesa payout accepted but the loan was disbursed concurrently"
                    );
                }
                Err(LoanError::AlreadyDisbursed { loan_id })
            }
            DisbursementWrite::LoanNotApproved => Err(LoanError::invalid_state(
                "Loan must be approved before disbursement",
            )),
        }
    }

    async fn push_to_phone(&self, loan: &Loan, phone: &str) -> Result<String, LoanError> {
        let request = B2cRequest::for_loan(loan.id, phone.to_string(), loan.terms.principal);
        match self.gateway.send_b2c(&request).await {
            Ok(acceptance) => {
                info!(
                    loan_id = loan.id,
                    conversation_id = %acceptance.conversation_id,
                    "M-Pesa payout accepted"
                );
                Ok(acceptance.conversation_id)
            }
            Err(err) => {
                error!(loan_id = loan.id, error = %err, "M-Pesa payout failed");
                Err(LoanError::Gateway(err))
            }
        }
    }

    pub async fn list_disbursements(
        &self,
        loan_id: Option<i64>,
    ) -> Result<Vec<Disbursement>, LoanError> {
        Ok(self.disbursement_repository.list_disbursements(loan_id).await?)
    }

    pub async fn get_disbursement(&self, disbursement_id: i64) -> Result<Disbursement, LoanError> {
        self.disbursement_repository
            .get_disbursement(disbursement_id)
            .await?
            .ok_or(LoanError::NotFound { entity: "Disbursement", id: disbursement_id })
    }

    async fn load_loan(&self, loan_id: i64) -> Result<Loan, LoanError> {
        self.loan_repository
            .get_loan(loan_id)
            .await?
            .ok_or(LoanError::NotFound { entity: "Loan", id: loan_id })
    }
}
