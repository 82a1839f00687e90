//! # Reconciliation Matcher
//!
//! Inbound M-Pesa payments land unmatched. An operator picks the loan a
//! payment belongs to and this service books it as a repayment on that loan.
//! Bill references typed on a phone are unreliable, so nothing is matched
//! automatically.
//!
//! Locks are taken transaction first, then loan. The claim on the payment and
//! the repayment it produces are written in one storage transaction, so a
//! payment backs at most one repayment.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::commands::mpesa::RecordIncomingCommand;
use super::errors::LoanError;
use super::locks::KeyedLocks;
use super::models::{MpesaTransaction, NewMpesaTransaction, NewRepayment, PaymentMethod, Repayment};
use super::money::round_money;
use super::payment_ledger::{LedgerSummary, PaymentLedgerService};
use super::state_machine::LoanStatus;
use crate::backend::storage::{Connection, LoanStorage, MpesaStorage, ReconcileWrite};

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub transaction: MpesaTransaction,
    pub repayment: Repayment,
    pub status: LoanStatus,
    pub summary: LedgerSummary,
}

#[derive(Clone)]
pub struct ReconciliationService<C: Connection> {
    loan_repository: C::LoanRepository,
    mpesa_repository: C::MpesaRepository,
    ledger: PaymentLedgerService<C>,
    locks: KeyedLocks,
}

impl<C: Connection> ReconciliationService<C> {
    pub fn new(connection: Arc<C>, ledger: PaymentLedgerService<C>, locks: KeyedLocks) -> Self {
        Self {
            loan_repository: connection.create_loan_repository(),
            mpesa_repository: connection.create_mpesa_repository(),
            ledger,
            locks,
        }
    }

    /// Store an inbound payment as unmatched. Re-delivery of a known receipt
    /// returns the stored row unchanged.
    pub async fn record_incoming(
        &self,
        command: RecordIncomingCommand,
    ) -> Result<MpesaTransaction, LoanError> {
        let transaction_id = command.transaction_id.trim().to_uppercase();
        if transaction_id.is_empty() {
            return Err(LoanError::validation("M-Pesa transaction id cannot be empty"));
        }
        let amount = round_money(command.amount);
        if amount <= Decimal::ZERO {
            return Err(LoanError::validation("M-Pesa amount must be positive"));
        }

        let new_transaction = NewMpesaTransaction {
            transaction_id,
            phone: command.phone.trim().to_string(),
            bill_reference: command.bill_reference.trim().to_string(),
            amount,
            received_at: command.received_at.unwrap_or_else(Utc::now),
        };
        let (stored, created) = self.mpesa_repository.insert_incoming(&new_transaction).await?;
        if created {
            info!(
                mpesa_id = stored.id,
                receipt = %stored.transaction_id,
                amount = %stored.amount,
                "Recorded inbound M-Pesa payment"
            );
        } else {
            debug!(receipt = %stored.transaction_id, "Ignored duplicate M-Pesa delivery");
        }
        Ok(stored)
    }

    pub async fn list_unmatched(&self) -> Result<Vec<MpesaTransaction>, LoanError> {
        Ok(self.mpesa_repository.list_unmatched().await?)
    }

    /// Book the unmatched payment `mpesa_id` as a repayment on `loan_id`
    pub async fn reconcile(&self, mpesa_id: i64, loan_id: i64) -> Result<ReconcileOutcome, LoanError> {
        let _transaction_guard = self.locks.lock_mpesa_transaction(mpesa_id).await;
        let _loan_guard = self.locks.lock_loan(loan_id).await;

        let transaction = self
            .mpesa_repository
            .get_transaction(mpesa_id)
            .await?
            .ok_or(LoanError::NotFound { entity: "M-Pesa transaction", id: mpesa_id })?;
        if transaction.matched {
            warn!(mpesa_id, "M-Pesa payment already reconciled");
            return Err(LoanError::AlreadyReconciled { transaction_id: mpesa_id });
        }

        let loan = self
            .loan_repository
            .get_loan(loan_id)
            .await?
            .ok_or(LoanError::NotFound { entity: "Loan", id: loan_id })?;
        loan.status.ensure_accepts_repayment()?;

        let repayment = NewRepayment {
            loan_id,
            amount: transaction.amount,
            payment_date: transaction.received_at.date_naive(),
            method: PaymentMethod::Mpesa,
            reference: Some(transaction.transaction_id.clone()),
            notes: if transaction.bill_reference.is_empty() {
                None
            } else {
                Some(transaction.bill_reference.clone())
            },
            mpesa_transaction_id: Some(transaction.id),
            recorded_at: Utc::now(),
        };

        let mpesa_repository = &self.mpesa_repository;
        let (repayment, status, summary) = self
            .ledger
            .settle_with(&loan, repayment, |repayment, total_due| async move {
                match mpesa_repository.reconcile(mpesa_id, &repayment, total_due).await? {
                    ReconcileWrite::Applied(stored) => Ok(stored),
                    ReconcileWrite::AlreadyMatched => {
                        Err(LoanError::AlreadyReconciled { transaction_id: mpesa_id })
                    }
                    ReconcileWrite::LoanNotActive => Err(LoanError::invalid_state(
                        "Repayments are only accepted on active loans",
                    )),
                }
            })
            .await?;

        let transaction = MpesaTransaction {
            matched: true,
            loan_id: Some(loan_id),
            ..transaction
        };
        info!(
            mpesa_id,
            loan_id,
            receipt = %transaction.transaction_id,
            amount = %repayment.amount,
            status = %status.kind(),
            "Reconciled M-Pesa payment"
        );
        Ok(ReconcileOutcome {
            transaction,
            repayment,
            status,
            summary,
        })
    }
}
