//! # Payment Ledger
//!
//! Applies repayments to active loans and derives balances from the
//! repayment log.
//!
//! ## Business Rules
//!
//! - Only `active` loans accept repayments
//! - Repayments are appended, never edited or deleted
//! - `outstanding = max(0, principal + interest - repaid)`; overpayment floors at zero
//! - The repayment that brings the outstanding balance to zero completes the
//!   loan in the same write
//! - Penalties and fees are reported alongside but never change the balance

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::amortization::schedule_for;
use super::commands::repayments::ApplyRepaymentCommand;
use super::errors::LoanError;
use super::locks::KeyedLocks;
use super::models::{AppendedRepayment, Loan, NewRepayment, Repayment};
use super::money::{round_money, HUNDRED};
use super::state_machine::LoanStatus;
use crate::backend::storage::{Connection, LoanStorage, RepaymentStorage};

/// Balance view derived from the repayment log
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSummary {
    pub total_due: Decimal,
    pub total_repaid: Decimal,
    pub outstanding_balance: Decimal,
    pub progress_percent: Decimal,
}

impl LedgerSummary {
    pub fn compute(total_due: Decimal, repayments: &[Repayment]) -> Self {
        let total_repaid: Decimal = repayments.iter().map(|r| r.amount).sum();
        Self::from_totals(total_due, total_repaid)
    }

    pub fn from_totals(total_due: Decimal, total_repaid: Decimal) -> Self {
        let outstanding_balance = (total_due - total_repaid).max(Decimal::ZERO);
        let progress_percent = if total_due > Decimal::ZERO {
            round_money(total_repaid / total_due * HUNDRED).min(HUNDRED)
        } else {
            HUNDRED
        };
        Self {
            total_due,
            total_repaid,
            outstanding_balance,
            progress_percent,
        }
    }
}

/// Late penalty accrued on unpaid principal once the grace period after
/// maturity has run out, at `penalty_rate` percent per 30 days.
pub fn accrued_penalty(
    principal: Decimal,
    total_repaid: Decimal,
    penalty_rate: Decimal,
    maturity: NaiveDate,
    grace_period_days: u32,
    as_of: NaiveDate,
) -> Decimal {
    let days_late = (as_of - maturity).num_days() - i64::from(grace_period_days);
    if days_late <= 0 {
        return Decimal::ZERO;
    }
    let remaining_principal = (principal - total_repaid).max(Decimal::ZERO);
    round_money(
        remaining_principal * penalty_rate / HUNDRED * Decimal::from(days_late) / Decimal::from(30),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoanBalance {
    pub summary: LedgerSummary,
    pub accrued_penalty: Decimal,
}

/// Result of applying a repayment
#[derive(Debug, Clone, PartialEq)]
pub struct RepaymentOutcome {
    pub repayment: Repayment,
    pub status: LoanStatus,
    pub summary: LedgerSummary,
}

#[derive(Clone)]
pub struct PaymentLedgerService<C: Connection> {
    loan_repository: C::LoanRepository,
    repayment_repository: C::RepaymentRepository,
    locks: KeyedLocks,
}

impl<C: Connection> PaymentLedgerService<C> {
    pub fn new(connection: Arc<C>, locks: KeyedLocks) -> Self {
        Self {
            loan_repository: connection.create_loan_repository(),
            repayment_repository: connection.create_repayment_repository(),
            locks,
        }
    }

    pub async fn apply_repayment(
        &self,
        command: ApplyRepaymentCommand,
    ) -> Result<RepaymentOutcome, LoanError> {
        let amount = round_money(command.amount);
        if amount <= Decimal::ZERO {
            return Err(LoanError::validation("Repayment amount must be positive"));
        }

        let _guard = self.locks.lock_loan(command.loan_id).await;
        let loan = self.load_loan(command.loan_id).await?;
        loan.status.ensure_accepts_repayment()?;

        let repayment = NewRepayment {
            loan_id: loan.id,
            amount,
            payment_date: command.payment_date,
            method: command.method,
            reference: non_blank(command.reference),
            notes: non_blank(command.notes),
            mpesa_transaction_id: None,
            recorded_at: Utc::now(),
        };
        let (repayment, status, summary) = self.append_locked(&loan, repayment).await?;

        info!(
            loan_id = loan.id,
            amount = %amount,
            outstanding = %summary.outstanding_balance,
            status = %status.kind(),
            "Applied repayment"
        );
        Ok(RepaymentOutcome {
            repayment,
            status,
            summary,
        })
    }

    /// Hand `repayment` and the loan's total due to `store`, which appends it
    /// and completes the loan in one transaction once the ledger covers the
    /// total.
    ///
    /// The caller must hold the loan lock. Shared with reconciliation, whose
    /// store also claims the M-Pesa payment in the same transaction.
    pub(crate) async fn settle_with<F, Fut>(
        &self,
        loan: &Loan,
        repayment: NewRepayment,
        store: F,
    ) -> Result<(Repayment, LoanStatus, LedgerSummary), LoanError>
    where
        F: FnOnce(NewRepayment, Decimal) -> Fut,
        Fut: std::future::Future<Output = Result<AppendedRepayment, LoanError>>,
    {
        let completed_status = loan.status.settle()?;
        let total_due = loan.terms.total_due();

        let appended = store(repayment, total_due).await?;
        let status = if appended.completed {
            completed_status
        } else {
            loan.status.clone()
        };
        let summary = LedgerSummary::from_totals(total_due, appended.total_repaid);
        Ok((appended.repayment, status, summary))
    }

    async fn append_locked(
        &self,
        loan: &Loan,
        repayment: NewRepayment,
    ) -> Result<(Repayment, LoanStatus, LedgerSummary), LoanError> {
        let loan_id = loan.id;
        self.settle_with(loan, repayment, |repayment, total_due| async move {
            match self
                .repayment_repository
                .append_repayment(&repayment, total_due)
                .await?
            {
                Some(stored) => Ok(stored),
                None => {
                    warn!(loan_id, "Loan left the active state before the repayment was stored");
                    Err(LoanError::invalid_state(
                        "Repayments are only accepted on active loans",
                    ))
                }
            }
        })
        .await
    }

    pub async fn list_repayments(&self, loan_id: i64) -> Result<Vec<Repayment>, LoanError> {
        self.load_loan(loan_id).await?;
        Ok(self.repayment_repository.list_repayments(loan_id).await?)
    }

    pub async fn summary_for(&self, loan: &Loan) -> Result<LedgerSummary, LoanError> {
        let repayments = self.repayment_repository.list_repayments(loan.id).await?;
        Ok(LedgerSummary::compute(loan.terms.total_due(), &repayments))
    }

    /// Balance plus any late penalty as of `as_of`
    pub async fn balance_for(&self, loan: &Loan, as_of: NaiveDate) -> Result<LoanBalance, LoanError> {
        let summary = self.summary_for(loan).await?;
        let accrued_penalty = if loan.status == LoanStatus::Active {
            let schedule = schedule_for(&loan.terms)?;
            match schedule.maturity_date() {
                Some(maturity) => accrued_penalty(
                    loan.terms.principal,
                    summary.total_repaid,
                    loan.penalty_rate,
                    maturity,
                    loan.grace_period_days,
                    as_of,
                ),
                None => Decimal::ZERO,
            }
        } else {
            Decimal::ZERO
        };
        Ok(LoanBalance {
            summary,
            accrued_penalty,
        })
    }

    pub async fn balance(&self, loan_id: i64) -> Result<LoanBalance, LoanError> {
        let loan = self.load_loan(loan_id).await?;
        self.balance_for(&loan, Utc::now().date_naive()).await
    }

    async fn load_loan(&self, loan_id: i64) -> Result<Loan, LoanError> {
        self.loan_repository
            .get_loan(loan_id)
            .await?
            .ok_or(LoanError::NotFound { entity: "Loan", id: loan_id })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
