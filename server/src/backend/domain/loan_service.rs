//! Loan origination, approval and queries.
//!
//! ## Key Responsibilities
//!
//! - **Submission**: validating an application against its product and
//!   snapshotting the product's rate, fees and penalty terms onto the loan
//! - **Approval**: the two-level sign-off driven by `LoanStatus::decide`,
//!   persisted as a compare-and-set so concurrent approvers cannot both win
//! - **Queries**: loan views with their derived balance, and the schedule
//!   regenerated from the stored terms

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::amortization::{schedule_for, Schedule};
use super::commands::loans::{DecideLoanCommand, LoanFilter, SubmitLoanCommand};
use super::errors::LoanError;
use super::locks::KeyedLocks;
use super::models::{Loan, LoanFees, LoanTerms, NewLoan};
use super::money::round_money;
use super::payment_ledger::{LoanBalance, PaymentLedgerService};
use super::state_machine::ApprovalLevel;
use crate::backend::storage::{Connection, LoanStorage, ProductStorage};

/// A loan together with its derived balance
#[derive(Debug, Clone, PartialEq)]
pub struct LoanDetails {
    pub loan: Loan,
    pub balance: LoanBalance,
}

#[derive(Clone)]
pub struct LoanService<C: Connection> {
    product_repository: C::ProductRepository,
    loan_repository: C::LoanRepository,
    ledger: PaymentLedgerService<C>,
    locks: KeyedLocks,
}

impl<C: Connection> LoanService<C> {
    pub fn new(connection: Arc<C>, ledger: PaymentLedgerService<C>, locks: KeyedLocks) -> Self {
        Self {
            product_repository: connection.create_product_repository(),
            loan_repository: connection.create_loan_repository(),
            ledger,
            locks,
        }
    }

    /// Create a loan in `pending` at approval level 1
    pub async fn submit(&self, command: SubmitLoanCommand) -> Result<LoanDetails, LoanError> {
        let product = self
            .product_repository
            .get_product(command.product_id)
            .await?
            .ok_or_else(|| {
                LoanError::Validation(format!("Unknown loan product {}", command.product_id))
            })?;

        let amount = round_money(command.amount);
        product.check_bounds(amount, command.duration)?;

        let terms = LoanTerms {
            principal: amount,
            interest_rate: product.terms.interest_rate,
            duration: command.duration,
            duration_unit: product.terms.duration_unit,
            frequency: command.frequency,
            start_date: command.start_date,
        };
        // refuse terms that cannot produce a schedule before anything is stored
        schedule_for(&terms)?;

        let new_loan = NewLoan {
            client_id: command.client_id,
            product_id: product.id,
            fees: LoanFees::snapshot(&product.terms.fees, amount, command.waive_processing_fee),
            terms,
            penalty_rate: product.terms.penalty_rate,
            grace_period_days: product.terms.grace_period_days,
            financial_analysis: command.financial_analysis,
            guarantors: command.guarantors,
            referees: command.referees,
            created_at: Utc::now(),
        };

        let loan = self.loan_repository.insert_loan(&new_loan).await?;
        info!(
            loan_id = loan.id,
            client_id = loan.client_id,
            product_id = loan.product_id,
            amount = %loan.terms.principal,
            "Submitted loan application"
        );
        self.with_balance(loan).await
    }

    /// Apply an approve/reject decision at the given approval level
    pub async fn decide(&self, command: DecideLoanCommand) -> Result<LoanDetails, LoanError> {
        let level = ApprovalLevel::from_number(command.level).ok_or_else(|| {
            LoanError::Validation(format!("Unknown approval level {}", command.level))
        })?;

        let _guard = self.locks.lock_loan(command.loan_id).await;
        let loan = self.load_loan(command.loan_id).await?;

        let (next, approval) = match loan.decide(
            level,
            command.decision,
            &command.notes,
            &command.actor,
            Utc::now(),
        ) {
            Ok(decision) => decision,
            Err(err) => {
                warn!(loan_id = loan.id, level = level.number(), error = %err, "Rejected approval decision");
                return Err(err);
            }
        };

        let applied = self
            .loan_repository
            .record_decision(loan.id, &loan.status, &next, &approval)
            .await?;
        if !applied {
            warn!(loan_id = loan.id, "Loan status changed while the decision was being recorded");
            return Err(LoanError::invalid_state(
                "Loan status changed before the decision could be recorded",
            ));
        }

        info!(
            loan_id = loan.id,
            level = level.number(),
            decision = approval.decision.as_str(),
            actor = %approval.actor,
            status = %next.kind(),
            "Recorded approval decision"
        );
        let loan = self.load_loan(loan.id).await?;
        self.with_balance(loan).await
    }

    pub async fn get_loan(&self, loan_id: i64) -> Result<LoanDetails, LoanError> {
        let loan = self.load_loan(loan_id).await?;
        self.with_balance(loan).await
    }

    pub async fn list_loans(&self, filter: LoanFilter) -> Result<Vec<LoanDetails>, LoanError> {
        let loans = self.loan_repository.list_loans(&filter).await?;
        let mut details = Vec::with_capacity(loans.len());
        for loan in loans {
            details.push(self.with_balance(loan).await?);
        }
        Ok(details)
    }

    /// Regenerate the repayment schedule from the loan's stored terms
    pub async fn schedule(&self, loan_id: i64) -> Result<Schedule, LoanError> {
        let loan = self.load_loan(loan_id).await?;
        schedule_for(&loan.terms)
    }

    async fn with_balance(&self, loan: Loan) -> Result<LoanDetails, LoanError> {
        let balance = self.ledger.balance_for(&loan, Utc::now().date_naive()).await?;
        Ok(LoanDetails { loan, balance })
    }

    async fn load_loan(&self, loan_id: i64) -> Result<Loan, LoanError> {
        self.loan_repository
            .get_loan(loan_id)
            .await?
            .ok_or(LoanError::NotFound { entity: "Loan", id: loan_id })
    }
}
