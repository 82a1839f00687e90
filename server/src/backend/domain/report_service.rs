//! # Report Service
//!
//! Read-only portfolio reports. Nothing here writes: PAR buckets and income
//! figures are recomputed from loans, schedules and the repayment log on
//! every call.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;

use super::amortization::schedule_for;
use super::commands::loans::LoanFilter;
use super::errors::LoanError;
use super::models::Loan;
use super::money::round_money;
use super::payment_ledger::PaymentLedgerService;
use super::portfolio_risk::{summarize_portfolio, LoanRisk, PortfolioRisk};
use super::state_machine::StatusKind;
use crate::backend::storage::{Connection, DisbursementStorage, LoanStorage, RepaymentStorage};

/// Default profit and loss window when no dates are given
pub const DEFAULT_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfitLoss {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub fee_income: Decimal,
    pub interest_income: Decimal,
    pub total_income: Decimal,
}

#[derive(Clone)]
pub struct ReportService<C: Connection> {
    loan_repository: C::LoanRepository,
    repayment_repository: C::RepaymentRepository,
    disbursement_repository: C::DisbursementRepository,
    ledger: PaymentLedgerService<C>,
}

impl<C: Connection> ReportService<C> {
    pub fn new(connection: Arc<C>, ledger: PaymentLedgerService<C>) -> Self {
        Self {
            loan_repository: connection.create_loan_repository(),
            repayment_repository: connection.create_repayment_repository(),
            disbursement_repository: connection.create_disbursement_repository(),
            ledger,
        }
    }

    /// Classify every active loan by days overdue as of `as_of` (today by default)
    pub async fn par_report(&self, as_of: Option<NaiveDate>) -> Result<PortfolioRisk, LoanError> {
        let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
        let filter = LoanFilter {
            status: Some(StatusKind::Active),
            client_id: None,
        };
        let loans = self.loan_repository.list_loans(&filter).await?;

        let mut rows = Vec::with_capacity(loans.len());
        for loan in &loans {
            let schedule = schedule_for(&loan.terms)?;
            let summary = self.ledger.summary_for(loan).await?;
            rows.push(LoanRisk::classify(
                loan.id,
                loan.client_id,
                &schedule,
                summary.total_repaid,
                summary.outstanding_balance,
                as_of,
            ));
        }

        let report = summarize_portfolio(rows, as_of);
        info!(
            %as_of,
            loans = report.loans.len(),
            total_outstanding = %report.total_outstanding,
            "Built PAR report"
        );
        Ok(report)
    }

    /// Fee and interest income for `[start, end]`, the last 30 days by default
    pub async fn profit_loss(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<ProfitLoss, LoanError> {
        let end_date = end.unwrap_or_else(|| Utc::now().date_naive());
        let start_date = start.unwrap_or(end_date - Duration::days(DEFAULT_PERIOD_DAYS));
        if start_date > end_date {
            return Err(LoanError::Validation(format!(
                "start_date {} is after end_date {}",
                start_date, end_date
            )));
        }

        let mut loans: HashMap<i64, Loan> = HashMap::new();

        let mut fee_income = Decimal::ZERO;
        for disbursement in self.disbursement_repository.list_disbursements(None).await? {
            let disbursed_on = disbursement.disbursed_at.date_naive();
            if disbursed_on < start_date || disbursed_on > end_date {
                continue;
            }
            let loan = self.cached_loan(&mut loans, disbursement.loan_id).await?;
            fee_income += loan.fees.total();
        }

        let mut interest_income = Decimal::ZERO;
        for repayment in self
            .repayment_repository
            .list_repayments_between(start_date, end_date)
            .await?
        {
            let loan = self.cached_loan(&mut loans, repayment.loan_id).await?;
            let total_due = loan.terms.total_due();
            if total_due > Decimal::ZERO {
                interest_income += repayment.amount * loan.terms.total_interest() / total_due;
            }
        }

        let fee_income = round_money(fee_income);
        let interest_income = round_money(interest_income);
        Ok(ProfitLoss {
            start_date,
            end_date,
            fee_income,
            interest_income,
            total_income: fee_income + interest_income,
        })
    }

    async fn cached_loan<'a>(
        &self,
        cache: &'a mut HashMap<i64, Loan>,
        loan_id: i64,
    ) -> Result<&'a Loan, LoanError> {
        if !cache.contains_key(&loan_id) {
            let loan = self
                .loan_repository
                .get_loan(loan_id)
                .await?
                .ok_or(LoanError::NotFound { entity: "Loan", id: loan_id })?;
            cache.insert(loan_id, loan);
        }
        cache
            .get(&loan_id)
            .ok_or(LoanError::NotFound { entity: "Loan", id: loan_id })
    }
}
