//! # Storage Traits
//!
//! Storage abstractions the domain services are written against.
//!
//! Writes that must be atomic with a status check (decisions, repayments,
//! disbursements, reconciliation) take the expected state as part of the call
//! and report a typed outcome instead of letting the caller read then write.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::backend::domain::commands::loans::LoanFilter;
use crate::backend::domain::models::{
    AppendedRepayment, Approval, Disbursement, Loan, LoanProduct, MpesaTransaction,
    NewDisbursement, NewLoan, NewMpesaTransaction, NewRepayment, ProductTerms, Repayment,
};
use crate::backend::domain::state_machine::LoanStatus;

#[async_trait]
pub trait ProductStorage: Send + Sync {
    async fn insert_product(&self, terms: &ProductTerms) -> Result<LoanProduct>;

    async fn get_product(&self, product_id: i64) -> Result<Option<LoanProduct>>;

    /// All products ordered by name
    async fn list_products(&self) -> Result<Vec<LoanProduct>>;

    /// Replace a product's terms. Returns false if the product does not exist.
    async fn update_product(&self, product: &LoanProduct) -> Result<bool>;
}

#[async_trait]
pub trait LoanStorage: Send + Sync {
    /// Store a new loan as pending at level 1
    async fn insert_loan(&self, loan: &NewLoan) -> Result<Loan>;

    /// Loan with its approval trail
    async fn get_loan(&self, loan_id: i64) -> Result<Option<Loan>>;

    /// Newest first
    async fn list_loans(&self, filter: &LoanFilter) -> Result<Vec<Loan>>;

    /// Move the loan from `expected` to `next` and append the approval, in one
    /// transaction. Returns false, writing nothing, if the stored status is no
    /// longer `expected`.
    async fn record_decision(
        &self,
        loan_id: i64,
        expected: &LoanStatus,
        next: &LoanStatus,
        approval: &Approval,
    ) -> Result<bool>;
}

#[async_trait]
pub trait RepaymentStorage: Send + Sync {
    /// Append a repayment to an active loan. The stored repayments are summed
    /// in the same transaction, and the loan is completed there once they
    /// reach `total_due`. Returns `None`, writing nothing, if the loan is not
    /// active.
    async fn append_repayment(
        &self,
        repayment: &NewRepayment,
        total_due: Decimal,
    ) -> Result<Option<AppendedRepayment>>;

    /// In the order they were recorded
    async fn list_repayments(&self, loan_id: i64) -> Result<Vec<Repayment>>;

    /// Repayments across all loans with a payment date in `[start, end]`
    async fn list_repayments_between(&self, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Repayment>>;
}

/// Outcome of trying to record a loan's disbursement
#[derive(Debug, Clone, PartialEq)]
pub enum DisbursementWrite {
    Recorded(Disbursement),
    AlreadyDisbursed,
    LoanNotApproved,
}

#[async_trait]
pub trait DisbursementStorage: Send + Sync {
    /// Activate an approved loan and store its only disbursement, atomically
    async fn record_disbursement(&self, disbursement: &NewDisbursement) -> Result<DisbursementWrite>;

    async fn get_disbursement(&self, disbursement_id: i64) -> Result<Option<Disbursement>>;

    async fn get_disbursement_for_loan(&self, loan_id: i64) -> Result<Option<Disbursement>>;

    /// Newest first, optionally for one loan
    async fn list_disbursements(&self, loan_id: Option<i64>) -> Result<Vec<Disbursement>>;
}

/// Outcome of matching an inbound M-Pesa payment to a loan
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileWrite {
    Applied(AppendedRepayment),
    AlreadyMatched,
    LoanNotActive,
}

#[async_trait]
pub trait MpesaStorage: Send + Sync {
    /// Store an unmatched payment. A known receipt number returns the existing
    /// row with `false`.
    async fn insert_incoming(
        &self,
        transaction: &NewMpesaTransaction,
    ) -> Result<(MpesaTransaction, bool)>;

    async fn get_transaction(&self, id: i64) -> Result<Option<MpesaTransaction>>;

    /// Oldest first
    async fn list_unmatched(&self) -> Result<Vec<MpesaTransaction>>;

    /// Claim the payment for `repayment.loan_id` and append the repayment, in
    /// one transaction, completing the loan as `append_repayment` does
    async fn reconcile(
        &self,
        mpesa_id: i64,
        repayment: &NewRepayment,
        total_due: Decimal,
    ) -> Result<ReconcileWrite>;
}

/// Factory for the repositories of one storage backend
pub trait Connection: Send + Sync + Clone + 'static {
    type ProductRepository: ProductStorage + Clone;
    type LoanRepository: LoanStorage + Clone;
    type RepaymentRepository: RepaymentStorage + Clone;
    type DisbursementRepository: DisbursementStorage + Clone;
    type MpesaRepository: MpesaStorage + Clone;

    fn create_product_repository(&self) -> Self::ProductRepository;
    fn create_loan_repository(&self) -> Self::LoanRepository;
    fn create_repayment_repository(&self) -> Self::RepaymentRepository;
    fn create_disbursement_repository(&self) -> Self::DisbursementRepository;
    fn create_mpesa_repository(&self) -> Self::MpesaRepository;
}
