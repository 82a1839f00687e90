//! Wire types shared between the loan back-office UI and the lending server.
//!
//! Everything in here is plain data. Amounts are `Decimal` and serialize as
//! strings so the UI never sees binary floating point money.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a loan as reported to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Pending,
    Approved,
    Active,
    Completed,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentFrequency {
    Daily,
    Weekly,
    Monthly,
}

/// Unit in which a product (and every loan issued from it) expresses duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Days,
    Weeks,
    Months,
}

/// Channel used to move money, in either direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Mpesa,
    Bank,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Approve,
    Reject,
}

// ---------------------------------------------------------------------------
// Loan products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanProduct {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Flat interest rate in percent for the whole loan term
    pub interest_rate: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub min_period: u32,
    pub max_period: u32,
    pub duration_unit: DurationUnit,
    pub registration_fee: Decimal,
    pub processing_fee_fixed: Decimal,
    pub processing_fee_percent: Decimal,
    pub insurance_fee: Decimal,
    pub tracking_fee: Decimal,
    pub valuation_fee: Decimal,
    /// Monthly penalty rate in percent, applied once the grace period is over
    pub penalty_rate: Decimal,
    pub grace_period_days: u32,
}

/// Body for both `POST /loan-products` and `PUT /loan-products/:id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub interest_rate: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub min_period: u32,
    pub max_period: u32,
    pub duration_unit: DurationUnit,
    #[serde(default)]
    pub registration_fee: Decimal,
    #[serde(default)]
    pub processing_fee_fixed: Decimal,
    #[serde(default)]
    pub processing_fee_percent: Decimal,
    #[serde(default)]
    pub insurance_fee: Decimal,
    #[serde(default)]
    pub tracking_fee: Decimal,
    #[serde(default)]
    pub valuation_fee: Decimal,
    #[serde(default)]
    pub penalty_rate: Decimal,
    #[serde(default)]
    pub grace_period_days: u32,
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

/// Borrower's declared business figures at application time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialAnalysisInput {
    pub monthly_sales: Decimal,
    pub cost_of_sales: Decimal,
    pub personal_expenditure: Decimal,
    #[serde(default)]
    pub other_income: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialAnalysis {
    pub monthly_sales: Decimal,
    pub cost_of_sales: Decimal,
    pub personal_expenditure: Decimal,
    pub other_income: Decimal,
    /// Computed once at origination and never recomputed
    pub net_income: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guarantor {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referee {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateLoanRequest {
    pub client_id: i64,
    pub product_id: i64,
    pub amount: Decimal,
    /// Duration expressed in the product's duration unit
    pub duration: u32,
    pub frequency: RepaymentFrequency,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub financial_analysis: Option<FinancialAnalysisInput>,
    #[serde(default)]
    pub guarantors: Vec<Guarantor>,
    #[serde(default)]
    pub referees: Vec<Referee>,
    #[serde(default)]
    pub waive_processing_fee: bool,
}

/// Fees snapshotted from the product when the loan was created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanFees {
    pub processing_fee: Decimal,
    pub insurance_fee: Decimal,
    pub valuation_fee: Decimal,
    pub registration_fee: Decimal,
    pub tracking_fee: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    /// 1 = loan officer, 2 = manager
    pub level: u8,
    pub action: ApprovalAction,
    pub notes: String,
    pub actor: String,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanBalance {
    pub total_due: Decimal,
    pub total_repaid: Decimal,
    pub outstanding_balance: Decimal,
    pub progress_percent: Decimal,
    /// Late penalty accrued so far; reported only, not part of the outstanding balance
    pub accrued_penalty: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: i64,
    pub client_id: i64,
    pub product_id: i64,
    pub amount: Decimal,
    pub interest_rate: Decimal,
    pub duration: u32,
    pub duration_unit: DurationUnit,
    pub frequency: RepaymentFrequency,
    pub start_date: NaiveDate,
    pub status: LoanStatus,
    /// Only present while the loan is pending
    pub current_approval_level: Option<u8>,
    pub rejection_reason: Option<String>,
    pub fees: LoanFees,
    pub penalty_rate: Decimal,
    pub grace_period_days: u32,
    pub financial_analysis: Option<FinancialAnalysis>,
    pub guarantors: Vec<Guarantor>,
    pub referees: Vec<Referee>,
    pub approvals: Vec<Approval>,
    pub created_at: DateTime<Utc>,
    pub balance: LoanBalance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Level the approver is signing at; must match the loan's current level
    pub level: u8,
    pub action: ApprovalAction,
    #[serde(default)]
    pub notes: String,
    /// Identity of the officer or manager making the decision
    pub actor: String,
}

// ---------------------------------------------------------------------------
// Disbursements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisburseMpesaRequest {
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisburseBankRequest {
    pub bank_reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisburseManualRequest {
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disbursement {
    pub id: i64,
    pub loan_id: i64,
    pub method: PaymentMethod,
    /// Gateway conversation id for M-Pesa, operator reference for bank, none for manual
    pub reference: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub amount: Decimal,
    pub disbursed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementListQuery {
    pub loan_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Repayments and schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepayRequest {
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repayment {
    pub id: i64,
    pub loan_id: i64,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentResponse {
    pub repayment: Repayment,
    pub loan_status: LoanStatus,
    pub balance: LoanBalance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub amount_due: Decimal,
    pub principal_amount: Decimal,
    pub interest_amount: Decimal,
    /// Remaining balance after this installment is paid
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub total_amount: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
    /// Regular per-installment payment (the UI labels it monthly whatever the frequency)
    pub monthly_payment: Decimal,
    pub installments: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub loan_id: i64,
    pub installments: Vec<Installment>,
    pub summary: ScheduleSummary,
}

// ---------------------------------------------------------------------------
// M-Pesa reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpesaTransaction {
    pub id: i64,
    /// M-Pesa receipt number, e.g. `QGH7XK2L9P`
    pub transaction_id: String,
    pub phone: String,
    pub bill_reference: String,
    pub amount: Decimal,
    pub received_at: DateTime<Utc>,
    pub matched: bool,
    pub loan_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMpesaTransactionRequest {
    pub transaction_id: String,
    pub phone: String,
    #[serde(default)]
    pub bill_reference: String,
    pub amount: Decimal,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub loan_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub transaction: MpesaTransaction,
    pub repayment: Repayment,
    pub loan_status: LoanStatus,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParBucket {
    #[serde(rename = "current")]
    Current,
    #[serde(rename = "par_30")]
    Par30,
    #[serde(rename = "par_60")]
    Par60,
    #[serde(rename = "par_90")]
    Par90,
    #[serde(rename = "par_90plus")]
    Par90Plus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParBucketSummary {
    pub bucket: ParBucket,
    pub loan_count: u32,
    pub outstanding: Decimal,
    /// Share of the total outstanding portfolio, in percent
    pub ratio: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParLoanRow {
    pub loan_id: i64,
    pub client_id: i64,
    pub days_overdue: i64,
    pub bucket: ParBucket,
    pub outstanding: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParReport {
    pub as_of: NaiveDate,
    pub total_outstanding: Decimal,
    pub buckets: Vec<ParBucketSummary>,
    pub loans: Vec<ParLoanRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitLossReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub fee_income: Decimal,
    pub interest_income: Decimal,
    pub total_income: Decimal,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
