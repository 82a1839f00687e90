//! # Domain Module
//!
//! Business logic for the loan lifecycle and repayment engine.
//!
//! ## Module Organization
//!
//! - **amortization**: flat-rate installment schedule from a loan's stored terms
//! - **payment_ledger**: append-only repayments and the balances derived from them
//! - **state_machine**: loan status transitions and the two-level approval gate
//! - **loan_service**: submission, approval decisions and loan queries
//! - **disbursement_service**: the one disbursement per loan, over mpesa, bank or manual
//! - **reconciliation_service**: operator-confirmed matching of inbound M-Pesa payments
//! - **portfolio_risk**: PAR buckets from days overdue
//! - **report_service**: PAR and profit and loss reports
//! - **product_service**: loan product templates
//!
//! ## Business Rules
//!
//! - A loan reaches `approved` only after an officer and then a manager approve it
//! - Rejection needs a reason and is terminal
//! - A loan is disbursed at most once
//! - Repayments are only accepted while a loan is `active`; the repayment that
//!   clears the outstanding balance completes the loan
//! - An inbound M-Pesa payment backs at most one repayment
//! - Schedules, balances and risk buckets are derived on read, never stored

pub mod amortization;
pub mod commands;
pub mod disbursement_service;
pub mod errors;
pub mod gateway;
pub mod loan_service;
pub mod locks;
pub mod models;
pub mod money;
pub mod payment_ledger;
pub mod portfolio_risk;
pub mod product_service;
pub mod reconciliation_service;
pub mod report_service;
pub mod state_machine;

pub use disbursement_service::{DisbursementChannel, DisbursementService};
pub use errors::LoanError;
pub use gateway::DisbursementGateway;
pub use loan_service::{LoanDetails, LoanService};
pub use locks::KeyedLocks;
pub use payment_ledger::PaymentLedgerService;
pub use product_service::ProductService;
pub use reconciliation_service::ReconciliationService;
pub use report_service::ReportService;
