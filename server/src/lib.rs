//! Loan lifecycle and repayment engine: the ledger of record for money lent
//! and money returned, served over a REST API to the back-office UI.

pub mod backend;
pub mod config;
