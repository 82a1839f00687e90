//! Domain model for the single disbursement a loan receives.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::repayment::PaymentMethod;

#[derive(Debug, Clone, PartialEq)]
pub struct Disbursement {
    pub id: i64,
    pub loan_id: i64,
    pub method: PaymentMethod,
    /// Gateway conversation id for M-Pesa, operator-supplied for bank, absent for manual
    pub reference: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub amount: Decimal,
    pub disbursed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDisbursement {
    pub loan_id: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub amount: Decimal,
    pub disbursed_at: DateTime<Utc>,
}
