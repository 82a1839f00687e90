//! Domain model for repayments. Rows are append-only once stored.
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Channel money moved through, shared by repayments and disbursements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Mpesa,
    Bank,
    Manual,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Mpesa => "mpesa",
            PaymentMethod::Bank => "bank",
            PaymentMethod::Manual => "manual",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mpesa" => Ok(PaymentMethod::Mpesa),
            "bank" => Ok(PaymentMethod::Bank),
            "manual" => Ok(PaymentMethod::Manual),
            other => Err(anyhow::anyhow!("Unknown payment method: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Repayment {
    pub id: i64,
    pub loan_id: i64,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    /// M-Pesa receipt or bank reference
    pub reference: Option<String>,
    pub notes: Option<String>,
    /// Set when the repayment came from reconciling an inbound M-Pesa payment
    pub mpesa_transaction_id: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRepayment {
    pub loan_id: i64,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub mpesa_transaction_id: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}

/// A stored repayment and where the loan's ledger stood right after it
#[derive(Debug, Clone, PartialEq)]
pub struct AppendedRepayment {
    pub repayment: Repayment,
    /// Sum of every repayment on the loan, this one included
    pub total_repaid: Decimal,
    /// The loan was completed in the same transaction
    pub completed: bool,
}
