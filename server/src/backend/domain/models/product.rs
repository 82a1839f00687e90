//! Domain model for a loan product (the template loans are issued from).
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use crate::backend::domain::errors::LoanError;

/// Longest term a product may offer, in days (ten 365-day years)
pub const MAX_TERM_DAYS: u32 = 3_650;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Days,
    Weeks,
    Months,
}

impl DurationUnit {
    /// Length of one unit in days, using the 30-day month convention
    pub fn days(&self) -> u32 {
        match self {
            DurationUnit::Days => 1,
            DurationUnit::Weeks => 7,
            DurationUnit::Months => 30,
        }
    }

    /// Length of `periods` units in days, or `None` past `MAX_TERM_DAYS`
    pub fn term_days(&self, periods: u32) -> Option<u32> {
        periods
            .checked_mul(self.days())
            .filter(|days| *days <= MAX_TERM_DAYS)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Days => "days",
            DurationUnit::Weeks => "weeks",
            DurationUnit::Months => "months",
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurationUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "days" => Ok(DurationUnit::Days),
            "weeks" => Ok(DurationUnit::Weeks),
            "months" => Ok(DurationUnit::Months),
            other => Err(anyhow::anyhow!("Unknown duration unit: {}", other)),
        }
    }
}

/// Fees a product charges at origination
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeeSchedule {
    pub registration: Decimal,
    /// Takes precedence over `processing_percent` when non-zero
    pub processing_fixed: Decimal,
    pub processing_percent: Decimal,
    pub insurance: Decimal,
    pub tracking: Decimal,
    pub valuation: Decimal,
}

/// Everything needed to create or replace a product
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTerms {
    pub name: String,
    pub description: Option<String>,
    pub interest_rate: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub min_period: u32,
    pub max_period: u32,
    pub duration_unit: DurationUnit,
    pub fees: FeeSchedule,
    pub penalty_rate: Decimal,
    pub grace_period_days: u32,
}

impl ProductTerms {
    pub fn validate(&self) -> Result<(), LoanError> {
        if self.name.trim().is_empty() {
            return Err(LoanError::validation("Product name cannot be empty"));
        }
        if self.interest_rate.is_sign_negative() || self.penalty_rate.is_sign_negative() {
            return Err(LoanError::validation("Rates cannot be negative"));
        }
        if self.min_amount <= Decimal::ZERO {
            return Err(LoanError::validation("Minimum amount must be positive"));
        }
        if self.min_amount > self.max_amount {
            return Err(LoanError::validation(
                "Minimum amount cannot exceed maximum amount",
            ));
        }
        if self.min_period == 0 {
            return Err(LoanError::validation("Minimum period must be at least 1"));
        }
        if self.min_period > self.max_period {
            return Err(LoanError::validation(
                "Minimum period cannot exceed maximum period",
            ));
        }
        if self.duration_unit.term_days(self.max_period).is_none() {
            return Err(LoanError::Validation(format!(
                "Maximum period cannot exceed {} days",
                MAX_TERM_DAYS
            )));
        }
        let fees = [
            self.fees.registration,
            self.fees.processing_fixed,
            self.fees.processing_percent,
            self.fees.insurance,
            self.fees.tracking,
            self.fees.valuation,
        ];
        if fees.iter().any(|fee| fee.is_sign_negative()) {
            return Err(LoanError::validation("Fees cannot be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoanProduct {
    pub id: i64,
    pub terms: ProductTerms,
}

impl LoanProduct {
    /// Check a requested principal and duration against the product bounds
    pub fn check_bounds(&self, amount: Decimal, duration: u32) -> Result<(), LoanError> {
        let terms = &self.terms;
        if amount < terms.min_amount || amount > terms.max_amount {
            return Err(LoanError::Validation(format!(
                "Amount {} is outside the product range {} - {}",
                amount, terms.min_amount, terms.max_amount
            )));
        }
        if duration < terms.min_period || duration > terms.max_period {
            return Err(LoanError::Validation(format!(
                "Duration {} {} is outside the product range {} - {}",
                duration, terms.duration_unit, terms.min_period, terms.max_period
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// 10% flat, 1,000 - 50,000 over 1 - 12 months, no fees
    pub fn plain_terms() -> ProductTerms {
        ProductTerms {
            name: "Biashara Loan".to_string(),
            description: None,
            interest_rate: Decimal::from(10),
            min_amount: Decimal::from(1_000),
            max_amount: Decimal::from(50_000),
            min_period: 1,
            max_period: 12,
            duration_unit: DurationUnit::Months,
            fees: FeeSchedule::default(),
            penalty_rate: Decimal::from(5),
            grace_period_days: 3,
        }
    }
}
