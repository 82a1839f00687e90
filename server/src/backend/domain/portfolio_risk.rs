//! # Portfolio Risk Classifier (PAR)
//!
//! Buckets active loans by how long their earliest unpaid installment has been
//! overdue. Repayments are applied to installments in due-date order, so the
//! earliest unpaid installment is the first one whose cumulative amount due
//! exceeds the total repaid.
//!
//! Everything here is a pure function of a schedule, a repaid total and a
//! date. The classification is recomputed on every report and never stored.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::amortization::Schedule;
use super::money::{round_money, HUNDRED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParBucket {
    /// Not overdue
    Current,
    /// 1-30 days
    Par30,
    /// 31-60 days
    Par60,
    /// 61-90 days
    Par90,
    /// More than 90 days
    Par90Plus,
}

impl ParBucket {
    pub const ALL: [ParBucket; 5] = [
        ParBucket::Current,
        ParBucket::Par30,
        ParBucket::Par60,
        ParBucket::Par90,
        ParBucket::Par90Plus,
    ];

    pub fn from_days(days_overdue: i64) -> Self {
        match days_overdue {
            d if d <= 0 => ParBucket::Current,
            1..=30 => ParBucket::Par30,
            31..=60 => ParBucket::Par60,
            61..=90 => ParBucket::Par90,
            _ => ParBucket::Par90Plus,
        }
    }
}

/// Days since the earliest installment not yet covered by repayments fell due
pub fn days_overdue(schedule: &Schedule, total_repaid: Decimal, as_of: NaiveDate) -> i64 {
    let mut cumulative_due = Decimal::ZERO;
    for installment in &schedule.installments {
        cumulative_due += installment.amount_due;
        if cumulative_due > total_repaid {
            return (as_of - installment.due_date).num_days().max(0);
        }
    }
    0
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoanRisk {
    pub loan_id: i64,
    pub client_id: i64,
    pub days_overdue: i64,
    pub bucket: ParBucket,
    pub outstanding: Decimal,
}

impl LoanRisk {
    pub fn classify(
        loan_id: i64,
        client_id: i64,
        schedule: &Schedule,
        total_repaid: Decimal,
        outstanding: Decimal,
        as_of: NaiveDate,
    ) -> Self {
        let days = days_overdue(schedule, total_repaid, as_of);
        Self {
            loan_id,
            client_id,
            days_overdue: days,
            bucket: ParBucket::from_days(days),
            outstanding,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketSummary {
    pub bucket: ParBucket,
    pub loan_count: u32,
    pub outstanding: Decimal,
    /// Share of total outstanding, in percent
    pub ratio: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioRisk {
    pub as_of: NaiveDate,
    pub total_outstanding: Decimal,
    /// One entry per bucket, in `ParBucket::ALL` order
    pub buckets: Vec<BucketSummary>,
    /// Most overdue first
    pub loans: Vec<LoanRisk>,
}

pub fn summarize_portfolio(mut loans: Vec<LoanRisk>, as_of: NaiveDate) -> PortfolioRisk {
    let total_outstanding: Decimal = loans.iter().map(|l| l.outstanding).sum();

    let buckets = ParBucket::ALL
        .iter()
        .map(|bucket| {
            let (loan_count, outstanding) = loans
                .iter()
                .filter(|l| l.bucket == *bucket)
                .fold((0u32, Decimal::ZERO), |(n, sum), l| (n + 1, sum + l.outstanding));
            let ratio = if total_outstanding > Decimal::ZERO {
                round_money(outstanding / total_outstanding * HUNDRED)
            } else {
                Decimal::ZERO
            };
            BucketSummary {
                bucket: *bucket,
                loan_count,
                outstanding,
                ratio,
            }
        })
        .collect();

    loans.sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue).then(a.loan_id.cmp(&b.loan_id)));

    PortfolioRisk {
        as_of,
        total_outstanding,
        buckets,
        loans,
    }
}
