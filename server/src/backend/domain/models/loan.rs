//! Domain model for a loan and the records it carries from origination.
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::product::{DurationUnit, FeeSchedule, MAX_TERM_DAYS};
use crate::backend::domain::errors::LoanError;
use crate::backend::domain::money::{percent_of, round_money};
use crate::backend::domain::state_machine::{ApprovalDecision, ApprovalLevel, LoanStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepaymentFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl RepaymentFrequency {
    /// Nominal period length in days, used to derive the installment count
    pub fn days(&self) -> u32 {
        match self {
            RepaymentFrequency::Daily => 1,
            RepaymentFrequency::Weekly => 7,
            RepaymentFrequency::Monthly => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepaymentFrequency::Daily => "daily",
            RepaymentFrequency::Weekly => "weekly",
            RepaymentFrequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for RepaymentFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepaymentFrequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(RepaymentFrequency::Daily),
            "weekly" => Ok(RepaymentFrequency::Weekly),
            "monthly" => Ok(RepaymentFrequency::Monthly),
            other => Err(anyhow::anyhow!("Unknown repayment frequency: {}", other)),
        }
    }
}

/// Borrower's declared business figures, captured once at origination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialAnalysis {
    pub monthly_sales: Decimal,
    pub cost_of_sales: Decimal,
    pub personal_expenditure: Decimal,
    pub other_income: Decimal,
    pub net_income: Decimal,
}

impl FinancialAnalysis {
    pub fn new(
        monthly_sales: Decimal,
        cost_of_sales: Decimal,
        personal_expenditure: Decimal,
        other_income: Decimal,
    ) -> Self {
        let net_income =
            round_money(monthly_sales - cost_of_sales - personal_expenditure + other_income);
        Self {
            monthly_sales,
            cost_of_sales,
            personal_expenditure,
            other_income,
            net_income,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guarantor {
    pub name: String,
    pub phone: String,
    pub id_number: Option<String>,
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referee {
    pub name: String,
    pub phone: String,
    pub relationship: Option<String>,
}

/// Fees charged on this loan, frozen at creation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoanFees {
    pub processing: Decimal,
    pub insurance: Decimal,
    pub valuation: Decimal,
    pub registration: Decimal,
    pub tracking: Decimal,
}

impl LoanFees {
    pub fn snapshot(schedule: &FeeSchedule, principal: Decimal, waive_processing: bool) -> Self {
        let processing = if waive_processing {
            Decimal::ZERO
        } else if schedule.processing_fixed > Decimal::ZERO {
            schedule.processing_fixed
        } else {
            percent_of(principal, schedule.processing_percent)
        };

        Self {
            processing,
            insurance: schedule.insurance,
            valuation: schedule.valuation,
            registration: schedule.registration,
            tracking: schedule.tracking,
        }
    }

    pub fn total(&self) -> Decimal {
        self.processing + self.insurance + self.valuation + self.registration + self.tracking
    }
}

/// The stored inputs the repayment schedule is regenerated from
#[derive(Debug, Clone, PartialEq)]
pub struct LoanTerms {
    pub principal: Decimal,
    /// Flat rate over the whole term, copied from the product
    pub interest_rate: Decimal,
    pub duration: u32,
    pub duration_unit: DurationUnit,
    pub frequency: RepaymentFrequency,
    pub start_date: NaiveDate,
}

impl LoanTerms {
    /// Number of installments the duration spans at this frequency
    pub fn installment_count(&self) -> Result<u32, LoanError> {
        let total_days = self.duration_unit.term_days(self.duration).ok_or_else(|| {
            LoanError::Validation(format!(
                "A duration of {} {} is longer than {} days",
                self.duration, self.duration_unit, MAX_TERM_DAYS
            ))
        })?;
        let count = total_days / self.frequency.days();
        if count == 0 {
            return Err(LoanError::Validation(format!(
                "A duration of {} {} is shorter than one {} installment",
                self.duration, self.duration_unit, self.frequency
            )));
        }
        Ok(count)
    }

    pub fn total_interest(&self) -> Decimal {
        percent_of(self.principal, self.interest_rate)
    }

    /// Principal plus flat interest. Fees and penalties are tracked separately.
    pub fn total_due(&self) -> Decimal {
        self.principal + self.total_interest()
    }
}

/// One sign-off (or rejection) in the approval trail
#[derive(Debug, Clone, PartialEq)]
pub struct Approval {
    pub level: ApprovalLevel,
    pub decision: ApprovalDecision,
    pub notes: String,
    pub actor: String,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loan {
    pub id: i64,
    pub client_id: i64,
    pub product_id: i64,
    pub terms: LoanTerms,
    pub status: LoanStatus,
    pub fees: LoanFees,
    pub penalty_rate: Decimal,
    pub grace_period_days: u32,
    pub financial_analysis: Option<FinancialAnalysis>,
    pub guarantors: Vec<Guarantor>,
    pub referees: Vec<Referee>,
    /// Oldest first
    pub approvals: Vec<Approval>,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// Work out the effect of an approval decision without applying it.
    ///
    /// Returns the status the loan moves to and the approval record to append.
    /// The manager sign-off must come from a different actor than the officer's.
    pub fn decide(
        &self,
        level: ApprovalLevel,
        decision: ApprovalDecision,
        notes: &str,
        actor: &str,
        decided_at: DateTime<Utc>,
    ) -> Result<(LoanStatus, Approval), LoanError> {
        let actor = actor.trim();
        if actor.is_empty() {
            return Err(LoanError::validation("Approver cannot be empty"));
        }

        let next = self.status.decide(level, decision, notes)?;

        if level == ApprovalLevel::Manager && decision == ApprovalDecision::Approve {
            let signed_by_officer = self
                .approvals
                .iter()
                .any(|a| a.level == ApprovalLevel::Officer && a.actor == actor);
            if signed_by_officer {
                return Err(LoanError::invalid_state(
                    "Level 2 approval must come from a different approver than level 1",
                ));
            }
        }

        let approval = Approval {
            level,
            decision,
            notes: notes.trim().to_string(),
            actor: actor.to_string(),
            decided_at,
        };
        Ok((next, approval))
    }
}

/// A validated loan application ready to be stored as `pending`
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub client_id: i64,
    pub product_id: i64,
    pub terms: LoanTerms,
    pub fees: LoanFees,
    pub penalty_rate: Decimal,
    pub grace_period_days: u32,
    pub financial_analysis: Option<FinancialAnalysis>,
    pub guarantors: Vec<Guarantor>,
    pub referees: Vec<Referee>,
    pub created_at: DateTime<Utc>,
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_installment_count_across_units() {
        let mut terms = monthly_terms(10_000, 3);
        assert_eq!(terms.installment_count().unwrap(), 3);

        terms.frequency = RepaymentFrequency::Weekly;
        assert_eq!(terms.installment_count().unwrap(), 12);

        terms.frequency = RepaymentFrequency::Daily;
        assert_eq!(terms.installment_count().unwrap(), 90);

        terms.duration_unit = DurationUnit::Days;
        terms.duration = 10;
        terms.frequency = RepaymentFrequency::Monthly;
        assert!(matches!(
            terms.installment_count(),
            Err(LoanError::Validation(_))
        ));
    }

    #[test]
    fn test_installment_count_rejects_oversized_terms() {
        let mut terms = monthly_terms(10_000, 150_000_000);
        assert!(matches!(
            terms.installment_count(),
            Err(LoanError::Validation(_))
        ));

        terms.duration = u32::MAX;
        terms.duration_unit = DurationUnit::Weeks;
        assert!(matches!(
            terms.installment_count(),
            Err(LoanError::Validation(_))
        ));

        // the longest allowed daily term
        terms.duration = MAX_TERM_DAYS;
        terms.duration_unit = DurationUnit::Days;
        terms.frequency = RepaymentFrequency::Daily;
        assert_eq!(terms.installment_count().unwrap(), MAX_TERM_DAYS);
    }

    #[test]
    fn test_total_due_is_flat() {
        let terms = monthly_terms(10_000, 5);
        assert_eq!(terms.total_interest(), Decimal::from(1_000));
        assert_eq!(terms.total_due(), Decimal::from(11_000));
    }

    #[test]
    fn test_fee_snapshot_prefers_fixed_processing_fee() {
        let mut schedule = FeeSchedule {
            processing_fixed: Decimal::from(500),
            processing_percent: Decimal::from(3),
            insurance: Decimal::from(200),
            ..FeeSchedule::default()
        };
        let fees = LoanFees::snapshot(&schedule, Decimal::from(10_000), false);
        assert_eq!(fees.processing, Decimal::from(500));
        assert_eq!(fees.total(), Decimal::from(700));

        schedule.processing_fixed = Decimal::ZERO;
        let fees = LoanFees::snapshot(&schedule, Decimal::from(10_000), false);
        assert_eq!(fees.processing, Decimal::from(300));

        let fees = LoanFees::snapshot(&schedule, Decimal::from(10_000), true);
        assert_eq!(fees.processing, Decimal::ZERO);
        assert_eq!(fees.insurance, Decimal::from(200));
    }

    #[test]
    fn test_financial_analysis_net_income() {
        let analysis = FinancialAnalysis::new(
            Decimal::from(50_000),
            Decimal::from(30_000),
            Decimal::from(8_000),
            Decimal::from(2_500),
        );
        assert_eq!(analysis.net_income, Decimal::from(14_500));
    }

    #[test]
    fn test_decide_records_approval() {
        let loan = pending_loan();
        let (next, approval) = loan
            .decide(
                ApprovalLevel::Officer,
                ApprovalDecision::Approve,
                " checked ",
                "officer.jane",
                Utc::now(),
            )
            .unwrap();
        assert_eq!(next, LoanStatus::Pending { level: ApprovalLevel::Manager });
        assert_eq!(approval.notes, "checked");
        assert_eq!(approval.actor, "officer.jane");
    }

    #[test]
    fn test_dual_control_needs_two_people() {
        let mut loan = pending_loan();
        let (next, approval) = loan
            .decide(ApprovalLevel::Officer, ApprovalDecision::Approve, "", "sam", Utc::now())
            .unwrap();
        loan.status = next;
        loan.approvals.push(approval);

        let err = loan
            .decide(ApprovalLevel::Manager, ApprovalDecision::Approve, "", "sam", Utc::now())
            .unwrap_err();
        assert!(matches!(err, LoanError::InvalidState(_)));

        let (next, _) = loan
            .decide(ApprovalLevel::Manager, ApprovalDecision::Approve, "", "alex", Utc::now())
            .unwrap();
        assert_eq!(next, LoanStatus::Approved);
    }
}
