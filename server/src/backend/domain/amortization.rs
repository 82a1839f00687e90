//! # Amortization Scheduler
//!
//! Flat-rate repayment schedules. Total interest is `P * r / 100` over the
//! whole term and is spread evenly across the installments together with the
//! principal.
//!
//! ## Rounding
//!
//! Each row carries `P / n` principal and `I / n` interest, truncated to cents.
//! The last row takes whatever is left, so the principal column sums to exactly
//! `P`, the interest column to exactly `I`, and the closing balance is zero.
//! Truncating keeps the remainder non-negative: the last row exceeds the
//! others by less than one cent per installment.
//!
//! The schedule is never stored. It is regenerated from the loan's terms on
//! every read, so the same terms always produce the same rows.

use chrono::{Days, Months, NaiveDate};
use rust_decimal::Decimal;

use super::errors::LoanError;
use super::models::product::MAX_TERM_DAYS;
use super::models::{LoanTerms, RepaymentFrequency};
use super::money::{percent_of, truncate_money};

#[derive(Debug, Clone, PartialEq)]
pub struct Installment {
    /// 1-based
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount_due: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
    /// Remaining principal plus interest after this installment is paid
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub installments: Vec<Installment>,
    pub principal: Decimal,
    pub total_interest: Decimal,
    pub total_amount: Decimal,
    /// The regular per-period payment (the last row may differ by rounding)
    pub installment_amount: Decimal,
}

impl Schedule {
    pub fn maturity_date(&self) -> Option<NaiveDate> {
        self.installments.last().map(|i| i.due_date)
    }
}

/// Due date of installment `number` (1-based). Monthly steps are calendar
/// months from the start date, clamped to month end.
pub fn due_date(
    start: NaiveDate,
    frequency: RepaymentFrequency,
    number: u32,
) -> Result<NaiveDate, LoanError> {
    let date = match frequency {
        RepaymentFrequency::Daily => start.checked_add_days(Days::new(u64::from(number))),
        RepaymentFrequency::Weekly => start.checked_add_days(Days::new(7 * u64::from(number))),
        RepaymentFrequency::Monthly => start.checked_add_months(Months::new(number)),
    };
    date.ok_or_else(|| LoanError::validation("Schedule runs past the supported date range"))
}

pub fn generate_schedule(
    principal: Decimal,
    interest_rate: Decimal,
    installments: u32,
    start_date: NaiveDate,
    frequency: RepaymentFrequency,
) -> Result<Schedule, LoanError> {
    if installments == 0 {
        return Err(LoanError::validation(
            "A schedule needs at least one installment",
        ));
    }
    if installments > MAX_TERM_DAYS {
        return Err(LoanError::Validation(format!(
            "A schedule cannot have more than {} installments",
            MAX_TERM_DAYS
        )));
    }
    if principal <= Decimal::ZERO {
        return Err(LoanError::validation("Principal must be positive"));
    }
    if interest_rate.is_sign_negative() {
        return Err(LoanError::validation("Interest rate cannot be negative"));
    }

    let total_interest = percent_of(principal, interest_rate);
    let total_amount = principal + total_interest;
    let n = Decimal::from(installments);
    let principal_portion = truncate_money(principal / n);
    let interest_portion = truncate_money(total_interest / n);

    let mut rows = Vec::with_capacity(installments as usize);
    let mut principal_paid = Decimal::ZERO;
    let mut interest_paid = Decimal::ZERO;

    for number in 1..=installments {
        let (row_principal, row_interest) = if number == installments {
            (principal - principal_paid, total_interest - interest_paid)
        } else {
            (principal_portion, interest_portion)
        };
        principal_paid += row_principal;
        interest_paid += row_interest;

        rows.push(Installment {
            number,
            due_date: due_date(start_date, frequency, number)?,
            amount_due: row_principal + row_interest,
            principal: row_principal,
            interest: row_interest,
            balance: total_amount - principal_paid - interest_paid,
        });
    }

    Ok(Schedule {
        installments: rows,
        principal,
        total_interest,
        total_amount,
        installment_amount: principal_portion + interest_portion,
    })
}

/// Regenerate the schedule for a loan's stored terms
pub fn schedule_for(terms: &LoanTerms) -> Result<Schedule, LoanError> {
    generate_schedule(
        terms.principal,
        terms.interest_rate,
        terms.installment_count()?,
        terms.start_date,
        terms.frequency,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_even_split_scenario() {
        let schedule = generate_schedule(
            Decimal::from(10_000),
            Decimal::from(10),
            5,
            date(2024, 1, 15),
            RepaymentFrequency::Monthly,
        )
        .unwrap();

        assert_eq!(schedule.installments.len(), 5);
        for row in &schedule.installments {
            assert_eq!(row.principal, Decimal::from(2_000));
            assert_eq!(row.interest, Decimal::from(200));
            assert_eq!(row.amount_due, Decimal::from(2_200));
        }
        assert_eq!(schedule.installments[0].balance, Decimal::from(8_800));
        assert_eq!(schedule.installments[4].balance, Decimal::ZERO);
        assert_eq!(schedule.total_amount, Decimal::from(11_000));
        assert_eq!(schedule.installment_amount, Decimal::from(2_200));
        assert_eq!(schedule.installments[0].due_date, date(2024, 2, 15));
        assert_eq!(schedule.maturity_date(), Some(date(2024, 6, 15)));
    }

    #[test]
    fn test_last_row_absorbs_rounding() {
        let schedule = generate_schedule(
            Decimal::from(10_000),
            dec("12.5"),
            3,
            date(2024, 1, 1),
            RepaymentFrequency::Weekly,
        )
        .unwrap();

        let rows = &schedule.installments;
        assert_eq!(rows[0].principal, dec("3333.33"));
        assert_eq!(rows[2].principal, dec("3333.34"));
        assert_eq!(rows[0].interest, dec("416.66"));
        assert_eq!(rows[2].interest, dec("416.68"));

        let principal: Decimal = rows.iter().map(|r| r.principal).sum();
        let interest: Decimal = rows.iter().map(|r| r.interest).sum();
        assert_eq!(principal, Decimal::from(10_000));
        assert_eq!(interest, dec("1250"));
        assert_eq!(rows[2].balance, Decimal::ZERO);
        for row in rows {
            assert_eq!(row.amount_due, row.principal + row.interest);
        }
    }

    #[test]
    fn test_balances_never_increase() {
        let schedule = generate_schedule(
            dec("7777.77"),
            dec("9.9"),
            13,
            date(2024, 3, 1),
            RepaymentFrequency::Daily,
        )
        .unwrap();

        let mut previous = schedule.total_amount;
        for row in &schedule.installments {
            assert!(row.balance <= previous);
            assert!(row.balance >= Decimal::ZERO);
            previous = row.balance;
        }
        assert_eq!(previous, Decimal::ZERO);
    }

    #[test]
    fn test_small_interest_over_many_rows() {
        // 1.80 interest over 360 rows truncates to nothing per row
        let schedule = generate_schedule(
            Decimal::from(1_000),
            dec("0.18"),
            360,
            date(2024, 1, 1),
            RepaymentFrequency::Daily,
        )
        .unwrap();

        let rows = &schedule.installments;
        assert_eq!(rows[0].interest, Decimal::ZERO);
        assert_eq!(rows[359].interest, dec("1.80"));
        assert_eq!(rows[0].principal, dec("2.77"));
        assert_eq!(rows[359].principal, dec("5.57"));
        assert_eq!(rows[359].balance, Decimal::ZERO);
    }

    #[test]
    fn test_portions_across_terms() {
        let principals = ["1000", "7777.77", "10000", "12345.67", "99999.99"];
        let rates = ["0", "0.18", "9.9", "12.5", "33.33"];
        let counts = [1, 2, 3, 7, 12, 30, 52, 90, 360];

        for p in principals {
            for r in rates {
                for n in counts {
                    let principal = dec(p);
                    let schedule = generate_schedule(
                        principal,
                        dec(r),
                        n,
                        date(2024, 1, 1),
                        RepaymentFrequency::Daily,
                    )
                    .unwrap();
                    let rows = &schedule.installments;
                    let case = format!("P={} r={} n={}", p, r, n);

                    let principal_sum: Decimal = rows.iter().map(|row| row.principal).sum();
                    let interest_sum: Decimal = rows.iter().map(|row| row.interest).sum();
                    assert_eq!(principal_sum, principal, "{}", case);
                    assert_eq!(interest_sum, schedule.total_interest, "{}", case);
                    assert!(rows.iter().all(|row| row.principal >= Decimal::ZERO), "{}", case);
                    assert!(rows.iter().all(|row| row.interest >= Decimal::ZERO), "{}", case);

                    // the last row exceeds the regular one by under a cent per row
                    let first = &rows[0];
                    let last = &rows[rows.len() - 1];
                    let bound = Decimal::new(i64::from(n), 2);
                    assert!(last.principal >= first.principal, "{}", case);
                    assert!(last.principal - first.principal < bound, "{}", case);
                    assert!(last.interest >= first.interest, "{}", case);
                    assert!(last.interest - first.interest < bound, "{}", case);
                    assert_eq!(last.balance, Decimal::ZERO, "{}", case);
                }
            }
        }
    }

    #[test]
    fn test_installment_count_is_capped() {
        let err = generate_schedule(
            Decimal::from(1_000),
            Decimal::from(10),
            MAX_TERM_DAYS + 1,
            date(2024, 1, 1),
            RepaymentFrequency::Daily,
        )
        .unwrap_err();
        assert!(matches!(err, LoanError::Validation(_)));
    }

    #[test]
    fn test_zero_installments_is_invalid() {
        let err = generate_schedule(
            Decimal::from(1_000),
            Decimal::from(10),
            0,
            date(2024, 1, 1),
            RepaymentFrequency::Monthly,
        )
        .unwrap_err();
        assert!(matches!(err, LoanError::Validation(_)));
    }

    #[test]
    fn test_due_dates_by_frequency() {
        let start = date(2024, 1, 31);
        assert_eq!(due_date(start, RepaymentFrequency::Daily, 1).unwrap(), date(2024, 2, 1));
        assert_eq!(due_date(start, RepaymentFrequency::Weekly, 2).unwrap(), date(2024, 2, 14));
        // month-end clamping in a leap year
        assert_eq!(due_date(start, RepaymentFrequency::Monthly, 1).unwrap(), date(2024, 2, 29));
        assert_eq!(due_date(start, RepaymentFrequency::Monthly, 2).unwrap(), date(2024, 3, 31));
    }

    #[test]
    fn test_schedule_is_deterministic() {
        let build = || {
            generate_schedule(
                Decimal::from(25_000),
                Decimal::from(15),
                12,
                date(2024, 5, 10),
                RepaymentFrequency::Monthly,
            )
            .unwrap()
        };
        assert_eq!(build(), build());
    }
}
