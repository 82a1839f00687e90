use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use crate::backend::domain::models::{AppendedRepayment, NewRepayment, Repayment};
use crate::backend::domain::state_machine::StatusKind;
use crate::backend::storage::columns;
use crate::backend::storage::connection::DbConnection;
use crate::backend::storage::traits::RepaymentStorage;

/// Repository for the append-only repayment ledger
#[derive(Clone)]
pub struct RepaymentRepository {
    db: DbConnection,
}

const REPAYMENT_COLUMNS: &str = "id, loan_id, amount, payment_date, method, reference, notes, \
     mpesa_transaction_id, recorded_at";

impl RepaymentRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub(crate) fn repayment_from_row(row: &SqliteRow) -> Result<Repayment> {
        Ok(Repayment {
            id: row.try_get("id")?,
            loan_id: row.try_get("loan_id")?,
            amount: columns::decimal(row, "amount")?,
            payment_date: row.try_get("payment_date")?,
            method: columns::parsed(row, "method")?,
            reference: row.try_get("reference")?,
            notes: row.try_get("notes")?,
            mpesa_transaction_id: row.try_get("mpesa_transaction_id")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }

    /// Guard the loan, append the repayment and settle the ledger inside `tx`.
    ///
    /// The loan row is rewritten only while it is still active, which takes
    /// SQLite's write lock before the ledger is touched. The repayment total
    /// is then read under that lock, and the loan moves to completed once it
    /// reaches `total_due`. Returns `None` when the loan has left the active
    /// state.
    pub(crate) async fn append_in(
        tx: &mut Transaction<'_, Sqlite>,
        repayment: &NewRepayment,
        total_due: Decimal,
    ) -> Result<Option<AppendedRepayment>> {
        let active = StatusKind::Active.as_str();
        let guarded = sqlx::query("UPDATE loans SET status = ? WHERE id = ? AND status = ?")
            .bind(active)
            .bind(repayment.loan_id)
            .bind(active)
            .execute(&mut **tx)
            .await?;
        if guarded.rows_affected() != 1 {
            return Ok(None);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO repayments (
                loan_id, amount, payment_date, method, reference, notes,
                mpesa_transaction_id, recorded_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(repayment.loan_id)
        .bind(repayment.amount.to_string())
        .bind(repayment.payment_date)
        .bind(repayment.method.as_str())
        .bind(&repayment.reference)
        .bind(&repayment.notes)
        .bind(repayment.mpesa_transaction_id)
        .bind(repayment.recorded_at)
        .execute(&mut **tx)
        .await?;

        // amounts are TEXT, so the sum is taken in Decimal rather than SQL
        let rows = sqlx::query("SELECT amount FROM repayments WHERE loan_id = ?")
            .bind(repayment.loan_id)
            .fetch_all(&mut **tx)
            .await?;
        let mut total_repaid = Decimal::ZERO;
        for row in &rows {
            total_repaid += columns::decimal(row, "amount")?;
        }

        let completed = total_repaid >= total_due;
        if completed {
            let settled = sqlx::query("UPDATE loans SET status = ? WHERE id = ? AND status = ?")
                .bind(StatusKind::Completed.as_str())
                .bind(repayment.loan_id)
                .bind(active)
                .execute(&mut **tx)
                .await?;
            if settled.rows_affected() != 1 {
                bail!("Loan {} left the active state mid-transaction", repayment.loan_id);
            }
        }

        let stored = Repayment {
            id: result.last_insert_rowid(),
            loan_id: repayment.loan_id,
            amount: repayment.amount,
            payment_date: repayment.payment_date,
            method: repayment.method,
            reference: repayment.reference.clone(),
            notes: repayment.notes.clone(),
            mpesa_transaction_id: repayment.mpesa_transaction_id,
            recorded_at: repayment.recorded_at,
        };
        Ok(Some(AppendedRepayment {
            repayment: stored,
            total_repaid,
            completed,
        }))
    }
}

#[async_trait]
impl RepaymentStorage for RepaymentRepository {
    async fn append_repayment(
        &self,
        repayment: &NewRepayment,
        total_due: Decimal,
    ) -> Result<Option<AppendedRepayment>> {
        let mut tx = self.db.pool().begin().await?;
        match Self::append_in(&mut tx, repayment, total_due).await? {
            Some(stored) => {
                tx.commit().await?;
                Ok(Some(stored))
            }
            None => {
                tx.rollback().await?;
                Ok(None)
            }
        }
    }

    async fn list_repayments(&self, loan_id: i64) -> Result<Vec<Repayment>> {
        let query = format!(
            "SELECT {} FROM repayments WHERE loan_id = ? ORDER BY id ASC",
            REPAYMENT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(loan_id)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(Self::repayment_from_row).collect()
    }

    async fn list_repayments_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Repayment>> {
        let query = format!(
            "SELECT {} FROM repayments WHERE payment_date >= ? AND payment_date <= ? \
             ORDER BY payment_date ASC, id ASC",
            REPAYMENT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(start)
            .bind(end)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(Self::repayment_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::models::PaymentMethod;
    use crate::backend::domain::state_machine::LoanStatus;
    use crate::backend::storage::repositories::loan_repository::test_support::{
        force_status, seed_pending_loan,
    };
    use crate::backend::storage::repositories::LoanRepository;
    use crate::backend::storage::traits::LoanStorage;
    use chrono::Utc;
    use rust_decimal::Decimal;

    /// 10,000 at 10% flat, as seeded
    fn total_due() -> Decimal {
        Decimal::from(11_000)
    }

    fn repayment(loan_id: i64, amount: i64, day: u32) -> NewRepayment {
        NewRepayment {
            loan_id,
            amount: Decimal::from(amount),
            payment_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            method: PaymentMethod::Bank,
            reference: Some(format!("BNK{}", day)),
            notes: None,
            mpesa_transaction_id: None,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_requires_active_loan() {
        let db = DbConnection::init_test().await.expect("Failed to init test db");
        let repo = RepaymentRepository::new(db.clone());
        let loan = seed_pending_loan(&db).await;

        let stored = repo
            .append_repayment(&repayment(loan.id, 1_000, 1), total_due())
            .await
            .expect("Failed to append");
        assert!(stored.is_none());
        assert!(repo.list_repayments(loan.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settling_repayment_completes_loan() {
        let db = DbConnection::init_test().await.expect("Failed to init test db");
        let repo = RepaymentRepository::new(db.clone());
        let loan = seed_pending_loan(&db).await;
        force_status(&db, loan.id, StatusKind::Active).await;

        let first = repo
            .append_repayment(&repayment(loan.id, 5_000, 1), total_due())
            .await
            .unwrap()
            .expect("Loan is active");
        assert_eq!(first.total_repaid, Decimal::from(5_000));
        assert!(!first.completed);

        let second = repo
            .append_repayment(&repayment(loan.id, 6_000, 2), total_due())
            .await
            .unwrap()
            .expect("Loan is active");
        assert_eq!(second.total_repaid, Decimal::from(11_000));
        assert!(second.completed);

        let fetched = LoanRepository::new(db.clone()).get_loan(loan.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, LoanStatus::Completed);

        // completed loans take nothing more
        let late = repo.append_repayment(&repayment(loan.id, 10, 3), total_due()).await.unwrap();
        assert!(late.is_none());

        let amounts: Vec<Decimal> = repo
            .list_repayments(loan.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.amount)
            .collect();
        assert_eq!(amounts, vec![Decimal::from(5_000), Decimal::from(6_000)]);
    }

    #[tokio::test]
    async fn test_completion_counts_every_stored_repayment() {
        let db = DbConnection::init_test().await.expect("Failed to init test db");
        let loan = seed_pending_loan(&db).await;
        force_status(&db, loan.id, StatusKind::Active).await;

        // two handles over one database, each unaware of the other's write
        let clerk = RepaymentRepository::new(db.clone());
        let teller = RepaymentRepository::new(db.clone());
        let first = clerk
            .append_repayment(&repayment(loan.id, 5_500, 1), total_due())
            .await
            .unwrap()
            .expect("Loan is active");
        assert!(!first.completed);
        let second = teller
            .append_repayment(&repayment(loan.id, 5_500, 2), total_due())
            .await
            .unwrap()
            .expect("Loan is active");
        assert!(second.completed);
        assert_eq!(second.total_repaid, total_due());

        let fetched = LoanRepository::new(db.clone()).get_loan(loan.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, LoanStatus::Completed);
    }

    #[tokio::test]
    async fn test_list_between_dates_and_append_only() {
        let db = DbConnection::init_test().await.expect("Failed to init test db");
        let repo = RepaymentRepository::new(db.clone());
        let loan = seed_pending_loan(&db).await;
        force_status(&db, loan.id, StatusKind::Active).await;

        for day in [1, 10, 20] {
            repo.append_repayment(&repayment(loan.id, 100, day), total_due())
                .await
                .unwrap();
        }

        let in_range = repo
            .list_repayments_between(
                NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(in_range.len(), 2);

        let result = sqlx::query("UPDATE repayments SET amount = '1'")
            .execute(db.pool())
            .await;
        assert!(result.is_err());
        let result = sqlx::query("DELETE FROM repayments").execute(db.pool()).await;
        assert!(result.is_err());
    }
}
