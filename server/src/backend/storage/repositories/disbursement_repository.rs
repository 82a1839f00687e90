use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::backend::domain::models::{Disbursement, NewDisbursement};
use crate::backend::domain::state_machine::StatusKind;
use crate::backend::storage::columns;
use crate::backend::storage::connection::DbConnection;
use crate::backend::storage::traits::{DisbursementStorage, DisbursementWrite};

/// Repository for loan disbursements (at most one per loan)
#[derive(Clone)]
pub struct DisbursementRepository {
    db: DbConnection,
}

const DISBURSEMENT_COLUMNS: &str =
    "id, loan_id, method, reference, phone, notes, amount, disbursed_at";

impl DisbursementRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn disbursement_from_row(row: &SqliteRow) -> Result<Disbursement> {
        Ok(Disbursement {
            id: row.try_get("id")?,
            loan_id: row.try_get("loan_id")?,
            method: columns::parsed(row, "method")?,
            reference: row.try_get("reference")?,
            phone: row.try_get("phone")?,
            notes: row.try_get("notes")?,
            amount: columns::decimal(row, "amount")?,
            disbursed_at: row.try_get("disbursed_at")?,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl DisbursementStorage for DisbursementRepository {
    async fn record_disbursement(&self, disbursement: &NewDisbursement) -> Result<DisbursementWrite> {
        let mut tx = self.db.pool().begin().await?;

        let activated = sqlx::query("UPDATE loans SET status = ? WHERE id = ? AND status = ?")
            .bind(StatusKind::Active.as_str())
            .bind(disbursement.loan_id)
            .bind(StatusKind::Approved.as_str())
            .execute(&mut *tx)
            .await?;

        if activated.rows_affected() != 1 {
            let existing = sqlx::query("SELECT 1 FROM disbursements WHERE loan_id = ?")
                .bind(disbursement.loan_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Ok(match existing {
                Some(_) => DisbursementWrite::AlreadyDisbursed,
                None => DisbursementWrite::LoanNotApproved,
            });
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO disbursements (loan_id, method, reference, phone, notes, amount, disbursed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(disbursement.loan_id)
        .bind(disbursement.method.as_str())
        .bind(&disbursement.reference)
        .bind(&disbursement.phone)
        .bind(&disbursement.notes)
        .bind(disbursement.amount.to_string())
        .bind(disbursement.disbursed_at)
        .execute(&mut *tx)
        .await;

        let result = match inserted {
            Ok(result) => result,
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await?;
                return Ok(DisbursementWrite::AlreadyDisbursed);
            }
            Err(err) => return Err(err.into()),
        };

        tx.commit().await?;

        Ok(DisbursementWrite::Recorded(Disbursement {
            id: result.last_insert_rowid(),
            loan_id: disbursement.loan_id,
            method: disbursement.method,
            reference: disbursement.reference.clone(),
            phone: disbursement.phone.clone(),
            notes: disbursement.notes.clone(),
            amount: disbursement.amount,
            disbursed_at: disbursement.disbursed_at,
        }))
    }

    async fn get_disbursement(&self, disbursement_id: i64) -> Result<Option<Disbursement>> {
        let query = format!("SELECT {} FROM disbursements WHERE id = ?", DISBURSEMENT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(disbursement_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(Self::disbursement_from_row).transpose()
    }

    async fn get_disbursement_for_loan(&self, loan_id: i64) -> Result<Option<Disbursement>> {
        let query = format!("SELECT {} FROM disbursements WHERE loan_id = ?", DISBURSEMENT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(loan_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(Self::disbursement_from_row).transpose()
    }

    async fn list_disbursements(&self, loan_id: Option<i64>) -> Result<Vec<Disbursement>> {
        let rows = match loan_id {
            Some(loan_id) => {
                let query = format!(
                    "SELECT {} FROM disbursements WHERE loan_id = ? ORDER BY id DESC",
                    DISBURSEMENT_COLUMNS
                );
                sqlx::query(&query)
                    .bind(loan_id)
                    .fetch_all(self.db.pool())
                    .await?
            }
            None => {
                let query = format!("SELECT {} FROM disbursements ORDER BY id DESC", DISBURSEMENT_COLUMNS);
                sqlx::query(&query).fetch_all(self.db.pool()).await?
            }
        };

        rows.iter().map(Self::disbursement_from_row).collect()
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

    fn manual(loan_id: i64) -> NewDisbursement {
        NewDisbursement {
            loan_id,
            method: PaymentMethod::Manual,
            reference: None,
            phone: None,
            notes: Some("cash at branch".to_string()),
            amount: Decimal::from(10_000),
            disbursed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_activates_loan_once() {
        let db = DbConnection::init_test().await.expect("Failed to init test db");
        let repo = DisbursementRepository::new(db.clone());
        let loan = seed_pending_loan(&db).await;
        force_status(&db, loan.id, StatusKind::Approved).await;

        let first = repo.record_disbursement(&manual(loan.id)).await.expect("Failed to record");
        let recorded = match first {
            DisbursementWrite::Recorded(d) => d,
            other => panic!("expected a recorded disbursement, got {:?}", other),
        };
        assert_eq!(recorded.loan_id, loan.id);

        let second = repo.record_disbursement(&manual(loan.id)).await.expect("Failed to record");
        assert_eq!(second, DisbursementWrite::AlreadyDisbursed);

        let fetched = LoanRepository::new(db.clone()).get_loan(loan.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, LoanStatus::Active);
        assert_eq!(repo.list_disbursements(Some(loan.id)).await.unwrap().len(), 1);
        assert_eq!(
            repo.get_disbursement(recorded.id).await.unwrap(),
            Some(recorded.clone())
        );
        assert_eq!(repo.get_disbursement_for_loan(loan.id).await.unwrap(), Some(recorded));
    }

    #[tokio::test]
    async fn test_pending_loan_is_not_disbursed() {
        let db = DbConnection::init_test().await.expect("Failed to init test db");
        let repo = DisbursementRepository::new(db.clone());
        let loan = seed_pending_loan(&db).await;

        let outcome = repo.record_disbursement(&manual(loan.id)).await.expect("Failed to record");
        assert_eq!(outcome, DisbursementWrite::LoanNotApproved);
        assert!(repo.list_disbursements(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unique_loan_constraint_backs_the_status_guard() {
        let db = DbConnection::init_test().await.expect("Failed to init test db");
        let repo = DisbursementRepository::new(db.clone());
        let loan = seed_pending_loan(&db).await;
        force_status(&db, loan.id, StatusKind::Approved).await;
        repo.record_disbursement(&manual(loan.id)).await.unwrap();

        // even if the status were wound back, a second row is refused
        force_status(&db, loan.id, StatusKind::Approved).await;
        let outcome = repo.record_disbursement(&manual(loan.id)).await.unwrap();
        assert_eq!(outcome, DisbursementWrite::AlreadyDisbursed);
    }
}
