use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::backend::domain::models::{MpesaTransaction, NewMpesaTransaction, NewRepayment};
use crate::backend::storage::columns;
use crate::backend::storage::connection::DbConnection;
use crate::backend::storage::repositories::RepaymentRepository;
use crate::backend::storage::traits::{MpesaStorage, ReconcileWrite};

/// Repository for inbound M-Pesa payments
#[derive(Clone)]
pub struct MpesaRepository {
    db: DbConnection,
}

const MPESA_COLUMNS: &str =
    "id, transaction_id, phone, bill_reference, amount, received_at, matched, loan_id";

impl MpesaRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn transaction_from_row(row: &SqliteRow) -> Result<MpesaTransaction> {
        Ok(MpesaTransaction {
            id: row.try_get("id")?,
            transaction_id: row.try_get("transaction_id")?,
            phone: row.try_get("phone")?,
            bill_reference: row.try_get("bill_reference")?,
            amount: columns::decimal(row, "amount")?,
            received_at: row.try_get("received_at")?,
            matched: row.try_get("matched")?,
            loan_id: row.try_get("loan_id")?,
        })
    }

    async fn find_by_receipt(&self, transaction_id: &str) -> Result<Option<MpesaTransaction>> {
        let query = format!(
            "SELECT {} FROM mpesa_transactions WHERE transaction_id = ?",
            MPESA_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(transaction_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(Self::transaction_from_row).transpose()
    }
}

#[async_trait]
impl MpesaStorage for MpesaRepository {
    async fn insert_incoming(
        &self,
        transaction: &NewMpesaTransaction,
    ) -> Result<(MpesaTransaction, bool)> {
        let result = sqlx::query(
            r#"
            INSERT INTO mpesa_transactions (transaction_id, phone, bill_reference, amount, received_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (transaction_id) DO NOTHING
            "#,
        )
        .bind(&transaction.transaction_id)
        .bind(&transaction.phone)
        .bind(&transaction.bill_reference)
        .bind(transaction.amount.to_string())
        .bind(transaction.received_at)
        .execute(self.db.pool())
        .await?;

        let created = result.rows_affected() == 1;
        let stored = self
            .find_by_receipt(&transaction.transaction_id)
            .await?
            .ok_or_else(|| anyhow!("M-Pesa transaction {} vanished after insert", transaction.transaction_id))?;
        Ok((stored, created))
    }

    async fn get_transaction(&self, id: i64) -> Result<Option<MpesaTransaction>> {
        let query = format!("SELECT {} FROM mpesa_transactions WHERE id = ?", MPESA_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(Self::transaction_from_row).transpose()
    }

    async fn list_unmatched(&self) -> Result<Vec<MpesaTransaction>> {
        let query = format!(
            "SELECT {} FROM mpesa_transactions WHERE matched = 0 ORDER BY received_at ASC, id ASC",
            MPESA_COLUMNS
        );
        let rows = sqlx::query(&query).fetch_all(self.db.pool()).await?;

        rows.iter().map(Self::transaction_from_row).collect()
    }

    async fn reconcile(
        &self,
        mpesa_id: i64,
        repayment: &NewRepayment,
        total_due: Decimal,
    ) -> Result<ReconcileWrite> {
        let mut tx = self.db.pool().begin().await?;

        // the claim comes first so two operators cannot both take the payment
        let claimed = sqlx::query(
            "UPDATE mpesa_transactions SET matched = 1, loan_id = ? WHERE id = ? AND matched = 0",
        )
        .bind(repayment.loan_id)
        .bind(mpesa_id)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(ReconcileWrite::AlreadyMatched);
        }

        match RepaymentRepository::append_in(&mut tx, repayment, total_due).await? {
            Some(stored) => {
                tx.commit().await?;
                Ok(ReconcileWrite::Applied(stored))
            }
            None => {
                tx.rollback().await?;
                Ok(ReconcileWrite::LoanNotActive)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::models::PaymentMethod;
    use crate::backend::domain::state_machine::StatusKind;
    use crate::backend::storage::repositories::loan_repository::test_support::{
        force_status, seed_pending_loan,
    };
    use crate::backend::storage::traits::RepaymentStorage;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn incoming(receipt: &str, hour: u32) -> NewMpesaTransaction {
        NewMpesaTransaction {
            transaction_id: receipt.to_string(),
            phone: "254712345678".to_string(),
            bill_reference: "loan 1 jane".to_string(),
            amount: Decimal::from(2_200),
            received_at: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
        }
    }

    fn repayment_from(tx: &MpesaTransaction, loan_id: i64) -> NewRepayment {
        NewRepayment {
            loan_id,
            amount: tx.amount,
            payment_date: tx.received_at.date_naive(),
            method: PaymentMethod::Mpesa,
            reference: Some(tx.transaction_id.clone()),
            notes: None,
            mpesa_transaction_id: Some(tx.id),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_ingestion_is_idempotent() {
        let db = DbConnection::init_test().await.expect("Failed to init test db");
        let repo = MpesaRepository::new(db);

        let (first, created) = repo.insert_incoming(&incoming("QGH7XK2P9L", 9)).await.unwrap();
        assert!(created);
        let (again, created) = repo.insert_incoming(&incoming("QGH7XK2P9L", 10)).await.unwrap();
        assert!(!created);
        assert_eq!(again, first);

        repo.insert_incoming(&incoming("QGH7XK2P9A", 8)).await.unwrap();
        let unmatched = repo.list_unmatched().await.unwrap();
        let receipts: Vec<&str> = unmatched.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(receipts, vec!["QGH7XK2P9A", "QGH7XK2P9L"]);
    }

    #[tokio::test]
    async fn test_reconcile_claims_once() {
        let db = DbConnection::init_test().await.expect("Failed to init test db");
        let repo = MpesaRepository::new(db.clone());
        let loan = seed_pending_loan(&db).await;
        force_status(&db, loan.id, StatusKind::Active).await;
        let (tx, _) = repo.insert_incoming(&incoming("QGH7XK2P9L", 9)).await.unwrap();

        let outcome = repo.reconcile(tx.id, &repayment_from(&tx, loan.id), Decimal::from(11_000)).await.unwrap();
        match outcome {
            ReconcileWrite::Applied(appended) => {
                assert_eq!(appended.total_repaid, Decimal::from(2_200));
                assert!(!appended.completed);
            }
            other => panic!("Expected the payment to be applied, got {:?}", other),
        }

        let outcome = repo.reconcile(tx.id, &repayment_from(&tx, loan.id), Decimal::from(11_000)).await.unwrap();
        assert_eq!(outcome, ReconcileWrite::AlreadyMatched);

        let stored = repo.get_transaction(tx.id).await.unwrap().unwrap();
        assert!(stored.matched);
        assert_eq!(stored.loan_id, Some(loan.id));
        assert!(repo.list_unmatched().await.unwrap().is_empty());

        let repayments = RepaymentRepository::new(db.clone()).list_repayments(loan.id).await.unwrap();
        assert_eq!(repayments.len(), 1);
        assert_eq!(repayments[0].mpesa_transaction_id, Some(tx.id));
    }

    #[tokio::test]
    async fn test_reconcile_against_inactive_loan_leaves_payment_unmatched() {
        let db = DbConnection::init_test().await.expect("Failed to init test db");
        let repo = MpesaRepository::new(db.clone());
        let loan = seed_pending_loan(&db).await;
        let (tx, _) = repo.insert_incoming(&incoming("QGH7XK2P9L", 9)).await.unwrap();

        let outcome = repo.reconcile(tx.id, &repayment_from(&tx, loan.id), Decimal::from(11_000)).await.unwrap();
        assert_eq!(outcome, ReconcileWrite::LoanNotActive);

        let stored = repo.get_transaction(tx.id).await.unwrap().unwrap();
        assert!(!stored.matched);
        assert_eq!(stored.loan_id, None);
    }
}
