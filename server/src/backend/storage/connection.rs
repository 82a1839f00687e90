use anyhow::Result;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::sync::Arc;

use super::repositories::{
    DisbursementRepository, LoanRepository, MpesaRepository, ProductRepository,
    RepaymentRepository,
};
use super::traits::Connection;

// The database URL used when no override is configured
pub const DATABASE_URL: &str = "sqlite:loans.db";

/// DbConnection owns the SQLite pool and the schema
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Open (creating if needed) the database at `url` and set up the schema
    pub async fn new(url: &str) -> Result<Self> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let pool = SqlitePool::connect(url).await?;

        Self::setup_schema(&pool).await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Open a private in-memory database for one test
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS loan_products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                interest_rate TEXT NOT NULL,
                min_amount TEXT NOT NULL,
                max_amount TEXT NOT NULL,
                min_period INTEGER NOT NULL,
                max_period INTEGER NOT NULL,
                duration_unit TEXT NOT NULL CHECK (duration_unit IN ('days', 'weeks', 'months')),
                registration_fee TEXT NOT NULL,
                processing_fee_fixed TEXT NOT NULL,
                processing_fee_percent TEXT NOT NULL,
                insurance_fee TEXT NOT NULL,
                tracking_fee TEXT NOT NULL,
                valuation_fee TEXT NOT NULL,
                penalty_rate TEXT NOT NULL,
                grace_period_days INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        // The level only exists while pending and the reason only once rejected
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS loans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id INTEGER NOT NULL,
                product_id INTEGER NOT NULL REFERENCES loan_products(id),
                principal TEXT NOT NULL,
                interest_rate TEXT NOT NULL,
                duration INTEGER NOT NULL,
                duration_unit TEXT NOT NULL,
                frequency TEXT NOT NULL CHECK (frequency IN ('daily', 'weekly', 'monthly')),
                start_date TEXT NOT NULL,
                status TEXT NOT NULL
                    CHECK (status IN ('pending', 'approved', 'active', 'completed', 'rejected')),
                approval_level INTEGER CHECK (approval_level IN (1, 2)),
                rejection_reason TEXT,
                processing_fee TEXT NOT NULL,
                insurance_fee TEXT NOT NULL,
                valuation_fee TEXT NOT NULL,
                registration_fee TEXT NOT NULL,
                tracking_fee TEXT NOT NULL,
                penalty_rate TEXT NOT NULL,
                grace_period_days INTEGER NOT NULL,
                financial_analysis TEXT NOT NULL,
                guarantors TEXT NOT NULL,
                referees TEXT NOT NULL,
                created_at TEXT NOT NULL,
                CHECK ((status = 'pending') = (approval_level IS NOT NULL)),
                CHECK ((status = 'rejected') = (rejection_reason IS NOT NULL))
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_loans_status ON loans(status);")
            .execute(pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_loans_client ON loans(client_id);")
            .execute(pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS loan_approvals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                loan_id INTEGER NOT NULL REFERENCES loans(id),
                level INTEGER NOT NULL CHECK (level IN (1, 2)),
                decision TEXT NOT NULL CHECK (decision IN ('approve', 'reject')),
                notes TEXT NOT NULL,
                actor TEXT NOT NULL,
                decided_at TEXT NOT NULL,
                UNIQUE (loan_id, level)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mpesa_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                transaction_id TEXT NOT NULL UNIQUE,
                phone TEXT NOT NULL,
                bill_reference TEXT NOT NULL,
                amount TEXT NOT NULL,
                received_at TEXT NOT NULL,
                matched INTEGER NOT NULL DEFAULT 0,
                loan_id INTEGER REFERENCES loans(id),
                CHECK ((matched = 1) = (loan_id IS NOT NULL))
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_mpesa_unmatched
            ON mpesa_transactions(matched, received_at);
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS repayments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                loan_id INTEGER NOT NULL REFERENCES loans(id),
                amount TEXT NOT NULL,
                payment_date TEXT NOT NULL,
                method TEXT NOT NULL CHECK (method IN ('mpesa', 'bank', 'manual')),
                reference TEXT,
                notes TEXT,
                mpesa_transaction_id INTEGER REFERENCES mpesa_transactions(id),
                recorded_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_repayments_loan ON repayments(loan_id);")
            .execute(pool)
            .await?;

        // An inbound payment can back at most one repayment
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_repayments_mpesa_source
            ON repayments(mpesa_transaction_id)
            WHERE mpesa_transaction_id IS NOT NULL;
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS disbursements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                loan_id INTEGER NOT NULL UNIQUE REFERENCES loans(id),
                method TEXT NOT NULL CHECK (method IN ('mpesa', 'bank', 'manual')),
                reference TEXT,
                phone TEXT,
                notes TEXT,
                amount TEXT NOT NULL,
                disbursed_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Financial records are corrected by new entries, never edited
        for (name, table, event) in [
            ("repayments_no_update", "repayments", "UPDATE"),
            ("repayments_no_delete", "repayments", "DELETE"),
            ("loan_approvals_no_update", "loan_approvals", "UPDATE"),
            ("loan_approvals_no_delete", "loan_approvals", "DELETE"),
            ("disbursements_no_update", "disbursements", "UPDATE"),
            ("disbursements_no_delete", "disbursements", "DELETE"),
        ] {
            let ddl = format!(
                "CREATE TRIGGER IF NOT EXISTS {name} BEFORE {event} ON {table} \
                 BEGIN SELECT RAISE(ABORT, '{table} rows are append-only'); END;"
            );
            sqlx::query(&ddl).execute(pool).await?;
        }

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS mpesa_matched_immutable
            BEFORE UPDATE ON mpesa_transactions
            WHEN OLD.matched = 1
            BEGIN
                SELECT RAISE(ABORT, 'reconciled M-Pesa transactions are immutable');
            END;
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

impl Connection for DbConnection {
    type ProductRepository = ProductRepository;
    type LoanRepository = LoanRepository;
    type RepaymentRepository = RepaymentRepository;
    type DisbursementRepository = DisbursementRepository;
    type MpesaRepository = MpesaRepository;

    fn create_product_repository(&self) -> Self::ProductRepository {
        ProductRepository::new(self.clone())
    }

    fn create_loan_repository(&self) -> Self::LoanRepository {
        LoanRepository::new(self.clone())
    }

    fn create_repayment_repository(&self) -> Self::RepaymentRepository {
        RepaymentRepository::new(self.clone())
    }

    fn create_disbursement_repository(&self) -> Self::DisbursementRepository {
        DisbursementRepository::new(self.clone())
    }

    fn create_mpesa_repository(&self) -> Self::MpesaRepository {
        MpesaRepository::new(self.clone())
    }
}
