use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::backend::domain::models::{FeeSchedule, LoanProduct, ProductTerms};
use crate::backend::storage::columns;
use crate::backend::storage::connection::DbConnection;
use crate::backend::storage::traits::ProductStorage;

/// Repository for loan products
#[derive(Clone)]
pub struct ProductRepository {
    db: DbConnection,
}

impl ProductRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn product_from_row(row: &SqliteRow) -> Result<LoanProduct> {
        Ok(LoanProduct {
            id: row.try_get("id")?,
            terms: ProductTerms {
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                interest_rate: columns::decimal(row, "interest_rate")?,
                min_amount: columns::decimal(row, "min_amount")?,
                max_amount: columns::decimal(row, "max_amount")?,
                min_period: columns::count(row, "min_period")?,
                max_period: columns::count(row, "max_period")?,
                duration_unit: columns::parsed(row, "duration_unit")?,
                fees: FeeSchedule {
                    registration: columns::decimal(row, "registration_fee")?,
                    processing_fixed: columns::decimal(row, "processing_fee_fixed")?,
                    processing_percent: columns::decimal(row, "processing_fee_percent")?,
                    insurance: columns::decimal(row, "insurance_fee")?,
                    tracking: columns::decimal(row, "tracking_fee")?,
                    valuation: columns::decimal(row, "valuation_fee")?,
                },
                penalty_rate: columns::decimal(row, "penalty_rate")?,
                grace_period_days: columns::count(row, "grace_period_days")?,
            },
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, description, interest_rate, min_amount, max_amount, \
     min_period, max_period, duration_unit, registration_fee, processing_fee_fixed, \
     processing_fee_percent, insurance_fee, tracking_fee, valuation_fee, penalty_rate, \
     grace_period_days";

#[async_trait]
impl ProductStorage for ProductRepository {
    async fn insert_product(&self, terms: &ProductTerms) -> Result<LoanProduct> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO loan_products (
                name, description, interest_rate, min_amount, max_amount,
                min_period, max_period, duration_unit, registration_fee,
                processing_fee_fixed, processing_fee_percent, insurance_fee,
                tracking_fee, valuation_fee, penalty_rate, grace_period_days,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&terms.name)
        .bind(&terms.description)
        .bind(terms.interest_rate.to_string())
        .bind(terms.min_amount.to_string())
        .bind(terms.max_amount.to_string())
        .bind(i64::from(terms.min_period))
        .bind(i64::from(terms.max_period))
        .bind(terms.duration_unit.as_str())
        .bind(terms.fees.registration.to_string())
        .bind(terms.fees.processing_fixed.to_string())
        .bind(terms.fees.processing_percent.to_string())
        .bind(terms.fees.insurance.to_string())
        .bind(terms.fees.tracking.to_string())
        .bind(terms.fees.valuation.to_string())
        .bind(terms.penalty_rate.to_string())
        .bind(i64::from(terms.grace_period_days))
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        Ok(LoanProduct {
            id: result.last_insert_rowid(),
            terms: terms.clone(),
        })
    }

    async fn get_product(&self, product_id: i64) -> Result<Option<LoanProduct>> {
        let query = format!("SELECT {} FROM loan_products WHERE id = ?", PRODUCT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(product_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(Self::product_from_row).transpose()
    }

    async fn list_products(&self) -> Result<Vec<LoanProduct>> {
        let query = format!("SELECT {} FROM loan_products ORDER BY name ASC, id ASC", PRODUCT_COLUMNS);
        let rows = sqlx::query(&query).fetch_all(self.db.pool()).await?;

        rows.iter().map(Self::product_from_row).collect()
    }

    async fn update_product(&self, product: &LoanProduct) -> Result<bool> {
        let terms = &product.terms;
        let result = sqlx::query(
            r#"
            UPDATE loan_products
            SET name = ?, description = ?, interest_rate = ?, min_amount = ?, max_amount = ?,
                min_period = ?, max_period = ?, duration_unit = ?, registration_fee = ?,
                processing_fee_fixed = ?, processing_fee_percent = ?, insurance_fee = ?,
                tracking_fee = ?, valuation_fee = ?, penalty_rate = ?, grace_period_days = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&terms.name)
        .bind(&terms.description)
        .bind(terms.interest_rate.to_string())
        .bind(terms.min_amount.to_string())
        .bind(terms.max_amount.to_string())
        .bind(i64::from(terms.min_period))
        .bind(i64::from(terms.max_period))
        .bind(terms.duration_unit.as_str())
        .bind(terms.fees.registration.to_string())
        .bind(terms.fees.processing_fixed.to_string())
        .bind(terms.fees.processing_percent.to_string())
        .bind(terms.fees.insurance.to_string())
        .bind(terms.fees.tracking.to_string())
        .bind(terms.fees.valuation.to_string())
        .bind(terms.penalty_rate.to_string())
        .bind(i64::from(terms.grace_period_days))
        .bind(Utc::now())
        .bind(product.id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::models::product::fixtures::plain_terms;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    async fn setup_test_repo() -> ProductRepository {
        let db = DbConnection::init_test().await.expect("Failed to init test db");
        ProductRepository::new(db)
    }

    #[tokio::test]
    async fn test_insert_and_get_product() {
        let repo = setup_test_repo().await;
        let mut terms = plain_terms();
        terms.fees.processing_percent = Decimal::from_str("2.5").unwrap();

        let product = repo.insert_product(&terms).await.expect("Failed to insert product");
        let fetched = repo
            .get_product(product.id)
            .await
            .expect("Failed to get product")
            .expect("Product should exist");

        assert_eq!(fetched, product);
        assert_eq!(fetched.terms.fees.processing_percent, Decimal::from_str("2.5").unwrap());
    }

    #[tokio::test]
    async fn test_list_products_sorted_by_name() {
        let repo = setup_test_repo().await;
        let mut zebra = plain_terms();
        zebra.name = "Zebra".to_string();
        let mut apple = plain_terms();
        apple.name = "Apple".to_string();

        repo.insert_product(&zebra).await.expect("Failed to insert");
        repo.insert_product(&apple).await.expect("Failed to insert");

        let names: Vec<String> = repo
            .list_products()
            .await
            .expect("Failed to list")
            .into_iter()
            .map(|p| p.terms.name)
            .collect();
        assert_eq!(names, vec!["Apple", "Zebra"]);
    }

    #[tokio::test]
    async fn test_update_product() {
        let repo = setup_test_repo().await;
        let mut product = repo.insert_product(&plain_terms()).await.expect("Failed to insert");

        product.terms.interest_rate = Decimal::from(12);
        assert!(repo.update_product(&product).await.expect("Failed to update"));

        let fetched = repo.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(fetched.terms.interest_rate, Decimal::from(12));

        product.id = 999;
        assert!(!repo.update_product(&product).await.expect("Failed to update"));
    }
}
