//! Loan product catalogue.
//!
//! Products are templates. A loan copies the rate, fees, penalty rate and
//! grace period it needs when it is created, so editing a product never
//! changes an existing loan.

use std::sync::Arc;

use tracing::info;

use super::errors::LoanError;
use super::models::{LoanProduct, ProductTerms};
use crate::backend::storage::{Connection, ProductStorage};

#[derive(Clone)]
pub struct ProductService<C: Connection> {
    product_repository: C::ProductRepository,
}

impl<C: Connection> ProductService<C> {
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            product_repository: connection.create_product_repository(),
        }
    }

    pub async fn create_product(&self, terms: ProductTerms) -> Result<LoanProduct, LoanError> {
        terms.validate()?;
        let product = self.product_repository.insert_product(&terms).await?;
        info!(product_id = product.id, name = %product.terms.name, "Created loan product");
        Ok(product)
    }

    pub async fn list_products(&self) -> Result<Vec<LoanProduct>, LoanError> {
        Ok(self.product_repository.list_products().await?)
    }

    pub async fn get_product(&self, product_id: i64) -> Result<LoanProduct, LoanError> {
        self.product_repository
            .get_product(product_id)
            .await?
            .ok_or(LoanError::NotFound { entity: "Loan product", id: product_id })
    }

    pub async fn update_product(
        &self,
        product_id: i64,
        terms: ProductTerms,
    ) -> Result<LoanProduct, LoanError> {
        terms.validate()?;
        let product = LoanProduct { id: product_id, terms };
        if !self.product_repository.update_product(&product).await? {
            return Err(LoanError::NotFound { entity: "Loan product", id: product_id });
        }
        info!(product_id, "Updated loan product");
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::models::product::fixtures::plain_terms;
    use crate::backend::storage::DbConnection;
    use rust_decimal::Decimal;

    async fn create_test_service() -> ProductService<DbConnection> {
        let connection = Arc::new(DbConnection::init_test().await.expect("Failed to init test db"));
        ProductService::new(connection)
    }

    #[tokio::test]
    async fn test_create_and_get_product() {
        let service = create_test_service().await;
        let product = service.create_product(plain_terms()).await.expect("Failed to create product");

        let fetched = service.get_product(product.id).await.expect("Failed to get product");
        assert_eq!(fetched, product);
        assert_eq!(service.list_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_product_is_not_stored() {
        let service = create_test_service().await;
        let mut terms = plain_terms();
        terms.max_period = 0;

        let err = service.create_product(terms).await.unwrap_err();
        assert!(matches!(err, LoanError::Validation(_)));
        assert!(service.list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let service = create_test_service().await;
        let err = service.update_product(42, plain_terms()).await.unwrap_err();
        assert!(matches!(err, LoanError::NotFound { id: 42, .. }));

        let product = service.create_product(plain_terms()).await.unwrap();
        let mut terms = plain_terms();
        terms.interest_rate = Decimal::from(8);
        let updated = service.update_product(product.id, terms).await.unwrap();
        assert_eq!(updated.terms.interest_rate, Decimal::from(8));
    }
}
