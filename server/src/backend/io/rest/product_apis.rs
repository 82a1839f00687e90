//! # REST API for Loan Products
//!
//! Create, list, fetch and edit product templates. Edits only affect loans
//! submitted afterwards.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use shared::LoanProductRequest;
use tracing::info;

use crate::backend::io::rest::mappers::product_mapper::ProductMapper;
use crate::backend::io::rest::ApiError;
use crate::backend::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).put(update_product))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<LoanProductRequest>,
) -> impl IntoResponse {
    info!("POST /api/loan-products - name: {}", request.name);

    match state.product_service.create_product(ProductMapper::to_terms(request)).await {
        Ok(product) => (StatusCode::CREATED, Json(ProductMapper::to_dto(product))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn list_products(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/loan-products");

    match state.product_service.list_products().await {
        Ok(products) => {
            let products: Vec<_> = products.into_iter().map(ProductMapper::to_dto).collect();
            (StatusCode::OK, Json(products)).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn get_product(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    info!("GET /api/loan-products/{}", id);

    match state.product_service.get_product(id).await {
        Ok(product) => (StatusCode::OK, Json(ProductMapper::to_dto(product))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<LoanProductRequest>,
) -> impl IntoResponse {
    info!("PUT /api/loan-products/{}", id);

    match state.product_service.update_product(id, ProductMapper::to_terms(request)).await {
        Ok(product) => (StatusCode::OK, Json(ProductMapper::to_dto(product))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::io::rest::test_support::{send, test_state};
    use axum::http::Method;
    use rust_decimal::Decimal;
    use serde_json::json;
    use shared::{ErrorResponse, LoanProduct};

    fn product_json(name: &str, min_amount: i64) -> serde_json::Value {
        json!({
            "name": name,
            "interest_rate": "10",
            "min_amount": min_amount.to_string(),
            "max_amount": "50000",
            "min_period": 1,
            "max_period": 12,
            "duration_unit": "months",
            "processing_fee_percent": "2.5",
            "penalty_rate": "5",
            "grace_period_days": 3
        })
    }

    async fn setup_test_app() -> Router {
        router().with_state(test_state().await)
    }

    #[tokio::test]
    async fn test_create_list_and_update_product() {
        let app = setup_test_app().await;

        let (status, created): (_, LoanProduct) =
            send(&app, Method::POST, "/", Some(product_json("Biashara", 1_000))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.processing_fee_percent, Decimal::new(25, 1));
        assert_eq!(created.registration_fee, Decimal::ZERO);

        let (status, listed): (_, Vec<LoanProduct>) = send(&app, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed, vec![created.clone()]);

        let uri = format!("/{}", created.id);
        let (status, updated): (_, LoanProduct) =
            send(&app, Method::PUT, &uri, Some(product_json("Biashara Plus", 2_000))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated.name, "Biashara Plus");
        assert_eq!(updated.min_amount, Decimal::from(2_000));
    }

    #[tokio::test]
    async fn test_invalid_and_missing_products() {
        let app = setup_test_app().await;

        let (status, body): (_, ErrorResponse) =
            send(&app, Method::POST, "/", Some(product_json("Broken", 60_000))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "validation_error");

        let (status, body): (_, ErrorResponse) = send(&app, Method::GET, "/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.message, "Loan product 99 not found");
    }
}
