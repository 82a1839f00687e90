//! # Backend Module
//!
//! Wires the loan engine together.
//!
//! ## Architecture
//!
//! ```text
//! IO Layer (REST API, M-Pesa gateway)
//!     ↓
//! Domain Layer (state machine, ledger, scheduler, services)
//!     ↓
//! Storage Layer (SQLite)
//! ```
//!
//! ## Key Responsibilities
//!
//! - Open the database and build every service over one shared lock registry
//! - Pick the M-Pesa gateway the configuration asks for
//! - Assemble the REST router with CORS and request tracing

pub mod domain;
pub mod io;
pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::backend::domain::{
    DisbursementGateway, DisbursementService, KeyedLocks, LoanService, PaymentLedgerService,
    ProductService, ReconciliationService, ReportService,
};
use crate::backend::io::rest;
use crate::backend::storage::DbConnection;
use crate::config::AppConfig;

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub connection: Arc<DbConnection>,
    pub product_service: ProductService<DbConnection>,
    pub loan_service: LoanService<DbConnection>,
    pub ledger_service: PaymentLedgerService<DbConnection>,
    pub disbursement_service: DisbursementService<DbConnection>,
    pub reconciliation_service: ReconciliationService<DbConnection>,
    pub report_service: ReportService<DbConnection>,
}

impl AppState {
    /// Build every service over one connection. All services share one lock
    /// registry so per-loan exclusion holds across them.
    pub fn new(connection: Arc<DbConnection>, gateway: Arc<dyn DisbursementGateway>) -> Self {
        let locks = KeyedLocks::new();
        let ledger_service = PaymentLedgerService::new(connection.clone(), locks.clone());

        Self {
            product_service: ProductService::new(connection.clone()),
            loan_service: LoanService::new(connection.clone(), ledger_service.clone(), locks.clone()),
            disbursement_service: DisbursementService::new(connection.clone(), gateway, locks.clone()),
            reconciliation_service: ReconciliationService::new(
                connection.clone(),
                ledger_service.clone(),
                locks,
            ),
            report_service: ReportService::new(connection.clone(), ledger_service.clone()),
            ledger_service,
            connection,
        }
    }
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: &AppConfig) -> Result<AppState> {
    info!(url = %config.database_url, "Setting up database");
    let connection = DbConnection::new(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    let gateway = io::mpesa::gateway_for(&config.mpesa);
    info!(mode = %mpesa_mode_name(config), "Setting up M-Pesa gateway");

    Ok(AppState::new(Arc::new(connection), gateway))
}

fn mpesa_mode_name(config: &AppConfig) -> &'static str {
    match config.mpesa {
        crate::config::MpesaMode::Simulated => "simulated",
        crate::config::MpesaMode::Daraja(_) => "daraja",
    }
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, cors_origin: &str) -> Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    let api_routes = Router::new()
        .nest("/health", rest::health_apis::router())
        .nest("/loan-products", rest::product_apis::router())
        .nest("/loans", rest::loan_apis::router())
        .nest("/disbursements", rest::disbursement_apis::router())
        .nest("/mpesa", rest::mpesa_apis::router())
        .nest("/reports", rest::report_apis::router());

    Ok(Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state))
}
