//! # Storage Module
//!
//! Persistence for the loan engine, on SQLite through sqlx.
//!
//! ## Key Responsibilities
//!
//! - **Schema**: tables, indexes and append-only triggers (`connection.rs`)
//! - **Repositories**: one per aggregate, implementing the traits in `traits.rs`
//! - **Atomic guards**: every state-dependent write is a conditional update
//!   inside a transaction, backed by unique constraints
//!
//! Money is stored as decimal TEXT so amounts survive the round trip exactly.

pub mod columns;
pub mod connection;
pub mod repositories;
pub mod traits;

pub use connection::{DbConnection, DATABASE_URL};
pub use repositories::{
    DisbursementRepository, LoanRepository, MpesaRepository, ProductRepository,
    RepaymentRepository,
};
pub use traits::*;
