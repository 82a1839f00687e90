//! Domain entities of the loan engine.
//!
//! These types are internal; the REST layer maps them to the wire types in the
//! `shared` crate.

pub mod disbursement;
pub mod loan;
pub mod mpesa;
pub mod product;
pub mod repayment;

pub use disbursement::*;
pub use loan::*;
pub use mpesa::*;
pub use product::*;
pub use repayment::*;
