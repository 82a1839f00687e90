//! Conversions between domain types and the wire DTOs in `shared`.

pub mod disbursement_mapper;
pub mod ledger_mapper;
pub mod loan_mapper;
pub mod mpesa_mapper;
pub mod product_mapper;
pub mod report_mapper;
