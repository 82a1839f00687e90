//! Domain-level command and query types
//! These structs are used by services inside the domain layer and are **not**
//! exposed over the public API. The REST layer maps the DTOs defined in the
//! `shared` crate to these internal types.

pub mod loans {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::backend::domain::models::{FinancialAnalysis, Guarantor, Referee, RepaymentFrequency};
    use crate::backend::domain::state_machine::{ApprovalDecision, StatusKind};

    /// Input for submitting a new loan application.
    #[derive(Debug, Clone)]
    pub struct SubmitLoanCommand {
        pub client_id: i64,
        pub product_id: i64,
        pub amount: Decimal,
        /// In the product's duration unit
        pub duration: u32,
        pub frequency: RepaymentFrequency,
        pub start_date: NaiveDate,
        pub financial_analysis: Option<FinancialAnalysis>,
        pub guarantors: Vec<Guarantor>,
        pub referees: Vec<Referee>,
        pub waive_processing_fee: bool,
    }

    /// An approver's decision at a given approval level.
    #[derive(Debug, Clone)]
    pub struct DecideLoanCommand {
        pub loan_id: i64,
        pub level: u8,
        pub decision: ApprovalDecision,
        pub notes: String,
        pub actor: String,
    }

    /// Query parameters for listing loans.
    #[derive(Debug, Clone, Default)]
    pub struct LoanFilter {
        pub status: Option<StatusKind>,
        pub client_id: Option<i64>,
    }
}

pub mod repayments {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::backend::domain::models::PaymentMethod;

    /// Input for applying a repayment to an active loan.
    #[derive(Debug, Clone)]
    pub struct ApplyRepaymentCommand {
        pub loan_id: i64,
        pub amount: Decimal,
        pub payment_date: NaiveDate,
        pub method: PaymentMethod,
        pub reference: Option<String>,
        pub notes: Option<String>,
    }
}

pub mod mpesa {
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    /// An inbound payment reported by the M-Pesa adapter.
    #[derive(Debug, Clone)]
    pub struct RecordIncomingCommand {
        pub transaction_id: String,
        pub phone: String,
        pub bill_reference: String,
        pub amount: Decimal,
        /// Defaults to the time of ingestion
        pub received_at: Option<DateTime<Utc>>,
    }
}
