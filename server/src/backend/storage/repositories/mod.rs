pub mod disbursement_repository;
pub mod loan_repository;
pub mod mpesa_repository;
pub mod product_repository;
pub mod repayment_repository;

pub use disbursement_repository::DisbursementRepository;
pub use loan_repository::LoanRepository;
pub use mpesa_repository::MpesaRepository;
pub use product_repository::ProductRepository;
pub use repayment_repository::RepaymentRepository;
