use shared::{IncomingMpesaTransactionRequest, MpesaTransaction, ReconcileResponse};

use crate::backend::domain::commands::mpesa::RecordIncomingCommand;
use crate::backend::domain::models::MpesaTransaction as DomainMpesaTransaction;
use crate::backend::domain::reconciliation_service::ReconcileOutcome;
use crate::backend::io::rest::mappers::ledger_mapper::LedgerMapper;
use crate::backend::io::rest::mappers::loan_mapper::LoanMapper;

pub struct MpesaMapper;

impl MpesaMapper {
    pub fn to_command(request: IncomingMpesaTransactionRequest) -> RecordIncomingCommand {
        RecordIncomingCommand {
            transaction_id: request.transaction_id,
            phone: request.phone,
            bill_reference: request.bill_reference,
            amount: request.amount,
            received_at: request.received_at,
        }
    }

    pub fn to_dto(transaction: DomainMpesaTransaction) -> MpesaTransaction {
        MpesaTransaction {
            id: transaction.id,
            transaction_id: transaction.transaction_id,
            phone: transaction.phone,
            bill_reference: transaction.bill_reference,
            amount: transaction.amount,
            received_at: transaction.received_at,
            matched: transaction.matched,
            loan_id: transaction.loan_id,
        }
    }

    pub fn to_reconcile_response(outcome: ReconcileOutcome) -> ReconcileResponse {
        ReconcileResponse {
            transaction: Self::to_dto(outcome.transaction),
            repayment: LedgerMapper::repayment_to_dto(outcome.repayment),
            loan_status: LoanMapper::status_to_dto(&outcome.status),
        }
    }
}
