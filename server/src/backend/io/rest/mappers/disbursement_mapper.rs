use shared::Disbursement;

use crate::backend::domain::models::Disbursement as DomainDisbursement;
use crate::backend::io::rest::mappers::ledger_mapper::LedgerMapper;

pub struct DisbursementMapper;

impl DisbursementMapper {
    pub fn to_dto(disbursement: DomainDisbursement) -> Disbursement {
        Disbursement {
            id: disbursement.id,
            loan_id: disbursement.loan_id,
            method: LedgerMapper::method_to_dto(disbursement.method),
            reference: disbursement.reference,
            phone: disbursement.phone,
            notes: disbursement.notes,
            amount: disbursement.amount,
            disbursed_at: disbursement.disbursed_at,
        }
    }

    pub fn to_dto_list(disbursements: Vec<DomainDisbursement>) -> Vec<Disbursement> {
        disbursements.into_iter().map(Self::to_dto).collect()
    }
}
