use shared::{
    Installment, LoanBalance, PaymentMethod, Repayment, RepaymentResponse, ScheduleResponse,
    ScheduleSummary,
};

use crate::backend::domain::amortization::Schedule;
use crate::backend::domain::models::{PaymentMethod as DomainPaymentMethod, Repayment as DomainRepayment};
use crate::backend::domain::payment_ledger::{LoanBalance as DomainLoanBalance, RepaymentOutcome};
use crate::backend::io::rest::mappers::loan_mapper::LoanMapper;

/// Repayments, balances and schedules
pub struct LedgerMapper;

impl LedgerMapper {
    pub fn method_to_domain(method: PaymentMethod) -> DomainPaymentMethod {
        match method {
            PaymentMethod::Mpesa => DomainPaymentMethod::Mpesa,
            PaymentMethod::Bank => DomainPaymentMethod::Bank,
            PaymentMethod::Manual => DomainPaymentMethod::Manual,
        }
    }

    pub fn method_to_dto(method: DomainPaymentMethod) -> PaymentMethod {
        match method {
            DomainPaymentMethod::Mpesa => PaymentMethod::Mpesa,
            DomainPaymentMethod::Bank => PaymentMethod::Bank,
            DomainPaymentMethod::Manual => PaymentMethod::Manual,
        }
    }

    pub fn repayment_to_dto(repayment: DomainRepayment) -> Repayment {
        Repayment {
            id: repayment.id,
            loan_id: repayment.loan_id,
            amount: repayment.amount,
            payment_date: repayment.payment_date,
            method: Self::method_to_dto(repayment.method),
            reference: repayment.reference,
            notes: repayment.notes,
            recorded_at: repayment.recorded_at,
        }
    }

    pub fn balance_to_dto(balance: DomainLoanBalance) -> LoanBalance {
        LoanBalance {
            total_due: balance.summary.total_due,
            total_repaid: balance.summary.total_repaid,
            outstanding_balance: balance.summary.outstanding_balance,
            progress_percent: balance.summary.progress_percent,
            accrued_penalty: balance.accrued_penalty,
        }
    }

    pub fn to_repayment_response(
        outcome: RepaymentOutcome,
        balance: DomainLoanBalance,
    ) -> RepaymentResponse {
        RepaymentResponse {
            repayment: Self::repayment_to_dto(outcome.repayment),
            loan_status: LoanMapper::status_to_dto(&outcome.status),
            balance: Self::balance_to_dto(balance),
        }
    }

    pub fn to_schedule_response(loan_id: i64, schedule: Schedule) -> ScheduleResponse {
        let summary = ScheduleSummary {
            total_amount: schedule.total_amount,
            principal: schedule.principal,
            interest: schedule.total_interest,
            monthly_payment: schedule.installment_amount,
            installments: schedule.installments.len() as u32,
        };
        let installments = schedule
            .installments
            .into_iter()
            .map(|row| Installment {
                installment_number: row.number,
                due_date: row.due_date,
                amount_due: row.amount_due,
                principal_amount: row.principal,
                interest_amount: row.interest,
                balance: row.balance,
            })
            .collect();
        ScheduleResponse {
            loan_id,
            installments,
            summary,
        }
    }
}
