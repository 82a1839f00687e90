use shared::{
    ApprovalAction, ApprovalRequest, CreateLoanRequest, FinancialAnalysis, Guarantor, Loan,
    LoanFees, LoanStatus, Referee, RepaymentFrequency,
};

use crate::backend::domain::commands::loans::{DecideLoanCommand, SubmitLoanCommand};
use crate::backend::domain::loan_service::LoanDetails;
use crate::backend::domain::models::{
    Approval as DomainApproval, FinancialAnalysis as DomainFinancialAnalysis,
    Guarantor as DomainGuarantor, LoanFees as DomainLoanFees, Referee as DomainReferee,
    RepaymentFrequency as DomainRepaymentFrequency,
};
use crate::backend::domain::state_machine::{
    ApprovalDecision, LoanStatus as DomainLoanStatus, StatusKind,
};
use crate::backend::io::rest::mappers::ledger_mapper::LedgerMapper;
use crate::backend::io::rest::mappers::product_mapper::ProductMapper;

pub struct LoanMapper;

impl LoanMapper {
    pub fn status_to_dto(status: &DomainLoanStatus) -> LoanStatus {
        Self::status_kind_to_dto(status.kind())
    }

    pub fn status_kind_to_dto(kind: StatusKind) -> LoanStatus {
        match kind {
            StatusKind::Pending => LoanStatus::Pending,
            StatusKind::Approved => LoanStatus::Approved,
            StatusKind::Active => LoanStatus::Active,
            StatusKind::Completed => LoanStatus::Completed,
            StatusKind::Rejected => LoanStatus::Rejected,
        }
    }

    pub fn status_to_kind(status: LoanStatus) -> StatusKind {
        match status {
            LoanStatus::Pending => StatusKind::Pending,
            LoanStatus::Approved => StatusKind::Approved,
            LoanStatus::Active => StatusKind::Active,
            LoanStatus::Completed => StatusKind::Completed,
            LoanStatus::Rejected => StatusKind::Rejected,
        }
    }

    pub fn frequency_to_domain(frequency: RepaymentFrequency) -> DomainRepaymentFrequency {
        match frequency {
            RepaymentFrequency::Daily => DomainRepaymentFrequency::Daily,
            RepaymentFrequency::Weekly => DomainRepaymentFrequency::Weekly,
            RepaymentFrequency::Monthly => DomainRepaymentFrequency::Monthly,
        }
    }

    pub fn frequency_to_dto(frequency: DomainRepaymentFrequency) -> RepaymentFrequency {
        match frequency {
            DomainRepaymentFrequency::Daily => RepaymentFrequency::Daily,
            DomainRepaymentFrequency::Weekly => RepaymentFrequency::Weekly,
            DomainRepaymentFrequency::Monthly => RepaymentFrequency::Monthly,
        }
    }

    pub fn to_submit_command(request: CreateLoanRequest) -> SubmitLoanCommand {
        SubmitLoanCommand {
            client_id: request.client_id,
            product_id: request.product_id,
            amount: request.amount,
            duration: request.duration,
            frequency: Self::frequency_to_domain(request.frequency),
            start_date: request.start_date,
            financial_analysis: request.financial_analysis.map(|fa| {
                DomainFinancialAnalysis::new(
                    fa.monthly_sales,
                    fa.cost_of_sales,
                    fa.personal_expenditure,
                    fa.other_income,
                )
            }),
            guarantors: request
                .guarantors
                .into_iter()
                .map(|g| DomainGuarantor {
                    name: g.name,
                    phone: g.phone,
                    id_number: g.id_number,
                    relationship: g.relationship,
                })
                .collect(),
            referees: request
                .referees
                .into_iter()
                .map(|r| DomainReferee {
                    name: r.name,
                    phone: r.phone,
                    relationship: r.relationship,
                })
                .collect(),
            waive_processing_fee: request.waive_processing_fee,
        }
    }

    pub fn to_decide_command(loan_id: i64, request: ApprovalRequest) -> DecideLoanCommand {
        DecideLoanCommand {
            loan_id,
            level: request.level,
            decision: match request.action {
                ApprovalAction::Approve => ApprovalDecision::Approve,
                ApprovalAction::Reject => ApprovalDecision::Reject,
            },
            notes: request.notes,
            actor: request.actor,
        }
    }

    fn fees_to_dto(fees: &DomainLoanFees) -> LoanFees {
        LoanFees {
            processing_fee: fees.processing,
            insurance_fee: fees.insurance,
            valuation_fee: fees.valuation,
            registration_fee: fees.registration,
            tracking_fee: fees.tracking,
            total: fees.total(),
        }
    }

    fn approval_to_dto(approval: DomainApproval) -> shared::Approval {
        shared::Approval {
            level: approval.level.number(),
            action: match approval.decision {
                ApprovalDecision::Approve => ApprovalAction::Approve,
                ApprovalDecision::Reject => ApprovalAction::Reject,
            },
            notes: approval.notes,
            actor: approval.actor,
            decided_at: approval.decided_at,
        }
    }

    pub fn to_dto(details: LoanDetails) -> Loan {
        let LoanDetails { loan, balance } = details;
        Loan {
            id: loan.id,
            client_id: loan.client_id,
            product_id: loan.product_id,
            amount: loan.terms.principal,
            interest_rate: loan.terms.interest_rate,
            duration: loan.terms.duration,
            duration_unit: ProductMapper::duration_unit_to_dto(loan.terms.duration_unit),
            frequency: Self::frequency_to_dto(loan.terms.frequency),
            start_date: loan.terms.start_date,
            status: Self::status_to_dto(&loan.status),
            current_approval_level: loan.status.approval_level().map(|l| l.number()),
            rejection_reason: loan.status.rejection_reason().map(str::to_string),
            fees: Self::fees_to_dto(&loan.fees),
            penalty_rate: loan.penalty_rate,
            grace_period_days: loan.grace_period_days,
            financial_analysis: loan.financial_analysis.map(|fa| FinancialAnalysis {
                monthly_sales: fa.monthly_sales,
                cost_of_sales: fa.cost_of_sales,
                personal_expenditure: fa.personal_expenditure,
                other_income: fa.other_income,
                net_income: fa.net_income,
            }),
            guarantors: loan
                .guarantors
                .into_iter()
                .map(|g| Guarantor {
                    name: g.name,
                    phone: g.phone,
                    id_number: g.id_number,
                    relationship: g.relationship,
                })
                .collect(),
            referees: loan
                .referees
                .into_iter()
                .map(|r| Referee {
                    name: r.name,
                    phone: r.phone,
                    relationship: r.relationship,
                })
                .collect(),
            approvals: loan.approvals.into_iter().map(Self::approval_to_dto).collect(),
            created_at: loan.created_at,
            balance: LedgerMapper::balance_to_dto(balance),
        }
    }

    pub fn to_dto_list(loans: Vec<LoanDetails>) -> Vec<Loan> {
        loans.into_iter().map(Self::to_dto).collect()
    }
}
