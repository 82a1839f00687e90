use shared::{DurationUnit, LoanProduct, LoanProductRequest};

use crate::backend::domain::models::{
    DurationUnit as DomainDurationUnit, FeeSchedule, LoanProduct as DomainLoanProduct, ProductTerms,
};

pub struct ProductMapper;

impl ProductMapper {
    pub fn duration_unit_to_domain(unit: DurationUnit) -> DomainDurationUnit {
        match unit {
            DurationUnit::Days => DomainDurationUnit::Days,
            DurationUnit::Weeks => DomainDurationUnit::Weeks,
            DurationUnit::Months => DomainDurationUnit::Months,
        }
    }

    pub fn duration_unit_to_dto(unit: DomainDurationUnit) -> DurationUnit {
        match unit {
            DomainDurationUnit::Days => DurationUnit::Days,
            DomainDurationUnit::Weeks => DurationUnit::Weeks,
            DomainDurationUnit::Months => DurationUnit::Months,
        }
    }

    /// Convert a create/update request into domain product terms
    pub fn to_terms(request: LoanProductRequest) -> ProductTerms {
        ProductTerms {
            name: request.name.trim().to_string(),
            description: request.description.filter(|d| !d.trim().is_empty()),
            interest_rate: request.interest_rate,
            min_amount: request.min_amount,
            max_amount: request.max_amount,
            min_period: request.min_period,
            max_period: request.max_period,
            duration_unit: Self::duration_unit_to_domain(request.duration_unit),
            fees: FeeSchedule {
                registration: request.registration_fee,
                processing_fixed: request.processing_fee_fixed,
                processing_percent: request.processing_fee_percent,
                insurance: request.insurance_fee,
                tracking: request.tracking_fee,
                valuation: request.valuation_fee,
            },
            penalty_rate: request.penalty_rate,
            grace_period_days: request.grace_period_days,
        }
    }

    pub fn to_dto(product: DomainLoanProduct) -> LoanProduct {
        let terms = product.terms;
        LoanProduct {
            id: product.id,
            name: terms.name,
            description: terms.description,
            interest_rate: terms.interest_rate,
            min_amount: terms.min_amount,
            max_amount: terms.max_amount,
            min_period: terms.min_period,
            max_period: terms.max_period,
            duration_unit: Self::duration_unit_to_dto(terms.duration_unit),
            registration_fee: terms.fees.registration,
            processing_fee_fixed: terms.fees.processing_fixed,
            processing_fee_percent: terms.fees.processing_percent,
            insurance_fee: terms.fees.insurance,
            tracking_fee: terms.fees.tracking,
            valuation_fee: terms.fees.valuation,
            penalty_rate: terms.penalty_rate,
            grace_period_days: terms.grace_period_days,
        }
    }
}
