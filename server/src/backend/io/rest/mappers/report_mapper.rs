use shared::{ParBucket, ParBucketSummary, ParLoanRow, ParReport, ProfitLossReport};

use crate::backend::domain::portfolio_risk::{ParBucket as DomainParBucket, PortfolioRisk};
use crate::backend::domain::report_service::ProfitLoss;

pub struct ReportMapper;

impl ReportMapper {
    pub fn bucket_to_dto(bucket: DomainParBucket) -> ParBucket {
        match bucket {
            DomainParBucket::Current => ParBucket::Current,
            DomainParBucket::Par30 => ParBucket::Par30,
            DomainParBucket::Par60 => ParBucket::Par60,
            DomainParBucket::Par90 => ParBucket::Par90,
            DomainParBucket::Par90Plus => ParBucket::Par90Plus,
        }
    }

    pub fn to_par_report(report: PortfolioRisk) -> ParReport {
        ParReport {
            as_of: report.as_of,
            total_outstanding: report.total_outstanding,
            buckets: report
                .buckets
                .into_iter()
                .map(|b| ParBucketSummary {
                    bucket: Self::bucket_to_dto(b.bucket),
                    loan_count: b.loan_count,
                    outstanding: b.outstanding,
                    ratio: b.ratio,
                })
                .collect(),
            loans: report
                .loans
                .into_iter()
                .map(|l| ParLoanRow {
                    loan_id: l.loan_id,
                    client_id: l.client_id,
                    days_overdue: l.days_overdue,
                    bucket: Self::bucket_to_dto(l.bucket),
                    outstanding: l.outstanding,
                })
                .collect(),
        }
    }

    pub fn to_profit_loss(report: ProfitLoss) -> ProfitLossReport {
        ProfitLossReport {
            start_date: report.start_date,
            end_date: report.end_date,
            fee_income: report.fee_income,
            interest_income: report.interest_income,
            total_income: report.total_income,
        }
    }
}
