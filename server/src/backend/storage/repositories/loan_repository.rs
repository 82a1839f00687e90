use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::backend::domain::commands::loans::LoanFilter;
use crate::backend::domain::models::{Approval, Loan, LoanFees, LoanTerms, NewLoan};
use crate::backend::domain::state_machine::{ApprovalLevel, LoanStatus, StatusKind};
use crate::backend::storage::columns;
use crate::backend::storage::connection::DbConnection;
use crate::backend::storage::traits::LoanStorage;

/// Repository for loans and their approval trail
#[derive(Clone)]
pub struct LoanRepository {
    db: DbConnection,
}

const LOAN_COLUMNS: &str = "id, client_id, product_id, principal, interest_rate, duration, \
     duration_unit, frequency, start_date, status, approval_level, rejection_reason, \
     processing_fee, insurance_fee, valuation_fee, registration_fee, tracking_fee, \
     penalty_rate, grace_period_days, financial_analysis, guarantors, referees, created_at";

impl LoanRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn loan_from_row(row: &SqliteRow, approvals: Vec<Approval>) -> Result<Loan> {
        let level: Option<i64> = row.try_get("approval_level")?;
        let level = level.map(u8::try_from).transpose()?;
        let status = LoanStatus::from_parts(
            columns::parsed::<StatusKind>(row, "status")?,
            level,
            row.try_get("rejection_reason")?,
        )?;

        Ok(Loan {
            id: row.try_get("id")?,
            client_id: row.try_get("client_id")?,
            product_id: row.try_get("product_id")?,
            terms: LoanTerms {
                principal: columns::decimal(row, "principal")?,
                interest_rate: columns::decimal(row, "interest_rate")?,
                duration: columns::count(row, "duration")?,
                duration_unit: columns::parsed(row, "duration_unit")?,
                frequency: columns::parsed(row, "frequency")?,
                start_date: row.try_get::<NaiveDate, _>("start_date")?,
            },
            status,
            fees: LoanFees {
                processing: columns::decimal(row, "processing_fee")?,
                insurance: columns::decimal(row, "insurance_fee")?,
                valuation: columns::decimal(row, "valuation_fee")?,
                registration: columns::decimal(row, "registration_fee")?,
                tracking: columns::decimal(row, "tracking_fee")?,
            },
            penalty_rate: columns::decimal(row, "penalty_rate")?,
            grace_period_days: columns::count(row, "grace_period_days")?,
            financial_analysis: columns::json(row, "financial_analysis")?,
            guarantors: columns::json(row, "guarantors")?,
            referees: columns::json(row, "referees")?,
            approvals,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    async fn approvals_for(&self, loan_id: i64) -> Result<Vec<Approval>> {
        let rows = sqlx::query(
            r#"
            SELECT level, decision, notes, actor, decided_at
            FROM loan_approvals
            WHERE loan_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(loan_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter()
            .map(|row| {
                let level: i64 = row.try_get("level")?;
                let level = u8::try_from(level)
                    .ok()
                    .and_then(ApprovalLevel::from_number)
                    .with_context(|| format!("Invalid approval level {} on loan {}", level, loan_id))?;
                Ok(Approval {
                    level,
                    decision: columns::parsed(row, "decision")?,
                    notes: row.try_get("notes")?,
                    actor: row.try_get("actor")?,
                    decided_at: row.try_get("decided_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl LoanStorage for LoanRepository {
    async fn insert_loan(&self, loan: &NewLoan) -> Result<Loan> {
        let status = LoanStatus::submitted();
        let result = sqlx::query(
            r#"
            INSERT INTO loans (
                client_id, product_id, principal, interest_rate, duration, duration_unit,
                frequency, start_date, status, approval_level, rejection_reason,
                processing_fee, insurance_fee, valuation_fee, registration_fee, tracking_fee,
                penalty_rate, grace_period_days, financial_analysis, guarantors, referees,
                created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(loan.client_id)
        .bind(loan.product_id)
        .bind(loan.terms.principal.to_string())
        .bind(loan.terms.interest_rate.to_string())
        .bind(i64::from(loan.terms.duration))
        .bind(loan.terms.duration_unit.as_str())
        .bind(loan.terms.frequency.as_str())
        .bind(loan.terms.start_date)
        .bind(status.kind().as_str())
        .bind(status.approval_level().map(|l| i64::from(l.number())))
        .bind(loan.fees.processing.to_string())
        .bind(loan.fees.insurance.to_string())
        .bind(loan.fees.valuation.to_string())
        .bind(loan.fees.registration.to_string())
        .bind(loan.fees.tracking.to_string())
        .bind(loan.penalty_rate.to_string())
        .bind(i64::from(loan.grace_period_days))
        .bind(serde_json::to_string(&loan.financial_analysis)?)
        .bind(serde_json::to_string(&loan.guarantors)?)
        .bind(serde_json::to_string(&loan.referees)?)
        .bind(loan.created_at)
        .execute(self.db.pool())
        .await?;

        Ok(Loan {
            id: result.last_insert_rowid(),
            client_id: loan.client_id,
            product_id: loan.product_id,
            terms: loan.terms.clone(),
            status,
            fees: loan.fees.clone(),
            penalty_rate: loan.penalty_rate,
            grace_period_days: loan.grace_period_days,
            financial_analysis: loan.financial_analysis.clone(),
            guarantors: loan.guarantors.clone(),
            referees: loan.referees.clone(),
            approvals: Vec::new(),
            created_at: loan.created_at,
        })
    }

    async fn get_loan(&self, loan_id: i64) -> Result<Option<Loan>> {
        let query = format!("SELECT {} FROM loans WHERE id = ?", LOAN_COLUMNS);
        let row = sqlx::query(&query)
            .bind(loan_id)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(row) => {
                let approvals = self.approvals_for(loan_id).await?;
                Ok(Some(Self::loan_from_row(&row, approvals)?))
            }
            None => Ok(None),
        }
    }

    async fn list_loans(&self, filter: &LoanFilter) -> Result<Vec<Loan>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM loans WHERE 1 = 1", LOAN_COLUMNS));
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(client_id) = filter.client_id {
            builder.push(" AND client_id = ").push_bind(client_id);
        }
        builder.push(" ORDER BY id DESC");

        let rows = builder.build().fetch_all(self.db.pool()).await?;

        let mut loans = Vec::with_capacity(rows.len());
        for row in &rows {
            let loan_id: i64 = row.try_get("id")?;
            let approvals = self.approvals_for(loan_id).await?;
            loans.push(Self::loan_from_row(row, approvals)?);
        }
        Ok(loans)
    }

    async fn record_decision(
        &self,
        loan_id: i64,
        expected: &LoanStatus,
        next: &LoanStatus,
        approval: &Approval,
    ) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE loans
            SET status = ?, approval_level = ?, rejection_reason = ?
            WHERE id = ? AND status = ? AND approval_level IS ?
            "#,
        )
        .bind(next.kind().as_str())
        .bind(next.approval_level().map(|l| i64::from(l.number())))
        .bind(next.rejection_reason())
        .bind(loan_id)
        .bind(expected.kind().as_str())
        .bind(expected.approval_level().map(|l| i64::from(l.number())))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO loan_approvals (loan_id, level, decision, notes, actor, decided_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(loan_id)
        .bind(i64::from(approval.level.number()))
        .bind(approval.decision.as_str())
        .bind(&approval.notes)
        .bind(&approval.actor)
        .bind(approval.decided_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::backend::domain::models::loan::fixtures::monthly_terms;
    use crate::backend::domain::models::product::fixtures::plain_terms;
    use crate::backend::storage::repositories::ProductRepository;
    use crate::backend::storage::traits::ProductStorage;
    use rust_decimal::Decimal;

    /// Insert a product and a pending 10,000 / 10% / 5 month loan against it
    pub async fn seed_pending_loan(db: &DbConnection) -> Loan {
        let product = ProductRepository::new(db.clone())
            .insert_product(&plain_terms())
            .await
            .expect("Failed to insert product");
        LoanRepository::new(db.clone())
            .insert_loan(&NewLoan {
                client_id: 10,
                product_id: product.id,
                terms: monthly_terms(10_000, 5),
                fees: LoanFees::default(),
                penalty_rate: Decimal::from(5),
                grace_period_days: 3,
                financial_analysis: None,
                guarantors: Vec::new(),
                referees: Vec::new(),
                created_at: Utc::now(),
            })
            .await
            .expect("Failed to insert loan")
    }

    /// Force a loan into `status` directly, for tests of later lifecycle stages
    pub async fn force_status(db: &DbConnection, loan_id: i64, status: StatusKind) {
        sqlx::query(
            "UPDATE loans SET status = ?, approval_level = NULL, rejection_reason = NULL WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(loan_id)
        .execute(db.pool())
        .await
        .expect("Failed to force loan status");
    }
}
