//! Loan lifecycle state machine.
//!
//! ```text
//! pending(officer) --approve--> pending(manager) --approve--> approved --disburse--> active --settled--> completed
//!        \                              \
//!         +----------reject-------------+--> rejected
//! ```
//!
//! The approval level only exists inside `Pending`, so combinations such as
//! "active at level 1" cannot be represented. `Rejected` and `Completed` are
//! terminal. Every function here is pure; persistence happens in the services.

use std::fmt;
use std::str::FromStr;

use super::errors::LoanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApprovalLevel {
    /// Level 1, loan officer review
    Officer,
    /// Level 2, manager sign-off
    Manager,
}

impl ApprovalLevel {
    pub fn number(&self) -> u8 {
        match self {
            ApprovalLevel::Officer => 1,
            ApprovalLevel::Manager => 2,
        }
    }

    pub fn from_number(level: u8) -> Option<Self> {
        match level {
            1 => Some(ApprovalLevel::Officer),
            2 => Some(ApprovalLevel::Manager),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

impl ApprovalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalDecision::Approve => "approve",
            ApprovalDecision::Reject => "reject",
        }
    }
}

impl FromStr for ApprovalDecision {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ApprovalDecision::Approve),
            "reject" => Ok(ApprovalDecision::Reject),
            other => Err(anyhow::anyhow!("Unknown approval decision: {}", other)),
        }
    }
}

/// Discriminant of [`LoanStatus`], used for filtering and persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Pending,
    Approved,
    Active,
    Completed,
    Rejected,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Pending => "pending",
            StatusKind::Approved => "approved",
            StatusKind::Active => "active",
            StatusKind::Completed => "completed",
            StatusKind::Rejected => "rejected",
        }
    }
}

impl FromStr for StatusKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StatusKind::Pending),
            "approved" => Ok(StatusKind::Approved),
            "active" => Ok(StatusKind::Active),
            "completed" => Ok(StatusKind::Completed),
            "rejected" => Ok(StatusKind::Rejected),
            other => Err(anyhow::anyhow!("Unknown loan status: {}", other)),
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanStatus {
    Pending { level: ApprovalLevel },
    Approved,
    Active,
    Completed,
    Rejected { reason: String },
}

impl LoanStatus {
    /// Status of a freshly submitted loan
    pub fn submitted() -> Self {
        LoanStatus::Pending { level: ApprovalLevel::Officer }
    }

    pub fn kind(&self) -> StatusKind {
        match self {
            LoanStatus::Pending { .. } => StatusKind::Pending,
            LoanStatus::Approved => StatusKind::Approved,
            LoanStatus::Active => StatusKind::Active,
            LoanStatus::Completed => StatusKind::Completed,
            LoanStatus::Rejected { .. } => StatusKind::Rejected,
        }
    }

    pub fn approval_level(&self) -> Option<ApprovalLevel> {
        match self {
            LoanStatus::Pending { level } => Some(*level),
            _ => None,
        }
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            LoanStatus::Rejected { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Completed | LoanStatus::Rejected { .. })
    }

    /// Rebuild a status from its stored columns
    pub fn from_parts(
        kind: StatusKind,
        level: Option<u8>,
        reason: Option<String>,
    ) -> anyhow::Result<Self> {
        let status = match kind {
            StatusKind::Pending => {
                let level = level
                    .and_then(ApprovalLevel::from_number)
                    .ok_or_else(|| anyhow::anyhow!("Pending loan without a valid approval level"))?;
                LoanStatus::Pending { level }
            }
            StatusKind::Approved => LoanStatus::Approved,
            StatusKind::Active => LoanStatus::Active,
            StatusKind::Completed => LoanStatus::Completed,
            StatusKind::Rejected => LoanStatus::Rejected {
                reason: reason.unwrap_or_default(),
            },
        };
        Ok(status)
    }

    /// Apply an approval decision taken at `level`.
    ///
    /// Rejection needs a non-empty reason. The level must equal the loan's
    /// current approval level, which stops a manager from signing before the
    /// officer and stops a stale level from deciding twice.
    pub fn decide(
        &self,
        level: ApprovalLevel,
        decision: ApprovalDecision,
        notes: &str,
    ) -> Result<LoanStatus, LoanError> {
        if decision == ApprovalDecision::Reject && notes.trim().is_empty() {
            return Err(LoanError::validation("A rejection reason is required"));
        }

        let current = match self {
            LoanStatus::Pending { level } => *level,
            other => {
                return Err(LoanError::InvalidState(format!(
                    "Only pending loans can be approved or rejected (loan is {})",
                    other.kind()
                )))
            }
        };

        if level != current {
            return Err(LoanError::InvalidState(format!(
                "Loan is awaiting level {} approval, not level {}",
                current.number(),
                level.number()
            )));
        }

        let next = match (decision, current) {
            (ApprovalDecision::Reject, _) => LoanStatus::Rejected {
                reason: notes.trim().to_string(),
            },
            (ApprovalDecision::Approve, ApprovalLevel::Officer) => LoanStatus::Pending {
                level: ApprovalLevel::Manager,
            },
            (ApprovalDecision::Approve, ApprovalLevel::Manager) => LoanStatus::Approved,
        };
        Ok(next)
    }

    /// `approved -> active`. A loan already past approval has been disbursed.
    pub fn activate(&self, loan_id: i64) -> Result<LoanStatus, LoanError> {
        match self {
            LoanStatus::Approved => Ok(LoanStatus::Active),
            LoanStatus::Active | LoanStatus::Completed => {
                Err(LoanError::AlreadyDisbursed { loan_id })
            }
            other => Err(LoanError::InvalidState(format!(
                "Loan must be approved before disbursement (loan is {})",
                other.kind()
            ))),
        }
    }

    pub fn ensure_accepts_repayment(&self) -> Result<(), LoanError> {
        match self {
            LoanStatus::Active => Ok(()),
            other => Err(LoanError::InvalidState(format!(
                "Repayments are only accepted on active loans (loan is {})",
                other.kind()
            ))),
        }
    }

    /// `active -> completed`, driven by the payment ledger reaching zero
    pub fn settle(&self) -> Result<LoanStatus, LoanError> {
        match self {
            LoanStatus::Active => Ok(LoanStatus::Completed),
            other => Err(LoanError::InvalidState(format!(
                "Only active loans can be completed (loan is {})",
                other.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_level_approval_path() {
        let status = LoanStatus::submitted();
        assert_eq!(status.approval_level(), Some(ApprovalLevel::Officer));

        let status = status
            .decide(ApprovalLevel::Officer, ApprovalDecision::Approve, "docs ok")
            .unwrap();
        assert_eq!(status, LoanStatus::Pending { level: ApprovalLevel::Manager });

        let status = status
            .decide(ApprovalLevel::Manager, ApprovalDecision::Approve, "")
            .unwrap();
        assert_eq!(status, LoanStatus::Approved);

        let status = status.activate(1).unwrap();
        assert_eq!(status, LoanStatus::Active);
        assert_eq!(status.settle().unwrap(), LoanStatus::Completed);
    }

    #[test]
    fn test_manager_cannot_skip_officer() {
        let status = LoanStatus::submitted();
        let err = status
            .decide(ApprovalLevel::Manager, ApprovalDecision::Approve, "")
            .unwrap_err();
        assert!(matches!(err, LoanError::InvalidState(_)));
    }

    #[test]
    fn test_stale_level_cannot_decide_again() {
        let status = LoanStatus::Pending { level: ApprovalLevel::Manager };
        let err = status
            .decide(ApprovalLevel::Officer, ApprovalDecision::Approve, "")
            .unwrap_err();
        assert!(matches!(err, LoanError::InvalidState(_)));
    }

    #[test]
    fn test_reject_requires_reason() {
        let status = LoanStatus::submitted();
        let err = status
            .decide(ApprovalLevel::Officer, ApprovalDecision::Reject, "   ")
            .unwrap_err();
        assert!(matches!(err, LoanError::Validation(_)));

        let rejected = status
            .decide(ApprovalLevel::Officer, ApprovalDecision::Reject, " no collateral ")
            .unwrap();
        assert_eq!(rejected.rejection_reason(), Some("no collateral"));
        assert!(rejected.is_terminal());
    }

    #[test]
    fn test_terminal_states_refuse_everything() {
        let rejected = LoanStatus::Rejected { reason: "x".to_string() };
        assert!(rejected
            .decide(ApprovalLevel::Officer, ApprovalDecision::Approve, "")
            .is_err());
        assert!(matches!(rejected.activate(1), Err(LoanError::InvalidState(_))));
        assert!(rejected.ensure_accepts_repayment().is_err());

        let completed = LoanStatus::Completed;
        assert!(matches!(
            completed.activate(1),
            Err(LoanError::AlreadyDisbursed { loan_id: 1 })
        ));
        assert!(completed.settle().is_err());
        assert!(completed.ensure_accepts_repayment().is_err());
    }

    #[test]
    fn test_activate_twice_is_already_disbursed() {
        assert!(matches!(
            LoanStatus::Active.activate(7),
            Err(LoanError::AlreadyDisbursed { loan_id: 7 })
        ));
        assert!(matches!(
            LoanStatus::submitted().activate(7),
            Err(LoanError::InvalidState(_))
        ));
    }

    #[test]
    fn test_from_parts() {
        let status = LoanStatus::from_parts(StatusKind::Pending, Some(2), None).unwrap();
        assert_eq!(status, LoanStatus::Pending { level: ApprovalLevel::Manager });
        assert!(LoanStatus::from_parts(StatusKind::Pending, None, None).is_err());
        assert!(LoanStatus::from_parts(StatusKind::Pending, Some(3), None).is_err());

        let status =
            LoanStatus::from_parts(StatusKind::Rejected, None, Some("bad".to_string())).unwrap();
        assert_eq!(status.rejection_reason(), Some("bad"));
    }
}
