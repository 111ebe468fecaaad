use bson::oid::ObjectId;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Common error: {0}")]
    Eyre(#[from] eyre::Error),
    #[error("Mongo error: {0}")]
    MongoError(#[from] mongodb::error::Error),
    #[error("Student not found: {0}")]
    StudentNotFound(ObjectId),
    #[error("Reward not found: {0}")]
    RewardNotFound(ObjectId),
    #[error("Claim not found: {0}")]
    ClaimNotFound(ObjectId),
    #[error("Group reward not found: {0}")]
    GroupRewardNotFound(ObjectId),
    #[error("Assignment not found: {0}")]
    AssignmentNotFound(ObjectId),
    #[error("Insufficient balance: {shortfall} more points needed")]
    InsufficientBalance { shortfall: u32 },
    #[error("Allocation {amount} is more than the reward costs ({cost})")]
    InvalidAllocation { amount: u32, cost: u32 },
    #[error("Contribution of {points} exceeds the remaining need of {remaining}")]
    OverContribution { points: u32, remaining: u32 },
    #[error("Student {student_id} can not contribute: {reason}")]
    NotEligible {
        student_id: ObjectId,
        reason: EligibilityIssue,
    },
    #[error("Goal not reached: {contributed} of {needed} points")]
    GoalNotReached { contributed: u32, needed: u32 },
    #[error("Balance {balance} can not absorb delta {delta}")]
    InvalidBalance { balance: u32, delta: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityIssue {
    AlreadyCompleted,
    Expired,
    NotAllowed,
}

impl fmt::Display for EligibilityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EligibilityIssue::AlreadyCompleted => write!(f, "the goal is already completed"),
            EligibilityIssue::Expired => write!(f, "the goal has expired"),
            EligibilityIssue::NotAllowed => write!(f, "the student is not on the allow list"),
        }
    }
}
