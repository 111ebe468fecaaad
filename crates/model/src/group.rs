use std::collections::HashMap;

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::errors::{EligibilityIssue, LedgerError};

/// A shared goal funded by several students. The contribution map is
/// the single source of truth: the contributed total is always the sum
/// of its values and is never stored on its own.
#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GroupReward {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub points_needed: u32,
    #[serde_as(as = "Vec<(_, _)>")]
    #[serde(default)]
    pub student_contributions: HashMap<ObjectId, u32>,
    /// Empty means every student may contribute.
    #[serde(default)]
    pub allowed_student_ids: Vec<ObjectId>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl GroupReward {
    pub fn new(
        name: String,
        description: Option<String>,
        points_needed: u32,
        allowed_student_ids: Vec<ObjectId>,
        expires_at: Option<DateTime<Utc>>,
    ) -> GroupReward {
        GroupReward {
            id: ObjectId::new(),
            name,
            description,
            points_needed,
            student_contributions: HashMap::new(),
            allowed_student_ids,
            expires_at,
            is_completed: false,
            created_at: Utc::now(),
            version: 0,
        }
    }

    pub fn points_contributed(&self) -> u32 {
        self.student_contributions.values().sum()
    }

    pub fn contributor_count(&self) -> usize {
        self.student_contributions.len()
    }

    pub fn remaining(&self) -> u32 {
        self.points_needed.saturating_sub(self.points_contributed())
    }

    pub fn contribution_of(&self, student_id: ObjectId) -> u32 {
        self.student_contributions
            .get(&student_id)
            .copied()
            .unwrap_or(0)
    }

    /// Expiry is lazy: nothing flips a flag when the deadline passes, a
    /// goal is expired whenever it is read after `expires_at` without
    /// having been completed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed && self.expires_at.map_or(false, |at| now > at)
    }

    pub fn is_open_to(&self, student_id: ObjectId) -> bool {
        self.allowed_student_ids.is_empty() || self.allowed_student_ids.contains(&student_id)
    }

    pub fn progress_percent(&self) -> u32 {
        if self.points_needed == 0 {
            return 100;
        }
        (self.points_contributed() * 100) / self.points_needed
    }

    /// Checks a contribution against the current state without applying
    /// it. The wallet check happens outside, against the student
    /// record, after this passes.
    pub fn validate_contribution(
        &self,
        student_id: ObjectId,
        points: u32,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let issue = if self.is_completed {
            Some(EligibilityIssue::AlreadyCompleted)
        } else if self.is_expired(now) {
            Some(EligibilityIssue::Expired)
        } else if !self.is_open_to(student_id) {
            Some(EligibilityIssue::NotAllowed)
        } else {
            None
        };
        if let Some(reason) = issue {
            return Err(LedgerError::NotEligible { student_id, reason });
        }

        let remaining = self.remaining();
        if points > remaining {
            return Err(LedgerError::OverContribution { points, remaining });
        }
        Ok(())
    }

    pub fn record_contribution(&mut self, student_id: ObjectId, points: u32) {
        *self.student_contributions.entry(student_id).or_insert(0) += points;
    }

    /// One-way completion flip; repeating it is a no-op.
    pub fn redeem(&mut self) -> Result<(), LedgerError> {
        if self.is_completed {
            return Ok(());
        }
        let contributed = self.points_contributed();
        if contributed < self.points_needed {
            return Err(LedgerError::GoalNotReached {
                contributed,
                needed: self.points_needed,
            });
        }
        self.is_completed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn goal(needed: u32) -> GroupReward {
        GroupReward::new("trampoline".to_owned(), None, needed, vec![], None)
    }

    #[test]
    fn contributed_total_is_the_sum_of_the_map() {
        let mut goal = goal(100);
        let a = ObjectId::new();
        let b = ObjectId::new();
        goal.record_contribution(a, 40);
        goal.record_contribution(b, 30);
        goal.record_contribution(a, 10);
        assert_eq!(goal.points_contributed(), 80);
        assert_eq!(goal.contributor_count(), 2);
        assert_eq!(goal.contribution_of(a), 50);
        assert_eq!(goal.remaining(), 20);
        assert_eq!(goal.progress_percent(), 80);
    }

    #[test]
    fn contribution_can_not_push_past_the_goal() {
        let mut goal = goal(100);
        goal.record_contribution(ObjectId::new(), 90);
        let err = goal
            .validate_contribution(ObjectId::new(), 15, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::OverContribution {
                points: 15,
                remaining: 10
            }
        ));
        goal.validate_contribution(ObjectId::new(), 10, Utc::now())
            .unwrap();
    }

    #[test]
    fn completed_goal_rejects_contributions() {
        let mut goal = goal(50);
        goal.record_contribution(ObjectId::new(), 50);
        goal.redeem().unwrap();
        let student = ObjectId::new();
        let err = goal
            .validate_contribution(student, 1, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotEligible {
                reason: EligibilityIssue::AlreadyCompleted,
                ..
            }
        ));
    }

    #[test]
    fn expiry_is_evaluated_lazily() {
        let deadline = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut goal = goal(50);
        goal.expires_at = Some(deadline);

        let before = deadline - chrono::Duration::hours(1);
        let after = deadline + chrono::Duration::hours(1);
        assert!(!goal.is_expired(before));
        assert!(goal.is_expired(after));

        let err = goal
            .validate_contribution(ObjectId::new(), 10, after)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotEligible {
                reason: EligibilityIssue::Expired,
                ..
            }
        ));
    }

    #[test]
    fn completed_goal_never_expires() {
        let deadline = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut goal = goal(10);
        goal.expires_at = Some(deadline);
        goal.record_contribution(ObjectId::new(), 10);
        goal.redeem().unwrap();
        assert!(!goal.is_expired(deadline + chrono::Duration::days(1)));
    }

    #[test]
    fn allow_list_restricts_contributors() {
        let allowed = ObjectId::new();
        let mut goal = goal(100);
        goal.allowed_student_ids = vec![allowed];

        goal.validate_contribution(allowed, 10, Utc::now()).unwrap();
        let err = goal
            .validate_contribution(ObjectId::new(), 10, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotEligible {
                reason: EligibilityIssue::NotAllowed,
                ..
            }
        ));
    }

    #[test]
    fn redeem_requires_full_funding() {
        let mut goal = goal(100);
        goal.record_contribution(ObjectId::new(), 99);
        let err = goal.redeem().unwrap_err();
        assert!(matches!(
            err,
            LedgerError::GoalNotReached {
                contributed: 99,
                needed: 100
            }
        ));

        goal.record_contribution(ObjectId::new(), 1);
        goal.redeem().unwrap();
        assert!(goal.is_completed);
        // Idempotent.
        goal.redeem().unwrap();
    }
}
