use std::collections::HashMap;

use bson::oid::ObjectId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::errors::LedgerError;
use crate::streak::StreakSnapshot;

/// The wallet side of the ledger. `wallet_balance` holds unencumbered
/// points; `reward_allocations` holds points escrowed toward specific
/// rewards. Every mutation preserves
/// `wallet_balance + sum(reward_allocations)`, escrow only reserves
/// value, it never destroys it.
#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub wallet_balance: u32,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default)]
    pub last_completion_date: Option<NaiveDate>,
    // bson document keys must be strings, so the map goes to disk as
    // an array of pairs.
    #[serde_as(as = "Vec<(_, _)>")]
    #[serde(default)]
    pub reward_allocations: HashMap<ObjectId, u32>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Student {
    pub fn new(name: String) -> Student {
        Student {
            id: ObjectId::new(),
            name,
            wallet_balance: 0,
            current_streak: 0,
            longest_streak: 0,
            last_completion_date: None,
            reward_allocations: HashMap::new(),
            created_at: Utc::now(),
            version: 0,
        }
    }

    pub fn allocation(&self, reward_id: ObjectId) -> u32 {
        self.reward_allocations
            .get(&reward_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn allocated_total(&self) -> u32 {
        self.reward_allocations.values().sum()
    }

    /// Wallet plus escrow, the student's total unspent points.
    pub fn total_points(&self) -> u32 {
        self.wallet_balance + self.allocated_total()
    }

    pub fn credit(&mut self, points: u32) {
        self.wallet_balance += points;
    }

    pub fn debit(&mut self, points: u32) -> Result<(), LedgerError> {
        if self.wallet_balance < points {
            return Err(LedgerError::InsufficientBalance {
                shortfall: points - self.wallet_balance,
            });
        }
        self.wallet_balance -= points;
        Ok(())
    }

    /// Debit that never fails: takes what the wallet has and returns
    /// the uncovered remainder. Used by un-completion, which must
    /// always go through even if the points were already spent.
    pub fn debit_clamped(&mut self, points: u32) -> u32 {
        let shortfall = points.saturating_sub(self.wallet_balance);
        self.wallet_balance -= points - shortfall;
        shortfall
    }

    /// Moves points between the wallet and the escrow entry for one
    /// reward so that `new_amount` ends up allocated. `reward_cost`
    /// caps the allocation.
    pub fn set_allocation(
        &mut self,
        reward_id: ObjectId,
        new_amount: u32,
        reward_cost: u32,
    ) -> Result<(), LedgerError> {
        if new_amount > reward_cost {
            return Err(LedgerError::InvalidAllocation {
                amount: new_amount,
                cost: reward_cost,
            });
        }

        let old = self.allocation(reward_id);
        if new_amount > old {
            self.debit(new_amount - old)?;
        } else {
            self.wallet_balance += old - new_amount;
        }

        if new_amount == 0 {
            self.reward_allocations.remove(&reward_id);
        } else {
            self.reward_allocations.insert(reward_id, new_amount);
        }
        Ok(())
    }

    pub fn apply_completion(&mut self, streak: u32, completion_date: NaiveDate, points: u32) {
        self.credit(points);
        self.current_streak = streak;
        self.longest_streak = self.longest_streak.max(streak);
        self.last_completion_date = Some(completion_date);
    }

    /// Reverses a completion: takes back what was credited (clamped at
    /// zero) and restores the snapshotted streak state. The longest
    /// streak is a high-water mark and stays where it is. Returns the
    /// part of `points` the wallet could not cover.
    pub fn revert_completion(&mut self, snapshot: &StreakSnapshot, points: u32) -> u32 {
        let shortfall = self.debit_clamped(points);
        self.current_streak = snapshot.streak;
        self.last_completion_date = snapshot.last_completion_date;
        shortfall
    }

    pub fn streak_snapshot(&self) -> StreakSnapshot {
        StreakSnapshot {
            streak: self.current_streak,
            last_completion_date: self.last_completion_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student_with_balance(balance: u32) -> Student {
        let mut student = Student::new("alice".to_owned());
        student.wallet_balance = balance;
        student
    }

    #[test]
    fn allocation_conserves_total() {
        let mut student = student_with_balance(100);
        let reward = ObjectId::new();

        student.set_allocation(reward, 40, 200).unwrap();
        assert_eq!(student.wallet_balance, 60);
        assert_eq!(student.allocation(reward), 40);
        assert_eq!(student.total_points(), 100);

        student.set_allocation(reward, 10, 200).unwrap();
        assert_eq!(student.wallet_balance, 90);
        assert_eq!(student.allocation(reward), 10);
        assert_eq!(student.total_points(), 100);

        student.set_allocation(reward, 0, 200).unwrap();
        assert_eq!(student.wallet_balance, 100);
        assert!(student.reward_allocations.is_empty());
        assert_eq!(student.total_points(), 100);
    }

    #[test]
    fn allocation_reports_exact_shortfall() {
        let mut student = student_with_balance(30);
        let err = student
            .set_allocation(ObjectId::new(), 50, 200)
            .unwrap_err();
        match err {
            LedgerError::InsufficientBalance { shortfall } => assert_eq!(shortfall, 20),
            other => panic!("unexpected error: {other}"),
        }
        // Nothing moved.
        assert_eq!(student.wallet_balance, 30);
        assert!(student.reward_allocations.is_empty());
    }

    #[test]
    fn allocation_can_not_exceed_reward_cost() {
        let mut student = student_with_balance(500);
        let err = student
            .set_allocation(ObjectId::new(), 300, 200)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidAllocation {
                amount: 300,
                cost: 200
            }
        ));
        assert_eq!(student.wallet_balance, 500);
    }

    #[test]
    fn raising_an_existing_allocation_moves_only_the_delta() {
        let mut student = student_with_balance(100);
        let reward = ObjectId::new();
        student.set_allocation(reward, 40, 200).unwrap();
        student.set_allocation(reward, 70, 200).unwrap();
        assert_eq!(student.wallet_balance, 30);
        assert_eq!(student.allocation(reward), 70);
        assert_eq!(student.total_points(), 100);
    }

    #[test]
    fn debit_never_goes_negative() {
        let mut student = student_with_balance(10);
        let err = student.debit(11).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance { shortfall: 1 }
        ));
        assert_eq!(student.wallet_balance, 10);
    }

    #[test]
    fn clamped_debit_reports_shortfall() {
        let mut student = student_with_balance(4);
        let shortfall = student.debit_clamped(10);
        assert_eq!(shortfall, 6);
        assert_eq!(student.wallet_balance, 0);

        let mut covered = student_with_balance(10);
        assert_eq!(covered.debit_clamped(10), 0);
        assert_eq!(covered.wallet_balance, 0);
    }

    #[test]
    fn completion_round_trip_restores_state() {
        let mut student = student_with_balance(50);
        student.current_streak = 2;
        student.longest_streak = 5;
        student.last_completion_date = NaiveDate::from_ymd_opt(2024, 1, 3);

        let snapshot = student.streak_snapshot();
        let date = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        student.apply_completion(3, date, 10);
        assert_eq!(student.wallet_balance, 60);
        assert_eq!(student.current_streak, 3);
        assert_eq!(student.longest_streak, 5);
        assert_eq!(student.last_completion_date, Some(date));

        let shortfall = student.revert_completion(&snapshot, 10);
        assert_eq!(shortfall, 0);
        assert_eq!(student.wallet_balance, 50);
        assert_eq!(student.current_streak, 2);
        assert_eq!(student.longest_streak, 5);
        assert_eq!(
            student.last_completion_date,
            NaiveDate::from_ymd_opt(2024, 1, 3)
        );
    }

    #[test]
    fn longest_streak_ratchets_up_and_survives_revert() {
        let mut student = student_with_balance(0);
        let snapshot = student.streak_snapshot();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        student.apply_completion(1, date, 5);
        assert_eq!(student.longest_streak, 1);

        student.revert_completion(&snapshot, 5);
        assert_eq!(student.current_streak, 0);
        assert_eq!(student.longest_streak, 1);
    }
}
