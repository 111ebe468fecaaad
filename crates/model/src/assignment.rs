use bson::oid::ObjectId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::streak::StreakSnapshot;

/// Grade below which a gradable assignment earns nothing.
pub const PASSING_GRADE: u8 = 90;

/// A piece of schoolwork. Scheduling owns most fields; the engine owns
/// `points_earned`, `reward_points_applied` and `streak_undo`, which
/// exist so that un-completing reverses exactly what was credited,
/// independent of later edits to `points_base` or the streak.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Assignment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub student_id: ObjectId,
    pub subject_id: ObjectId,
    pub name: String,
    pub due_date: NaiveDate,
    pub points_base: u32,
    pub gradable: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub grade: Option<u8>,
    #[serde(default)]
    pub completion_date: Option<NaiveDate>,
    #[serde(default)]
    pub points_earned: u32,
    /// Kept equal to `points_earned` for audit display.
    #[serde(default)]
    pub reward_points_applied: u32,
    #[serde(default)]
    pub streak_undo: Option<StreakSnapshot>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Assignment {
    pub fn new(
        student_id: ObjectId,
        subject_id: ObjectId,
        name: String,
        due_date: NaiveDate,
        points_base: u32,
        gradable: bool,
    ) -> Assignment {
        Assignment {
            id: ObjectId::new(),
            student_id,
            subject_id,
            name,
            due_date,
            points_base,
            gradable,
            completed: false,
            grade: None,
            completion_date: None,
            points_earned: 0,
            reward_points_applied: 0,
            streak_undo: None,
            created_at: Utc::now(),
            version: 0,
        }
    }

    /// Points this assignment earns for a given grade and streak bonus.
    /// Gradable work pays out only from `PASSING_GRADE` up; ungraded
    /// gradable work pays nothing.
    pub fn earned_points(&self, grade: Option<u8>, bonus_percent: u32) -> u32 {
        if self.gradable && grade.map_or(true, |g| g < PASSING_GRADE) {
            return 0;
        }
        apply_bonus(self.points_base, bonus_percent)
    }

    pub fn mark_completed(
        &mut self,
        grade: Option<u8>,
        completion_date: NaiveDate,
        points_earned: u32,
        undo: StreakSnapshot,
    ) {
        self.completed = true;
        self.grade = grade;
        self.completion_date = Some(completion_date);
        self.points_earned = points_earned;
        self.reward_points_applied = points_earned;
        self.streak_undo = Some(undo);
    }

    pub fn mark_incomplete(&mut self) {
        self.completed = false;
        self.grade = None;
        self.completion_date = None;
        self.points_earned = 0;
        self.reward_points_applied = 0;
        self.streak_undo = None;
    }
}

/// `round(base * (1 + percent/100))` in integer arithmetic.
pub fn apply_bonus(base: u32, percent: u32) -> u32 {
    (base * (100 + percent) + 50) / 100
}

/// What the caller shows the student after a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionResult {
    pub points_awarded: u32,
    pub current_streak: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(points_base: u32, gradable: bool) -> Assignment {
        Assignment::new(
            ObjectId::new(),
            ObjectId::new(),
            "fractions worksheet".to_owned(),
            NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            points_base,
            gradable,
        )
    }

    #[test]
    fn grade_threshold() {
        let work = assignment(10, true);
        assert_eq!(work.earned_points(Some(89), 0), 0);
        assert_eq!(work.earned_points(Some(90), 0), 10);
        assert_eq!(work.earned_points(Some(100), 0), 10);
        assert_eq!(work.earned_points(None, 0), 0);
    }

    #[test]
    fn ungradable_always_earns() {
        let work = assignment(10, false);
        assert_eq!(work.earned_points(None, 0), 10);
        assert_eq!(work.earned_points(Some(0), 0), 10);
    }

    #[test]
    fn bonus_rounds_to_nearest() {
        assert_eq!(apply_bonus(10, 0), 10);
        assert_eq!(apply_bonus(10, 25), 13); // 12.5 rounds up
        assert_eq!(apply_bonus(10, 10), 11);
        assert_eq!(apply_bonus(7, 10), 8); // 7.7 rounds up
        assert_eq!(apply_bonus(7, 50), 11); // 10.5 rounds up
        assert_eq!(apply_bonus(13, 10), 14); // 14.3 rounds down
    }

    #[test]
    fn completion_toggle_clears_engine_fields() {
        let mut work = assignment(10, true);
        let undo = StreakSnapshot {
            streak: 2,
            last_completion_date: NaiveDate::from_ymd_opt(2024, 1, 3),
        };
        let date = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();

        work.mark_completed(Some(95), date, 11, undo.clone());
        assert!(work.completed);
        assert_eq!(work.points_earned, 11);
        assert_eq!(work.reward_points_applied, 11);
        assert_eq!(work.streak_undo, Some(undo));
        assert_eq!(work.completion_date, Some(date));

        work.mark_incomplete();
        assert!(!work.completed);
        assert_eq!(work.points_earned, 0);
        assert_eq!(work.reward_points_applied, 0);
        assert_eq!(work.grade, None);
        assert_eq!(work.completion_date, None);
        assert_eq!(work.streak_undo, None);
    }
}
