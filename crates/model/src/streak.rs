use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Consecutive-day streak math. Completing on the day right after the
/// last completion extends the streak, a repeat completion on the same
/// day keeps it, anything else (gap, first completion, backfilling an
/// earlier date) restarts it at 1.
pub fn advance(
    current_streak: u32,
    last_completion_date: Option<NaiveDate>,
    completion_date: NaiveDate,
) -> u32 {
    match last_completion_date {
        Some(last) if last == completion_date => current_streak,
        Some(last) if last.checked_add_days(Days::new(1)) == Some(completion_date) => {
            current_streak + 1
        }
        _ => 1,
    }
}

/// Step table mapping a streak length to a bonus percentage. Steps are
/// `(min_streak, percent)` in ascending order; the last step whose
/// threshold the streak reaches wins.
#[derive(Debug, Clone)]
pub struct BonusSchedule {
    steps: Vec<(u32, u32)>,
}

impl BonusSchedule {
    pub fn new(steps: Vec<(u32, u32)>) -> Self {
        BonusSchedule { steps }
    }

    pub fn bonus_percent(&self, streak: u32) -> u32 {
        self.steps
            .iter()
            .take_while(|(min, _)| *min <= streak)
            .last()
            .map(|(_, percent)| *percent)
            .unwrap_or(0)
    }
}

impl Default for BonusSchedule {
    fn default() -> Self {
        BonusSchedule {
            steps: vec![(3, 10), (7, 25), (14, 50)],
        }
    }
}

/// Pre-completion streak state persisted on the assignment so that
/// un-completing can restore it. The step function is not invertible
/// (several assignments may complete on one day), so the engine keeps
/// this snapshot instead of recomputing backwards.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreakSnapshot {
    pub streak: u32,
    pub last_completion_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn next_day_extends_streak() {
        let streak = advance(3, Some(date(2024, 1, 3)), date(2024, 1, 4));
        assert_eq!(streak, 4);
    }

    #[test]
    fn same_day_repeat_keeps_streak() {
        let streak = advance(4, Some(date(2024, 1, 4)), date(2024, 1, 4));
        assert_eq!(streak, 4);
    }

    #[test]
    fn gap_restarts_streak() {
        let streak = advance(3, Some(date(2024, 1, 3)), date(2024, 1, 10));
        assert_eq!(streak, 1);
    }

    #[test]
    fn first_completion_starts_at_one() {
        assert_eq!(advance(0, None, date(2024, 1, 4)), 1);
    }

    #[test]
    fn backfilling_an_earlier_date_restarts() {
        let streak = advance(5, Some(date(2024, 1, 10)), date(2024, 1, 4));
        assert_eq!(streak, 1);
    }

    #[test]
    fn month_boundary_counts_as_next_day() {
        let streak = advance(2, Some(date(2024, 1, 31)), date(2024, 2, 1));
        assert_eq!(streak, 3);
    }

    #[test]
    fn default_bonus_steps() {
        let schedule = BonusSchedule::default();
        assert_eq!(schedule.bonus_percent(0), 0);
        assert_eq!(schedule.bonus_percent(2), 0);
        assert_eq!(schedule.bonus_percent(3), 10);
        assert_eq!(schedule.bonus_percent(6), 10);
        assert_eq!(schedule.bonus_percent(7), 25);
        assert_eq!(schedule.bonus_percent(14), 50);
        assert_eq!(schedule.bonus_percent(100), 50);
    }

    #[test]
    fn bonus_is_monotone() {
        let schedule = BonusSchedule::default();
        let mut last = 0;
        for streak in 0..60 {
            let bonus = schedule.bonus_percent(streak);
            assert!(bonus >= last);
            last = bonus;
        }
    }
}
