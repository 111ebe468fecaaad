use core::fmt;

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog entry students spend points on. The tier is always derived
/// from `point_cost` on read and never stored, so it can not drift.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Reward {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub point_cost: u32,
    /// Empty means the reward is visible to every student.
    #[serde(default)]
    pub assigned_student_ids: Vec<ObjectId>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub times_claimed_total: u32,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

fn default_is_active() -> bool {
    true
}

impl Reward {
    pub fn new(
        name: String,
        description: Option<String>,
        point_cost: u32,
        assigned_student_ids: Vec<ObjectId>,
    ) -> Reward {
        Reward {
            id: ObjectId::new(),
            name,
            description,
            point_cost,
            assigned_student_ids,
            is_active: true,
            times_claimed_total: 0,
            created_at: Utc::now(),
            version: 0,
        }
    }

    pub fn tier(&self) -> Tier {
        Tier::from_cost(self.point_cost)
    }

    pub fn is_visible_to(&self, student_id: ObjectId) -> bool {
        self.is_active
            && (self.assigned_student_ids.is_empty()
                || self.assigned_student_ids.contains(&student_id))
    }

    pub fn can_afford(&self, balance: u32) -> bool {
        balance >= self.point_cost
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub fn from_cost(cost: u32) -> Tier {
        match cost {
            0..=499 => Tier::Bronze,
            500..=1499 => Tier::Silver,
            1500..=2999 => Tier::Gold,
            _ => Tier::Platinum,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Bronze => write!(f, "bronze"),
            Tier::Silver => write!(f, "silver"),
            Tier::Gold => write!(f, "gold"),
            Tier::Platinum => write!(f, "platinum"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_bands() {
        assert_eq!(Tier::from_cost(1), Tier::Bronze);
        assert_eq!(Tier::from_cost(499), Tier::Bronze);
        assert_eq!(Tier::from_cost(500), Tier::Silver);
        assert_eq!(Tier::from_cost(1499), Tier::Silver);
        assert_eq!(Tier::from_cost(1500), Tier::Gold);
        assert_eq!(Tier::from_cost(2999), Tier::Gold);
        assert_eq!(Tier::from_cost(3000), Tier::Platinum);
        assert_eq!(Tier::from_cost(100_000), Tier::Platinum);
    }

    #[test]
    fn tier_follows_cost_changes() {
        let mut reward = Reward::new("lego set".to_owned(), None, 500, vec![]);
        assert_eq!(reward.tier(), Tier::Silver);
        reward.point_cost = 1500;
        assert_eq!(reward.tier(), Tier::Gold);
    }

    #[test]
    fn visibility_with_empty_allow_list() {
        let reward = Reward::new("movie night".to_owned(), None, 100, vec![]);
        assert!(reward.is_visible_to(ObjectId::new()));
    }

    #[test]
    fn visibility_with_allow_list() {
        let allowed = ObjectId::new();
        let reward = Reward::new("movie night".to_owned(), None, 100, vec![allowed]);
        assert!(reward.is_visible_to(allowed));
        assert!(!reward.is_visible_to(ObjectId::new()));
    }

    #[test]
    fn disabled_reward_is_hidden() {
        let mut reward = Reward::new("movie night".to_owned(), None, 100, vec![]);
        reward.is_active = false;
        assert!(!reward.is_visible_to(ObjectId::new()));
    }

    #[test]
    fn afford_is_inclusive() {
        let reward = Reward::new("book".to_owned(), None, 100, vec![]);
        assert!(reward.can_afford(100));
        assert!(!reward.can_afford(99));
    }
}
