use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reward::{Reward, Tier};

/// Immutable record of one points-for-reward exchange. Name, tier and
/// cost are snapshotted at claim time so later reward edits do not
/// rewrite history.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RewardClaim {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub student_id: ObjectId,
    pub reward_id: ObjectId,
    pub reward_name: String,
    pub tier: Tier,
    pub cost: u32,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub claimed_at: DateTime<Utc>,
    pub status: FulfillmentStatus,
}

impl RewardClaim {
    pub fn new(student_id: ObjectId, reward: &Reward) -> RewardClaim {
        RewardClaim {
            id: ObjectId::new(),
            student_id,
            reward_id: reward.id,
            reward_name: reward.name.clone(),
            tier: reward.tier(),
            cost: reward.point_cost,
            claimed_at: Utc::now(),
            status: FulfillmentStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == FulfillmentStatus::Pending
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum FulfillmentStatus {
    Pending,
    Fulfilled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_snapshots_the_reward() {
        let student = ObjectId::new();
        let mut reward = Reward::new("bike".to_owned(), None, 1600, vec![]);
        let claim = RewardClaim::new(student, &reward);

        reward.name = "scooter".to_owned();
        reward.point_cost = 200;

        assert_eq!(claim.reward_name, "bike");
        assert_eq!(claim.tier, Tier::Gold);
        assert_eq!(claim.cost, 1600);
        assert!(claim.is_pending());
    }
}
