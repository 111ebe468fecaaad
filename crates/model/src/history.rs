use bson::oid::ObjectId;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Append-only audit row. `actor` is whoever ran the operation (from
/// the session), `sub_actors` the students whose records it touched.
#[derive(Serialize, Deserialize, Debug)]
pub struct HistoryRow {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub actor: ObjectId,
    pub sub_actors: Vec<ObjectId>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date_time: DateTime<Utc>,
    pub action: Action,
}

impl HistoryRow {
    pub fn new(actor: ObjectId, action: Action) -> Self {
        HistoryRow {
            id: ObjectId::new(),
            actor,
            sub_actors: vec![],
            date_time: Local::now().with_timezone(&Utc),
            action,
        }
    }

    pub fn with_sub_actors(actor: ObjectId, sub_actors: Vec<ObjectId>, action: Action) -> Self {
        HistoryRow {
            id: ObjectId::new(),
            actor,
            sub_actors,
            date_time: Local::now().with_timezone(&Utc),
            action,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub enum Action {
    CreateStudent {
        name: String,
    },
    DeleteStudent {},
    ResetStreak {},
    AdjustBalance {
        delta: i64,
    },
    SetAllocation {
        reward: ObjectId,
        from: u32,
        to: u32,
    },
    CreateReward {
        name: String,
        cost: u32,
    },
    DeleteReward {
        name: String,
    },
    SetRewardActive {
        is_active: bool,
    },
    ClaimReward {
        reward: ObjectId,
        name: String,
        cost: u32,
    },
    FulfillClaim {
        claim: ObjectId,
    },
    CreateGroupReward {
        name: String,
        points_needed: u32,
    },
    Contribute {
        group_reward: ObjectId,
        points: u32,
    },
    RedeemGroupReward {
        group_reward: ObjectId,
    },
    /// Admin override of a contribution map. Both maps are kept because
    /// the override bypasses wallet debits and may break conservation.
    OverrideContributions {
        group_reward: ObjectId,
        before: Vec<(ObjectId, u32)>,
        after: Vec<(ObjectId, u32)>,
    },
    CompleteAssignment {
        assignment: ObjectId,
        points: u32,
        streak: u32,
    },
    /// `shortfall` is the part of the earned points the wallet could
    /// not return because they were already spent.
    UncompleteAssignment {
        assignment: ObjectId,
        returned: u32,
        shortfall: u32,
    },
}
