use std::{collections::HashMap, ops::Deref, sync::Arc};

use eyre::Result;
use model::{
    history::{Action, HistoryRow},
    session::Session,
};
use mongodb::bson::oid::ObjectId;
use storage::history::HistoryStore;

/// Typed facade over the audit log. Rows are written inside the same
/// transaction as the mutation they describe, so the log never shows
/// an operation that was rolled back.
#[derive(Clone)]
pub struct History {
    store: Arc<HistoryStore>,
}

impl History {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        History { store }
    }

    pub async fn create_student(
        &self,
        session: &mut Session,
        student: ObjectId,
        name: &str,
    ) -> Result<()> {
        let entry = HistoryRow::with_sub_actors(
            session.actor(),
            vec![student],
            Action::CreateStudent {
                name: name.to_owned(),
            },
        );
        self.store.store(session, entry).await
    }

    pub async fn delete_student(&self, session: &mut Session, student: ObjectId) -> Result<()> {
        let entry =
            HistoryRow::with_sub_actors(session.actor(), vec![student], Action::DeleteStudent {});
        self.store.store(session, entry).await
    }

    pub async fn reset_streak(&self, session: &mut Session, student: ObjectId) -> Result<()> {
        let entry =
            HistoryRow::with_sub_actors(session.actor(), vec![student], Action::ResetStreak {});
        self.store.store(session, entry).await
    }

    pub async fn adjust_balance(
        &self,
        session: &mut Session,
        student: ObjectId,
        delta: i64,
    ) -> Result<()> {
        let entry = HistoryRow::with_sub_actors(
            session.actor(),
            vec![student],
            Action::AdjustBalance { delta },
        );
        self.store.store(session, entry).await
    }

    pub async fn set_allocation(
        &self,
        session: &mut Session,
        student: ObjectId,
        reward: ObjectId,
        from: u32,
        to: u32,
    ) -> Result<()> {
        let entry = HistoryRow::with_sub_actors(
            session.actor(),
            vec![student],
            Action::SetAllocation { reward, from, to },
        );
        self.store.store(session, entry).await
    }

    pub async fn create_reward(&self, session: &mut Session, name: &str, cost: u32) -> Result<()> {
        let entry = HistoryRow::new(
            session.actor(),
            Action::CreateReward {
                name: name.to_owned(),
                cost,
            },
        );
        self.store.store(session, entry).await
    }

    pub async fn delete_reward(&self, session: &mut Session, name: &str) -> Result<()> {
        let entry = HistoryRow::new(
            session.actor(),
            Action::DeleteReward {
                name: name.to_owned(),
            },
        );
        self.store.store(session, entry).await
    }

    pub async fn set_reward_active(&self, session: &mut Session, is_active: bool) -> Result<()> {
        let entry = HistoryRow::new(session.actor(), Action::SetRewardActive { is_active });
        self.store.store(session, entry).await
    }

    pub async fn claim_reward(
        &self,
        session: &mut Session,
        student: ObjectId,
        reward: ObjectId,
        name: &str,
        cost: u32,
    ) -> Result<()> {
        let entry = HistoryRow::with_sub_actors(
            session.actor(),
            vec![student],
            Action::ClaimReward {
                reward,
                name: name.to_owned(),
                cost,
            },
        );
        self.store.store(session, entry).await
    }

    pub async fn fulfill_claim(
        &self,
        session: &mut Session,
        student: ObjectId,
        claim: ObjectId,
    ) -> Result<()> {
        let entry = HistoryRow::with_sub_actors(
            session.actor(),
            vec![student],
            Action::FulfillClaim { claim },
        );
        self.store.store(session, entry).await
    }

    pub async fn create_group_reward(
        &self,
        session: &mut Session,
        name: &str,
        points_needed: u32,
    ) -> Result<()> {
        let entry = HistoryRow::new(
            session.actor(),
            Action::CreateGroupReward {
                name: name.to_owned(),
                points_needed,
            },
        );
        self.store.store(session, entry).await
    }

    pub async fn contribute(
        &self,
        session: &mut Session,
        student: ObjectId,
        group_reward: ObjectId,
        points: u32,
    ) -> Result<()> {
        let entry = HistoryRow::with_sub_actors(
            session.actor(),
            vec![student],
            Action::Contribute {
                group_reward,
                points,
            },
        );
        self.store.store(session, entry).await
    }

    pub async fn redeem_group_reward(
        &self,
        session: &mut Session,
        group_reward: ObjectId,
    ) -> Result<()> {
        let entry = HistoryRow::new(session.actor(), Action::RedeemGroupReward { group_reward });
        self.store.store(session, entry).await
    }

    pub async fn override_contributions(
        &self,
        session: &mut Session,
        group_reward: ObjectId,
        before: &HashMap<ObjectId, u32>,
        after: &HashMap<ObjectId, u32>,
    ) -> Result<()> {
        let entry = HistoryRow::new(
            session.actor(),
            Action::OverrideContributions {
                group_reward,
                before: before.iter().map(|(id, points)| (*id, *points)).collect(),
                after: after.iter().map(|(id, points)| (*id, *points)).collect(),
            },
        );
        self.store.store(session, entry).await
    }

    pub async fn complete_assignment(
        &self,
        session: &mut Session,
        student: ObjectId,
        assignment: ObjectId,
        points: u32,
        streak: u32,
    ) -> Result<()> {
        let entry = HistoryRow::with_sub_actors(
            session.actor(),
            vec![student],
            Action::CompleteAssignment {
                assignment,
                points,
                streak,
            },
        );
        self.store.store(session, entry).await
    }

    pub async fn uncomplete_assignment(
        &self,
        session: &mut Session,
        student: ObjectId,
        assignment: ObjectId,
        returned: u32,
        shortfall: u32,
    ) -> Result<()> {
        let entry = HistoryRow::with_sub_actors(
            session.actor(),
            vec![student],
            Action::UncompleteAssignment {
                assignment,
                returned,
                shortfall,
            },
        );
        self.store.store(session, entry).await
    }

    pub async fn logs(
        &self,
        session: &mut Session,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<HistoryRow>> {
        self.store.get_logs(session, limit, offset).await
    }

    pub async fn student_logs(
        &self,
        session: &mut Session,
        student: ObjectId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<HistoryRow>> {
        self.store
            .get_student_logs(session, student, limit, offset)
            .await
    }
}

impl Deref for History {
    type Target = HistoryStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}
