use std::collections::HashMap;

use chrono::{DateTime, Utc};
use eyre::Error;
use log::{info, warn};
use model::{errors::LedgerError, group::GroupReward, session::Session};
use mongodb::bson::oid::ObjectId;
use storage::{group_rewards::GroupRewardStore, students::StudentStore};
use thiserror::Error;
use tx_macro::tx;

use super::history::History;

/// Pooled goals. Contributions validate against the current map inside
/// the transaction, so racing students can not push the total past the
/// goal.
#[derive(Clone)]
pub struct GroupRewards {
    store: GroupRewardStore,
    students: StudentStore,
    logs: History,
}

impl GroupRewards {
    pub(crate) fn new(store: GroupRewardStore, students: StudentStore, logs: History) -> Self {
        GroupRewards {
            store,
            students,
            logs,
        }
    }

    pub async fn get(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<GroupReward>, Error> {
        self.store.get(session, id).await
    }

    pub async fn find_all(&self, session: &mut Session) -> Result<Vec<GroupReward>, Error> {
        self.store.find_all(session).await
    }

    /// Goals the student can still fund: open to them, uncompleted and
    /// not past their deadline at read time.
    pub async fn active_for_student(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<Vec<GroupReward>, Error> {
        let now = Utc::now();
        let goals = self.store.find_open_for(session, student_id).await?;
        Ok(goals
            .into_iter()
            .filter(|goal| !goal.is_expired(now))
            .collect())
    }

    #[tx]
    pub async fn create(
        &self,
        session: &mut Session,
        name: String,
        description: Option<String>,
        points_needed: u32,
        allowed_student_ids: Vec<ObjectId>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ObjectId, CreateGroupRewardError> {
        if points_needed == 0 {
            return Err(CreateGroupRewardError::InvalidGoal);
        }
        let goal = GroupReward::new(
            name.clone(),
            description,
            points_needed,
            allowed_student_ids,
            expires_at,
        );
        let id = goal.id;
        self.store.insert(session, goal).await?;
        self.logs
            .create_group_reward(session, &name, points_needed)
            .await?;
        Ok(id)
    }

    /// One student puts points into the pool. Every check runs against
    /// the freshly read goal and wallet, never a client-cached view.
    #[tx]
    pub async fn contribute(
        &self,
        session: &mut Session,
        group_reward_id: ObjectId,
        student_id: ObjectId,
        points: u32,
    ) -> Result<(), LedgerError> {
        if points == 0 {
            return Err(LedgerError::Eyre(eyre::eyre!(
                "Contribution must be positive"
            )));
        }
        let mut goal = self
            .store
            .get(session, group_reward_id)
            .await?
            .ok_or(LedgerError::GroupRewardNotFound(group_reward_id))?;
        goal.validate_contribution(student_id, points, Utc::now())?;

        let student = self
            .students
            .get(session, student_id)
            .await?
            .ok_or(LedgerError::StudentNotFound(student_id))?;
        if points > student.wallet_balance {
            return Err(LedgerError::InsufficientBalance {
                shortfall: points - student.wallet_balance,
            });
        }

        let debited = self
            .students
            .adjust_balance(session, student_id, -(points as i64))
            .await?;
        if !debited {
            return Err(LedgerError::InvalidBalance {
                balance: student.wallet_balance,
                delta: -(points as i64),
            });
        }

        goal.record_contribution(student_id, points);
        self.store.update(session, &mut goal).await?;
        info!(
            "Student {} contributed {} points to {} ({}/{})",
            student_id,
            points,
            goal.name,
            goal.points_contributed(),
            goal.points_needed
        );
        self.logs
            .contribute(session, student_id, group_reward_id, points)
            .await?;
        Ok(())
    }

    /// Marks a funded goal redeemed. One-way; redeeming twice is a
    /// no-op.
    #[tx]
    pub async fn redeem(
        &self,
        session: &mut Session,
        group_reward_id: ObjectId,
    ) -> Result<(), LedgerError> {
        let mut goal = self
            .store
            .get(session, group_reward_id)
            .await?
            .ok_or(LedgerError::GroupRewardNotFound(group_reward_id))?;
        if goal.is_completed {
            return Ok(());
        }
        goal.redeem()?;
        self.store.update(session, &mut goal).await?;
        self.logs
            .redeem_group_reward(session, group_reward_id)
            .await?;
        Ok(())
    }

    /// Admin escape hatch: replaces the contribution map wholesale,
    /// without touching any wallet. This can break the conservation
    /// invariant; both maps land in the audit log.
    #[tx]
    pub async fn set_contributions(
        &self,
        session: &mut Session,
        group_reward_id: ObjectId,
        contributions: HashMap<ObjectId, u32>,
    ) -> Result<(), LedgerError> {
        let mut goal = self
            .store
            .get(session, group_reward_id)
            .await?
            .ok_or(LedgerError::GroupRewardNotFound(group_reward_id))?;
        warn!(
            "Overriding contributions for group reward {}; wallets are not reconciled",
            group_reward_id
        );
        self.logs
            .override_contributions(
                session,
                group_reward_id,
                &goal.student_contributions,
                &contributions,
            )
            .await?;
        goal.student_contributions = contributions;
        self.store.update(session, &mut goal).await?;
        Ok(())
    }

    #[tx]
    pub async fn delete(
        &self,
        session: &mut Session,
        group_reward_id: ObjectId,
    ) -> Result<(), LedgerError> {
        self.store.delete(session, group_reward_id).await?;
        Ok(())
    }

    /// Cascade helper: drops one student's entries from every goal.
    /// Runs inside the caller's transaction.
    pub(crate) async fn strip_student(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<(), Error> {
        let goals = self.store.find_all(session).await?;
        for mut goal in goals {
            if goal.student_contributions.remove(&student_id).is_some() {
                self.store.update(session, &mut goal).await?;
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum CreateGroupRewardError {
    #[error("A group reward needs a positive points goal")]
    InvalidGoal,
    #[error(transparent)]
    Common(#[from] Error),
}

impl From<mongodb::error::Error> for CreateGroupRewardError {
    fn from(err: mongodb::error::Error) -> Self {
        CreateGroupRewardError::Common(err.into())
    }
}
