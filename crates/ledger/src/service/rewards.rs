use eyre::Error;
use model::{errors::LedgerError, reward::Reward, session::Session};
use mongodb::bson::oid::ObjectId;
use storage::rewards::RewardStore;
use thiserror::Error;
use tx_macro::tx;

use super::history::History;

/// The reward catalog. Tier and afford-ability are derived on the
/// model, never persisted, so there is nothing here to keep in sync.
#[derive(Clone)]
pub struct Rewards {
    store: RewardStore,
    logs: History,
}

impl Rewards {
    pub(crate) fn new(store: RewardStore, logs: History) -> Self {
        Rewards { store, logs }
    }

    pub async fn get(&self, session: &mut Session, id: ObjectId) -> Result<Option<Reward>, Error> {
        self.store.get(session, id).await
    }

    pub async fn find_all(&self, session: &mut Session) -> Result<Vec<Reward>, Error> {
        self.store.find_all(session).await
    }

    /// Active rewards the student is allowed to claim, cheapest first.
    pub async fn visible_for_student(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<Vec<Reward>, Error> {
        self.store.find_visible_to(session, student_id).await
    }

    #[tx]
    pub async fn create(
        &self,
        session: &mut Session,
        name: String,
        description: Option<String>,
        point_cost: u32,
        assigned_student_ids: Vec<ObjectId>,
    ) -> Result<ObjectId, CreateRewardError> {
        if point_cost == 0 {
            return Err(CreateRewardError::InvalidCost);
        }
        let reward = Reward::new(name.clone(), description, point_cost, assigned_student_ids);
        let id = reward.id;
        self.store.insert(session, reward).await?;
        self.logs.create_reward(session, &name, point_cost).await?;
        Ok(id)
    }

    /// Edits the definition; claims made before the edit keep their
    /// snapshots. The tier follows the new cost automatically.
    #[tx]
    pub async fn update(
        &self,
        session: &mut Session,
        id: ObjectId,
        name: String,
        description: Option<String>,
        point_cost: u32,
        assigned_student_ids: Vec<ObjectId>,
    ) -> Result<(), CreateRewardError> {
        if point_cost == 0 {
            return Err(CreateRewardError::InvalidCost);
        }
        let mut reward = self
            .store
            .get(session, id)
            .await?
            .ok_or(CreateRewardError::NotFound(id))?;
        reward.name = name;
        reward.description = description;
        reward.point_cost = point_cost;
        reward.assigned_student_ids = assigned_student_ids;
        self.store.update(session, &mut reward).await?;
        Ok(())
    }

    /// Disabling hides the reward from claiming but keeps it in
    /// history; the reversible alternative to deletion.
    #[tx]
    pub async fn set_active(
        &self,
        session: &mut Session,
        id: ObjectId,
        is_active: bool,
    ) -> Result<(), LedgerError> {
        self.store.set_active(session, id, is_active).await?;
        self.logs.set_reward_active(session, is_active).await?;
        Ok(())
    }

    /// Hard delete, unrecoverable. Existing claims are untouched, they
    /// carry their own snapshots.
    #[tx]
    pub async fn delete(&self, session: &mut Session, id: ObjectId) -> Result<(), LedgerError> {
        let reward = self
            .store
            .get(session, id)
            .await?
            .ok_or(LedgerError::RewardNotFound(id))?;
        self.store.delete(session, id).await?;
        self.logs.delete_reward(session, &reward.name).await?;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum CreateRewardError {
    #[error("Reward cost must be a positive number of points")]
    InvalidCost,
    #[error("Reward not found: {0}")]
    NotFound(ObjectId),
    #[error(transparent)]
    Common(#[from] Error),
}

impl From<mongodb::error::Error> for CreateRewardError {
    fn from(err: mongodb::error::Error) -> Self {
        CreateRewardError::Common(err.into())
    }
}
