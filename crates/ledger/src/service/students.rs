use eyre::Result;
use log::info;
use model::{errors::LedgerError, session::Session, student::Student};
use mongodb::bson::oid::ObjectId;
use storage::{rewards::RewardStore, students::StudentStore};
use tx_macro::tx;

use super::history::History;

/// Wallets and allocations. Nothing outside this service (and the
/// completion/claim/contribution flows that share the store) touches
/// `wallet_balance` or `reward_allocations`.
#[derive(Clone)]
pub struct Students {
    store: StudentStore,
    rewards: RewardStore,
    logs: History,
}

impl Students {
    pub(crate) fn new(store: StudentStore, rewards: RewardStore, logs: History) -> Self {
        Students {
            store,
            rewards,
            logs,
        }
    }

    pub async fn get(&self, session: &mut Session, id: ObjectId) -> Result<Option<Student>> {
        self.store.get(session, id).await
    }

    pub async fn find_all(&self, session: &mut Session) -> Result<Vec<Student>> {
        self.store.find_all(session).await
    }

    /// Display projection; never feed this into a later write.
    pub async fn wallet_balance(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<u32, LedgerError> {
        let student = self
            .store
            .get(session, id)
            .await?
            .ok_or(LedgerError::StudentNotFound(id))?;
        Ok(student.wallet_balance)
    }

    #[tx]
    pub async fn create(&self, session: &mut Session, name: String) -> Result<ObjectId> {
        let student = Student::new(name.clone());
        let id = student.id;
        self.store.insert(session, student).await?;
        self.logs.create_student(session, id, &name).await?;
        Ok(id)
    }

    /// Admin credit or debit. A debit that the wallet can not cover is
    /// rejected whole; public flows pre-validate, so hitting the guard
    /// here means a caller bug.
    #[tx]
    pub async fn adjust_balance(
        &self,
        session: &mut Session,
        id: ObjectId,
        delta: i64,
    ) -> Result<(), LedgerError> {
        let student = self
            .store
            .get(session, id)
            .await?
            .ok_or(LedgerError::StudentNotFound(id))?;
        if delta < 0 && (student.wallet_balance as i64) < -delta {
            return Err(LedgerError::InvalidBalance {
                balance: student.wallet_balance,
                delta,
            });
        }
        if !self.store.adjust_balance(session, id, delta).await? {
            return Err(LedgerError::InvalidBalance {
                balance: student.wallet_balance,
                delta,
            });
        }
        self.logs.adjust_balance(session, id, delta).await?;
        Ok(())
    }

    /// Moves points between the wallet and the escrow entry for one
    /// reward. The whole read-validate-write runs in one transaction,
    /// so no intermediate split is ever observable.
    #[tx]
    pub async fn set_allocation(
        &self,
        session: &mut Session,
        student_id: ObjectId,
        reward_id: ObjectId,
        new_amount: u32,
    ) -> Result<(), LedgerError> {
        let mut student = self
            .store
            .get(session, student_id)
            .await?
            .ok_or(LedgerError::StudentNotFound(student_id))?;
        let reward = self
            .rewards
            .get(session, reward_id)
            .await?
            .ok_or(LedgerError::RewardNotFound(reward_id))?;

        let old = student.allocation(reward_id);
        student.set_allocation(reward_id, new_amount, reward.point_cost)?;
        self.store.update(session, &mut student).await?;
        self.logs
            .set_allocation(session, student_id, reward_id, old, new_amount)
            .await?;
        Ok(())
    }

    /// Cascade helper for student deletion; runs inside the caller's
    /// transaction.
    pub(crate) async fn delete_record(&self, session: &mut Session, id: ObjectId) -> Result<()> {
        self.store.delete(session, id).await
    }

    /// Explicit admin correction; the only path that lowers
    /// `longest_streak`.
    #[tx]
    pub async fn reset_streak(&self, session: &mut Session, id: ObjectId) -> Result<()> {
        info!("Resetting streak for student {}", id);
        self.store.reset_streak(session, id).await?;
        self.logs.reset_streak(session, id).await?;
        Ok(())
    }
}
