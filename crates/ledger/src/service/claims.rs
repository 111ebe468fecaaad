use eyre::Result;
use log::info;
use model::{
    claim::RewardClaim,
    errors::{EligibilityIssue, LedgerError},
    session::Session,
};
use mongodb::bson::oid::ObjectId;
use storage::{claims::ClaimStore, rewards::RewardStore, students::StudentStore};
use tx_macro::tx;

use super::history::History;

/// Point-for-reward exchanges. A claim debits the wallet and appends an
/// immutable record; there are no automatic refunds, a refund is an
/// explicit admin credit through the balance service.
#[derive(Clone)]
pub struct Claims {
    store: ClaimStore,
    students: StudentStore,
    rewards: RewardStore,
    logs: History,
}

impl Claims {
    pub(crate) fn new(
        store: ClaimStore,
        students: StudentStore,
        rewards: RewardStore,
        logs: History,
    ) -> Self {
        Claims {
            store,
            students,
            rewards,
            logs,
        }
    }

    pub async fn pending_claims(&self, session: &mut Session) -> Result<Vec<RewardClaim>> {
        self.store.find_pending(session).await
    }

    pub async fn claims_for_student(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<Vec<RewardClaim>> {
        self.store.find_by_student(session, student_id).await
    }

    /// The exchange itself. Balance is re-read inside the transaction;
    /// two concurrent claims against one wallet serialize, and the
    /// loser sees the post-debit balance.
    #[tx]
    pub async fn claim_reward(
        &self,
        session: &mut Session,
        student_id: ObjectId,
        reward_id: ObjectId,
    ) -> Result<RewardClaim, LedgerError> {
        let student = self
            .students
            .get(session, student_id)
            .await?
            .ok_or(LedgerError::StudentNotFound(student_id))?;
        let reward = self
            .rewards
            .get(session, reward_id)
            .await?
            .ok_or(LedgerError::RewardNotFound(reward_id))?;

        if !reward.is_visible_to(student_id) {
            return Err(LedgerError::NotEligible {
                student_id,
                reason: EligibilityIssue::NotAllowed,
            });
        }
        if !reward.can_afford(student.wallet_balance) {
            return Err(LedgerError::InsufficientBalance {
                shortfall: reward.point_cost - student.wallet_balance,
            });
        }

        let debited = self
            .students
            .adjust_balance(session, student_id, -(reward.point_cost as i64))
            .await?;
        if !debited {
            // Pre-validated above; only a caller bug gets here.
            return Err(LedgerError::InvalidBalance {
                balance: student.wallet_balance,
                delta: -(reward.point_cost as i64),
            });
        }

        let claim = RewardClaim::new(student_id, &reward);
        info!(
            "Student {} claims reward {} for {} points",
            student_id, reward.name, reward.point_cost
        );
        self.store.insert(session, claim.clone()).await?;
        self.rewards.inc_times_claimed(session, reward_id).await?;
        self.logs
            .claim_reward(session, student_id, reward_id, &reward.name, reward.point_cost)
            .await?;
        Ok(claim)
    }

    /// Cascade helper for student deletion; runs inside the caller's
    /// transaction.
    pub(crate) async fn delete_by_student(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<u64> {
        self.store.delete_by_student(session, student_id).await
    }

    /// `Pending -> Fulfilled`, one-way. Re-fulfilling is a no-op so
    /// the admin can safely retry.
    #[tx]
    pub async fn fulfill_claim(
        &self,
        session: &mut Session,
        student_id: ObjectId,
        claim_id: ObjectId,
    ) -> Result<(), LedgerError> {
        let claim = self
            .store
            .get(session, student_id, claim_id)
            .await?
            .ok_or(LedgerError::ClaimNotFound(claim_id))?;
        if !claim.is_pending() {
            return Ok(());
        }
        self.store.fulfill(session, student_id, claim_id).await?;
        self.logs
            .fulfill_claim(session, student_id, claim_id)
            .await?;
        Ok(())
    }
}
