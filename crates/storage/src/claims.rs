use eyre::Result;
use futures_util::stream::TryStreamExt;
use log::info;
use model::{claim::RewardClaim, session::Session};
use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection, Database, IndexModel,
};

use crate::dump;

const COLLECTION: &str = "reward_claims";

/// Append-only store: claims are never edited after insert apart from
/// the one-way fulfillment flag.
#[derive(Clone)]
pub struct ClaimStore {
    claims: Collection<RewardClaim>,
}

impl ClaimStore {
    pub(crate) async fn new(db: &Database) -> Result<Self> {
        let claims = db.collection(COLLECTION);
        claims
            .create_index(IndexModel::builder().keys(doc! { "student_id": 1 }).build())
            .await?;
        claims
            .create_index(IndexModel::builder().keys(doc! { "status": 1 }).build())
            .await?;
        Ok(ClaimStore { claims })
    }

    pub async fn get(
        &self,
        session: &mut Session,
        student_id: ObjectId,
        claim_id: ObjectId,
    ) -> Result<Option<RewardClaim>> {
        Ok(self
            .claims
            .find_one(doc! { "_id": claim_id, "student_id": student_id })
            .session(&mut *session)
            .await?)
    }

    pub async fn insert(&self, session: &mut Session, claim: RewardClaim) -> Result<()> {
        info!("Inserting claim: {:?}", claim);
        self.claims.insert_one(claim).session(&mut *session).await?;
        Ok(())
    }

    pub async fn find_pending(&self, session: &mut Session) -> Result<Vec<RewardClaim>> {
        let mut cursor = self
            .claims
            .find(doc! { "status": "Pending" })
            .sort(doc! { "claimed_at": 1 })
            .session(&mut *session)
            .await?;
        Ok(cursor.stream(&mut *session).try_collect().await?)
    }

    pub async fn find_by_student(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<Vec<RewardClaim>> {
        let mut cursor = self
            .claims
            .find(doc! { "student_id": student_id })
            .sort(doc! { "claimed_at": -1 })
            .session(&mut *session)
            .await?;
        Ok(cursor.stream(&mut *session).try_collect().await?)
    }

    /// Marks a claim fulfilled. Fulfilling an already fulfilled claim
    /// matches the document and changes nothing, which is exactly the
    /// retry-tolerant behavior we want. Returns whether the claim
    /// exists.
    pub async fn fulfill(
        &self,
        session: &mut Session,
        student_id: ObjectId,
        claim_id: ObjectId,
    ) -> Result<bool> {
        let result = self
            .claims
            .update_one(
                doc! { "_id": claim_id, "student_id": student_id },
                doc! { "$set": { "status": "Fulfilled" } },
            )
            .session(&mut *session)
            .await?;
        Ok(result.matched_count > 0)
    }

    pub async fn delete_by_student(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<u64> {
        info!("Deleting claims for student: {}", student_id);
        let result = self
            .claims
            .delete_many(doc! { "student_id": student_id })
            .session(&mut *session)
            .await?;
        Ok(result.deleted_count)
    }
}

impl dump::Collection<RewardClaim> for ClaimStore {
    fn collection(&self) -> &Collection<RewardClaim> {
        &self.claims
    }
}
