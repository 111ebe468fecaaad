use bson::to_document;
use eyre::{Error, Result};
use futures_util::stream::TryStreamExt;
use log::info;
use model::{reward::Reward, session::Session};
use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection, Database,
};

use crate::dump;

const COLLECTION: &str = "rewards";

#[derive(Clone)]
pub struct RewardStore {
    rewards: Collection<Reward>,
}

impl RewardStore {
    pub(crate) fn new(db: &Database) -> Self {
        RewardStore {
            rewards: db.collection(COLLECTION),
        }
    }

    pub async fn get(&self, session: &mut Session, id: ObjectId) -> Result<Option<Reward>> {
        Ok(self
            .rewards
            .find_one(doc! { "_id": id })
            .session(&mut *session)
            .await?)
    }

    pub async fn find_all(&self, session: &mut Session) -> Result<Vec<Reward>> {
        let mut cursor = self
            .rewards
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .session(&mut *session)
            .await?;
        Ok(cursor.stream(&mut *session).try_collect().await?)
    }

    /// Active rewards a student may see: empty allow-list or listed.
    pub async fn find_visible_to(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<Vec<Reward>> {
        let filter = doc! {
            "is_active": true,
            "$or": [
                { "assigned_student_ids": { "$size": 0 } },
                { "assigned_student_ids": student_id },
            ],
        };
        let mut cursor = self
            .rewards
            .find(filter)
            .sort(doc! { "point_cost": 1 })
            .session(&mut *session)
            .await?;
        Ok(cursor.stream(&mut *session).try_collect().await?)
    }

    pub async fn insert(&self, session: &mut Session, reward: Reward) -> Result<()> {
        info!("Inserting reward: {:?}", reward);
        self.rewards
            .insert_one(reward)
            .session(&mut *session)
            .await?;
        Ok(())
    }

    pub async fn update(&self, session: &mut Session, reward: &mut Reward) -> Result<()> {
        reward.version += 1;
        let result = self
            .rewards
            .update_one(
                doc! { "_id": reward.id },
                doc! { "$set": to_document(reward)? },
            )
            .session(&mut *session)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::msg("Reward not found"));
        }
        Ok(())
    }

    pub async fn set_active(
        &self,
        session: &mut Session,
        id: ObjectId,
        is_active: bool,
    ) -> Result<()> {
        info!("Setting reward {} active: {}", id, is_active);
        let result = self
            .rewards
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "is_active": is_active }, "$inc": { "version": 1 } },
            )
            .session(&mut *session)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::msg("Reward not found"));
        }
        Ok(())
    }

    pub async fn inc_times_claimed(&self, session: &mut Session, id: ObjectId) -> Result<()> {
        let result = self
            .rewards
            .update_one(
                doc! { "_id": id },
                doc! { "$inc": { "times_claimed_total": 1, "version": 1 } },
            )
            .session(&mut *session)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::msg("Reward not found"));
        }
        Ok(())
    }

    pub async fn delete(&self, session: &mut Session, id: ObjectId) -> Result<()> {
        info!("Deleting reward: {}", id);
        self.rewards
            .delete_one(doc! { "_id": id })
            .session(&mut *session)
            .await?;
        Ok(())
    }
}

impl dump::Collection<Reward> for RewardStore {
    fn collection(&self) -> &Collection<Reward> {
        &self.rewards
    }
}
