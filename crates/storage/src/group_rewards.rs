use bson::to_document;
use eyre::{Error, Result};
use futures_util::stream::TryStreamExt;
use log::info;
use model::{group::GroupReward, session::Session};
use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection, Database,
};

use crate::dump;

const COLLECTION: &str = "group_rewards";

#[derive(Clone)]
pub struct GroupRewardStore {
    group_rewards: Collection<GroupReward>,
}

impl GroupRewardStore {
    pub(crate) fn new(db: &Database) -> Self {
        GroupRewardStore {
            group_rewards: db.collection(COLLECTION),
        }
    }

    pub async fn get(&self, session: &mut Session, id: ObjectId) -> Result<Option<GroupReward>> {
        Ok(self
            .group_rewards
            .find_one(doc! { "_id": id })
            .session(&mut *session)
            .await?)
    }

    pub async fn find_all(&self, session: &mut Session) -> Result<Vec<GroupReward>> {
        let mut cursor = self
            .group_rewards
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .session(&mut *session)
            .await?;
        Ok(cursor.stream(&mut *session).try_collect().await?)
    }

    /// Uncompleted goals the student may contribute to. Expiry is
    /// checked by the caller against the current time; it is not
    /// stored.
    pub async fn find_open_for(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<Vec<GroupReward>> {
        let filter = doc! {
            "is_completed": false,
            "$or": [
                { "allowed_student_ids": { "$size": 0 } },
                { "allowed_student_ids": student_id },
            ],
        };
        let mut cursor = self
            .group_rewards
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .session(&mut *session)
            .await?;
        Ok(cursor.stream(&mut *session).try_collect().await?)
    }

    pub async fn insert(&self, session: &mut Session, group_reward: GroupReward) -> Result<()> {
        info!("Inserting group reward: {:?}", group_reward);
        self.group_rewards
            .insert_one(group_reward)
            .session(&mut *session)
            .await?;
        Ok(())
    }

    pub async fn update(&self, session: &mut Session, group_reward: &mut GroupReward) -> Result<()> {
        group_reward.version += 1;
        let result = self
            .group_rewards
            .update_one(
                doc! { "_id": group_reward.id },
                doc! { "$set": to_document(group_reward)? },
            )
            .session(&mut *session)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::msg("Group reward not found"));
        }
        Ok(())
    }

    pub async fn delete(&self, session: &mut Session, id: ObjectId) -> Result<()> {
        info!("Deleting group reward: {}", id);
        self.group_rewards
            .delete_one(doc! { "_id": id })
            .session(&mut *session)
            .await?;
        Ok(())
    }
}

impl dump::Collection<GroupReward> for GroupRewardStore {
    fn collection(&self) -> &Collection<GroupReward> {
        &self.group_rewards
    }
}
