use bson::{doc, oid::ObjectId};
use eyre::Error;
use model::{history::HistoryRow, session::Session};
use mongodb::{Collection, IndexModel};

use crate::dump;

const COLLECTION: &str = "history";

pub struct HistoryStore {
    store: Collection<HistoryRow>,
}

impl HistoryStore {
    pub(crate) async fn new(db: &mongodb::Database) -> Result<Self, Error> {
        let store = db.collection(COLLECTION);
        store
            .create_index(IndexModel::builder().keys(doc! { "date_time": -1 }).build())
            .await?;
        store
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "sub_actors": -1 })
                    .build(),
            )
            .await?;
        Ok(HistoryStore { store })
    }

    pub async fn store(&self, session: &mut Session, entry: HistoryRow) -> Result<(), Error> {
        self.store.insert_one(entry).session(session).await?;
        Ok(())
    }

    pub async fn get_logs(
        &self,
        session: &mut Session,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<HistoryRow>, Error> {
        let mut cursor = self
            .store
            .find(doc! {})
            .sort(doc! { "date_time": -1 })
            .skip(offset as u64)
            .session(&mut *session)
            .await?;
        let mut logs = Vec::with_capacity(limit);
        while let Some(row) = cursor.next(&mut *session).await {
            logs.push(row?);
            if logs.len() >= limit {
                break;
            }
        }
        Ok(logs)
    }

    pub async fn get_student_logs(
        &self,
        session: &mut Session,
        student: ObjectId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<HistoryRow>, Error> {
        let mut cursor = self
            .store
            .find(doc! { "sub_actors": { "$elemMatch": { "$eq": student } } })
            .sort(doc! { "date_time": -1 })
            .skip(offset as u64)
            .session(&mut *session)
            .await?;
        let mut logs = Vec::with_capacity(limit);
        while let Some(row) = cursor.next(&mut *session).await {
            logs.push(row?);
            if logs.len() >= limit {
                break;
            }
        }
        Ok(logs)
    }
}

impl dump::Collection<HistoryRow> for HistoryStore {
    fn collection(&self) -> &Collection<HistoryRow> {
        &self.store
    }
}
