use bson::to_document;
use eyre::{Error, Result};
use futures_util::stream::TryStreamExt;
use log::info;
use model::{session::Session, student::Student};
use mongodb::options::UpdateOptions;
use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection, Database, IndexModel,
};

use crate::dump;

const COLLECTION: &str = "students";

#[derive(Clone)]
pub struct StudentStore {
    students: Collection<Student>,
}

impl StudentStore {
    pub(crate) async fn new(db: &Database) -> Result<Self> {
        let students = db.collection(COLLECTION);
        students
            .create_index(IndexModel::builder().keys(doc! { "name": 1 }).build())
            .await?;
        Ok(StudentStore { students })
    }

    pub async fn get(&self, session: &mut Session, id: ObjectId) -> Result<Option<Student>> {
        Ok(self
            .students
            .find_one(doc! { "_id": id })
            .session(&mut *session)
            .await?)
    }

    pub async fn find_all(&self, session: &mut Session) -> Result<Vec<Student>> {
        let mut cursor = self
            .students
            .find(doc! {})
            .sort(doc! { "name": 1 })
            .session(&mut *session)
            .await?;
        Ok(cursor.stream(&mut *session).try_collect().await?)
    }

    pub async fn insert(&self, session: &mut Session, student: Student) -> Result<()> {
        info!("Inserting student: {:?}", student);
        let result = self
            .students
            .update_one(
                doc! { "_id": student.id },
                doc! { "$setOnInsert": to_document(&student)? },
            )
            .session(&mut *session)
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await?;
        if result.upserted_id.is_none() {
            return Err(Error::msg("Student already exists"));
        }
        Ok(())
    }

    /// Full-document rewrite with a version bump. Callers mutate a
    /// freshly read `Student` inside the transaction and write it back
    /// through here.
    pub async fn update(&self, session: &mut Session, student: &mut Student) -> Result<()> {
        student.version += 1;
        let result = self
            .students
            .update_one(
                doc! { "_id": student.id },
                doc! { "$set": to_document(student)? },
            )
            .session(&mut *session)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::msg("Student not found"));
        }
        Ok(())
    }

    /// Guarded increment: a negative delta only applies while the
    /// wallet still covers it, so the balance can not go below zero
    /// even across transaction retries. Returns whether a document was
    /// modified.
    pub async fn adjust_balance(
        &self,
        session: &mut Session,
        id: ObjectId,
        delta: i64,
    ) -> Result<bool> {
        info!("Adjusting balance for student {}: {}", id, delta);
        let mut filter = doc! { "_id": id };
        if delta < 0 {
            filter.insert("wallet_balance", doc! { "$gte": -delta });
        }
        let result = self
            .students
            .update_one(
                filter,
                doc! { "$inc": { "wallet_balance": delta, "version": 1 } },
            )
            .session(&mut *session)
            .await?;
        Ok(result.modified_count > 0)
    }

    pub async fn reset_streak(&self, session: &mut Session, id: ObjectId) -> Result<()> {
        info!("Resetting streak for student {}", id);
        let result = self
            .students
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": { "current_streak": 0, "longest_streak": 0, "last_completion_date": null },
                    "$inc": { "version": 1 },
                },
            )
            .session(&mut *session)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::msg("Student not found"));
        }
        Ok(())
    }

    pub async fn delete(&self, session: &mut Session, id: ObjectId) -> Result<()> {
        info!("Deleting student: {}", id);
        self.students
            .delete_one(doc! { "_id": id })
            .session(&mut *session)
            .await?;
        Ok(())
    }
}

impl dump::Collection<Student> for StudentStore {
    fn collection(&self) -> &Collection<Student> {
        &self.students
    }
}
