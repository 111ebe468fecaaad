use bson::to_document;
use eyre::{Error, Result};
use futures_util::stream::TryStreamExt;
use log::info;
use model::{assignment::Assignment, session::Session};
use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection, Database, IndexModel,
};

use crate::dump;

const COLLECTION: &str = "assignments";

#[derive(Clone)]
pub struct AssignmentStore {
    assignments: Collection<Assignment>,
}

impl AssignmentStore {
    pub(crate) async fn new(db: &Database) -> Result<Self> {
        let assignments = db.collection(COLLECTION);
        assignments
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "student_id": 1, "due_date": 1 })
                    .build(),
            )
            .await?;
        Ok(AssignmentStore { assignments })
    }

    pub async fn get(&self, session: &mut Session, id: ObjectId) -> Result<Option<Assignment>> {
        Ok(self
            .assignments
            .find_one(doc! { "_id": id })
            .session(&mut *session)
            .await?)
    }

    pub async fn find_by_student(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<Vec<Assignment>> {
        let mut cursor = self
            .assignments
            .find(doc! { "student_id": student_id })
            .sort(doc! { "due_date": 1 })
            .session(&mut *session)
            .await?;
        Ok(cursor.stream(&mut *session).try_collect().await?)
    }

    pub async fn insert(&self, session: &mut Session, assignment: Assignment) -> Result<()> {
        info!("Inserting assignment: {:?}", assignment);
        self.assignments
            .insert_one(assignment)
            .session(&mut *session)
            .await?;
        Ok(())
    }

    pub async fn update(&self, session: &mut Session, assignment: &mut Assignment) -> Result<()> {
        assignment.version += 1;
        let result = self
            .assignments
            .update_one(
                doc! { "_id": assignment.id },
                doc! { "$set": to_document(assignment)? },
            )
            .session(&mut *session)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::msg("Assignment not found"));
        }
        Ok(())
    }

    pub async fn delete(&self, session: &mut Session, id: ObjectId) -> Result<()> {
        info!("Deleting assignment: {}", id);
        self.assignments
            .delete_one(doc! { "_id": id })
            .session(&mut *session)
            .await?;
        Ok(())
    }

    pub async fn delete_by_student(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<u64> {
        info!("Deleting assignments for student: {}", student_id);
        let result = self
            .assignments
            .delete_many(doc! { "student_id": student_id })
            .session(&mut *session)
            .await?;
        Ok(result.deleted_count)
    }
}

impl dump::Collection<Assignment> for AssignmentStore {
    fn collection(&self) -> &Collection<Assignment> {
        &self.assignments
    }
}
