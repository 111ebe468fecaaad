use model::{errors::LedgerError, session::Session, student::Student};
use mongodb::bson::oid::ObjectId;
use service::assignments::Assignments;
use service::backup::Backup;
use service::claims::Claims;
use service::group_rewards::GroupRewards;
use service::history::History;
use service::rewards::Rewards;
use service::students::Students;
use storage::session::Db;
use storage::Storage;
use tx_macro::tx;

pub mod service;

/// The points economy engine. Every mutation of wallets, allocations,
/// claims, pools and assignment points goes through the services here;
/// nothing outside reads-modifies-writes those fields directly.
#[derive(Clone)]
pub struct Ledger {
    pub db: Db,
    pub students: Students,
    pub rewards: Rewards,
    pub claims: Claims,
    pub group_rewards: GroupRewards,
    pub assignments: Assignments,
    pub history: History,
    pub backup: Backup,
}

impl Ledger {
    pub fn new(storage: Storage) -> Self {
        let history = History::new(storage.history.clone());
        let students = Students::new(
            storage.students.clone(),
            storage.rewards.clone(),
            history.clone(),
        );
        let rewards = Rewards::new(storage.rewards.clone(), history.clone());
        let claims = Claims::new(
            storage.claims.clone(),
            storage.students.clone(),
            storage.rewards.clone(),
            history.clone(),
        );
        let group_rewards = GroupRewards::new(
            storage.group_rewards.clone(),
            storage.students.clone(),
            history.clone(),
        );
        let assignments = Assignments::new(
            storage.assignments.clone(),
            storage.students.clone(),
            history.clone(),
        );
        let backup = Backup::new(storage.clone());
        Ledger {
            db: storage.db,
            students,
            rewards,
            claims,
            group_rewards,
            assignments,
            history,
            backup,
        }
    }

    pub async fn get_student(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Student, LedgerError> {
        self.students
            .get(session, id)
            .await?
            .ok_or(LedgerError::StudentNotFound(id))
    }

    /// Removes a student and everything tied to them: claims,
    /// assignments and group-pool contribution entries, in one
    /// transaction.
    #[tx]
    pub async fn delete_student(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<(), LedgerError> {
        let student = self.get_student(session, id).await?;
        self.claims.delete_by_student(session, id).await?;
        self.assignments.delete_by_student(session, id).await?;
        self.group_rewards.strip_student(session, id).await?;
        self.students.delete_record(session, student.id).await?;
        self.history.delete_student(session, id).await?;
        Ok(())
    }
}
