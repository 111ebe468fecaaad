use chrono::{Local, NaiveDate};
use eyre::{eyre, Result};
use log::{info, warn};
use model::{
    assignment::{Assignment, CompletionResult},
    errors::LedgerError,
    session::Session,
    streak::{self, BonusSchedule},
    student::Student,
};
use mongodb::bson::oid::ObjectId;
use storage::{assignments::AssignmentStore, students::StudentStore};
use tx_macro::tx;

use super::history::History;

/// Turns completion events into balance and streak mutations.
/// Completion is a toggle: un-completing reverses exactly the stored
/// `points_earned` and restores the snapshotted streak, nothing is
/// recomputed from today's state.
#[derive(Clone)]
pub struct Assignments {
    store: AssignmentStore,
    students: StudentStore,
    logs: History,
    bonus: BonusSchedule,
}

impl Assignments {
    pub(crate) fn new(store: AssignmentStore, students: StudentStore, logs: History) -> Self {
        Assignments {
            store,
            students,
            logs,
            bonus: BonusSchedule::default(),
        }
    }

    pub async fn get(&self, session: &mut Session, id: ObjectId) -> Result<Option<Assignment>> {
        self.store.get(session, id).await
    }

    pub async fn find_by_student(
        &self,
        session: &mut Session,
        student_id: ObjectId,
    ) -> Result<Vec<Assignment>> {
        self.store.find_by_student(session, student_id).await
    }

    #[tx]
    pub async fn create(
        &self,
        session: &mut Session,
        student_id: ObjectId,
        subject_id: ObjectId,
        name: String,
        due_date: NaiveDate,
        points_base: u32,
        gradable: bool,
    ) -> Result<ObjectId, LedgerError> {
        if points_base == 0 {
            return Err(eyre!("Assignment points must be positive").into());
        }
        self.students
            .get(session, student_id)
            .await?
            .ok_or(LedgerError::StudentNotFound(student_id))?;
        let assignment = Assignment::new(
            student_id, subject_id, name, due_date, points_base, gradable,
        );
        let id = assignment.id;
        self.store.insert(session, assignment).await?;
        Ok(id)
    }

    /// The completion toggle. Calling it with the state the assignment
    /// is already in changes nothing.
    #[tx]
    pub async fn set_completed(
        &self,
        session: &mut Session,
        assignment_id: ObjectId,
        completed: bool,
        grade: Option<u8>,
        completion_date: Option<NaiveDate>,
    ) -> Result<CompletionResult, LedgerError> {
        let mut assignment = self
            .store
            .get(session, assignment_id)
            .await?
            .ok_or(LedgerError::AssignmentNotFound(assignment_id))?;
        let mut student = self
            .students
            .get(session, assignment.student_id)
            .await?
            .ok_or(LedgerError::StudentNotFound(assignment.student_id))?;

        if assignment.completed == completed {
            return Ok(CompletionResult {
                points_awarded: 0,
                current_streak: student.current_streak,
            });
        }

        if completed {
            self.complete(session, &mut assignment, &mut student, grade, completion_date)
                .await
        } else {
            self.uncomplete(session, &mut assignment, &mut student).await
        }
    }

    async fn complete(
        &self,
        session: &mut Session,
        assignment: &mut Assignment,
        student: &mut Student,
        grade: Option<u8>,
        completion_date: Option<NaiveDate>,
    ) -> Result<CompletionResult, LedgerError> {
        let completion_date = completion_date.unwrap_or_else(|| Local::now().date_naive());
        let new_streak = streak::advance(
            student.current_streak,
            student.last_completion_date,
            completion_date,
        );
        let bonus = self.bonus.bonus_percent(new_streak);
        let points = assignment.earned_points(grade, bonus);

        let undo = student.streak_snapshot();
        student.apply_completion(new_streak, completion_date, points);
        self.students.update(session, student).await?;

        assignment.mark_completed(grade, completion_date, points, undo);
        self.store.update(session, assignment).await?;

        info!(
            "Student {} completed assignment {} for {} points (streak {})",
            student.id, assignment.name, points, new_streak
        );
        self.logs
            .complete_assignment(session, student.id, assignment.id, points, new_streak)
            .await?;
        Ok(CompletionResult {
            points_awarded: points,
            current_streak: new_streak,
        })
    }

    async fn uncomplete(
        &self,
        session: &mut Session,
        assignment: &mut Assignment,
        student: &mut Student,
    ) -> Result<CompletionResult, LedgerError> {
        let undo = assignment
            .streak_undo
            .clone()
            .ok_or_else(|| eyre!("Completed assignment {} has no undo snapshot", assignment.id))?;
        let points = assignment.points_earned;

        // The points may already be spent; un-completion still goes
        // through, clamped at zero, and the gap lands in the audit log.
        let shortfall = student.revert_completion(&undo, points);
        if shortfall > 0 {
            warn!(
                "Un-completing assignment {}: {} of {} points already spent",
                assignment.id, shortfall, points
            );
        }
        self.students.update(session, student).await?;

        assignment.mark_incomplete();
        self.store.update(session, assignment).await?;

        self.logs
            .uncomplete_assignment(
                session,
                student.id,
                assignment.id,
                points - shortfall,
                shortfall,
            )
            .await?;
        Ok(CompletionResult {
            points_awarded: 0,
            current_streak: student.current_streak,
        })
    }

    #[tx]
    pub async fn delete(&self, session: &mut Session, id: ObjectId) -> Result<(), LedgerError> {
        self.store.delete(session, id).await?;
        Ok(())
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
}
