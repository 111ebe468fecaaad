use std::io::{Cursor, Read, Write as _};

use eyre::{Context, Error};
use log::{info, warn};
use model::session::Session;
use serde::de::DeserializeOwned;
use storage::{
    assignments::AssignmentStore, claims::ClaimStore, dump::Backup as _,
    group_rewards::GroupRewardStore, rewards::RewardStore, students::StudentStore, Storage,
};
use tx_macro::tx;
use zip::write::SimpleFileOptions;

const STUDENTS: &str = "students.json";
const REWARDS: &str = "rewards.json";
const CLAIMS: &str = "reward_claims.json";
const GROUP_REWARDS: &str = "group_rewards.json";
const ASSIGNMENTS: &str = "assignments.json";
const HISTORY: &str = "history.json";

/// Zip-of-JSON snapshot of every collection. The family's whole points
/// economy fits in one small archive, so the dump is a single
/// transaction and restore is all-or-nothing.
#[derive(Clone)]
pub struct Backup {
    students: StudentStore,
    rewards: RewardStore,
    claims: ClaimStore,
    group_rewards: GroupRewardStore,
    assignments: AssignmentStore,
    history: std::sync::Arc<storage::history::HistoryStore>,
}

impl Backup {
    pub fn new(storage: Storage) -> Backup {
        Backup {
            students: storage.students,
            rewards: storage.rewards,
            claims: storage.claims,
            group_rewards: storage.group_rewards,
            assignments: storage.assignments,
            history: storage.history,
        }
    }

    #[tx]
    pub async fn make_backup(&self, session: &mut Session) -> Result<Vec<u8>, Error> {
        info!("Making backup");
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Bzip2)
            .compression_level(Some(9));

        zip.start_file(STUDENTS, options)?;
        zip.write_all(&serde_json::to_vec_pretty(
            &self.students.dump(session).await.context("students")?,
        )?)?;

        zip.start_file(REWARDS, options)?;
        zip.write_all(&serde_json::to_vec_pretty(
            &self.rewards.dump(session).await.context("rewards")?,
        )?)?;

        zip.start_file(CLAIMS, options)?;
        zip.write_all(&serde_json::to_vec_pretty(
            &self.claims.dump(session).await.context("claims")?,
        )?)?;

        zip.start_file(GROUP_REWARDS, options)?;
        zip.write_all(&serde_json::to_vec_pretty(
            &self
                .group_rewards
                .dump(session)
                .await
                .context("group_rewards")?,
        )?)?;

        zip.start_file(ASSIGNMENTS, options)?;
        zip.write_all(&serde_json::to_vec_pretty(
            &self.assignments.dump(session).await.context("assignments")?,
        )?)?;

        zip.start_file(HISTORY, options)?;
        zip.write_all(&serde_json::to_vec_pretty(
            &self.history.dump(session).await.context("history")?,
        )?)?;

        let cursor = zip.finish()?;
        info!("Backup done: {} bytes", cursor.get_ref().len());
        Ok(cursor.into_inner())
    }

    #[tx]
    pub async fn apply_backup(&self, session: &mut Session, dump: Vec<u8>) -> Result<(), Error> {
        info!("Applying backup");
        let mut zip = zip::ZipArchive::new(Cursor::new(dump))?;

        if zip.by_name(STUDENTS).is_ok() {
            let items = read_file(&mut zip, STUDENTS)?;
            self.students.restore(items, session).await.context("students")?;
        } else {
            warn!("No students in backup");
        }

        if zip.by_name(REWARDS).is_ok() {
            let items = read_file(&mut zip, REWARDS)?;
            self.rewards.restore(items, session).await.context("rewards")?;
        } else {
            warn!("No rewards in backup");
        }

        if zip.by_name(CLAIMS).is_ok() {
            let items = read_file(&mut zip, CLAIMS)?;
            self.claims.restore(items, session).await.context("claims")?;
        } else {
            warn!("No claims in backup");
        }

        if zip.by_name(GROUP_REWARDS).is_ok() {
            let items = read_file(&mut zip, GROUP_REWARDS)?;
            self.group_rewards
                .restore(items, session)
                .await
                .context("group_rewards")?;
        } else {
            warn!("No group rewards in backup");
        }

        if zip.by_name(ASSIGNMENTS).is_ok() {
            let items = read_file(&mut zip, ASSIGNMENTS)?;
            self.assignments
                .restore(items, session)
                .await
                .context("assignments")?;
        } else {
            warn!("No assignments in backup");
        }

        if zip.by_name(HISTORY).is_ok() {
            let items = read_file(&mut zip, HISTORY)?;
            self.history.restore(items, session).await.context("history")?;
        } else {
            warn!("No history in backup");
        }

        info!("Backup applied");
        Ok(())
    }
}

fn read_file<T>(zip: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Result<Vec<T>, Error>
where
    T: DeserializeOwned,
{
    let mut file = zip.by_name(name)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let value = serde_json::from_slice(&buf).context(name.to_owned())?;
    Ok(value)
}
