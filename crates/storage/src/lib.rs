pub mod assignments;
pub mod claims;
pub mod dump;
pub mod group_rewards;
pub mod history;
pub mod rewards;
pub mod session;
pub mod students;

use assignments::AssignmentStore;
use claims::ClaimStore;
use eyre::Result;
use group_rewards::GroupRewardStore;
use history::HistoryStore;
use rewards::RewardStore;
use session::Db;
use students::StudentStore;

const DB_NAME: &str = "points_db";

#[derive(Clone)]
pub struct Storage {
    pub db: Db,
    pub students: StudentStore,
    pub rewards: RewardStore,
    pub claims: ClaimStore,
    pub group_rewards: GroupRewardStore,
    pub assignments: AssignmentStore,
    pub history: std::sync::Arc<HistoryStore>,
}

impl Storage {
    pub async fn new(uri: &str) -> Result<Self> {
        let db = Db::new(uri, DB_NAME).await?;
        let students = StudentStore::new(&db).await?;
        let rewards = RewardStore::new(&db);
        let claims = ClaimStore::new(&db).await?;
        let group_rewards = GroupRewardStore::new(&db);
        let assignments = AssignmentStore::new(&db).await?;
        let history = std::sync::Arc::new(HistoryStore::new(&db).await?);

        Ok(Storage {
            db,
            students,
            rewards,
            claims,
            group_rewards,
            assignments,
            history,
        })
    }
}
