pub mod assignments;
pub mod backup;
pub mod claims;
pub mod group_rewards;
pub mod history;
pub mod rewards;
pub mod students;
