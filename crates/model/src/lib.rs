pub mod assignment;
pub mod claim;
pub mod errors;
pub mod group;
pub mod history;
pub mod reward;
pub mod session;
pub mod streak;
pub mod student;
