pub mod achievement;
pub mod analytics;
pub mod assessment;
pub mod learning;
pub mod student;
pub mod user;
