pub mod approvals;
pub mod attendance;
pub mod core;
pub mod export;
pub mod import;
pub mod students;
pub mod teachers;
