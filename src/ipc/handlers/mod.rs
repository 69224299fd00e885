pub mod classes;
pub mod consents;
pub mod core;
pub mod enrollments;
pub mod logs;
pub mod requests;
pub mod schedules;
pub mod sessions;
pub mod students;
pub mod teachers;
