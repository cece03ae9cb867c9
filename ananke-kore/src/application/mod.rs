pub mod catalog;
pub mod courses;

pub use catalog::CourseList;
pub use courses::{CourseError, CourseManager, DeleteReport, ResetReport};
