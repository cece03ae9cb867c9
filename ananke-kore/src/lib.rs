//! # Ananke Kore
//!
//! Management service of an Ananke hub. Kore receives the hub's post-login
//! hook, runs course reconciliation and schedules hub restarts, and serves
//! the instructor tools: course import, backup, reset and deletion, title
//! lookup and grade push to the LMS.

pub mod application;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
