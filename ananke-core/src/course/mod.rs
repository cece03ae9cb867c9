//! Course identity, per-course state and the `info.json` descriptor.

mod identity;
mod info;
mod state;

pub use identity::{
    CourseIdentity, IdentityError, course_id_for, hub_base_path,
    is_valid_account_name,
};
pub use info::CourseInfo;
pub use state::CourseState;
