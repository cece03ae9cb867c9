//! LTI 1.3 launch claims.

mod claims;

pub use claims::{LaunchClaims, LaunchRole, claim};
