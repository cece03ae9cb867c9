//! Advisory locking and atomic replacement of shared files.
//!
//! Every read-modify-write of a file that the hub or another Kore process
//! may touch goes through [`FileLock`] plus [`write_atomic`].

mod atomic;
mod lock;

pub use atomic::{OWNER_ONLY, write_atomic};
pub use lock::{FileLock, LockError};
