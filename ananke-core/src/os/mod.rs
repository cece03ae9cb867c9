//! OS side effects as data.
//!
//! Account management, permission changes and extension toggles are built
//! as [`CommandSpec`] values by [`ops`] and executed by a [`CommandRunner`].
//! Production uses [`SystemRunner`]; tests swap in
//! [`testing::RecordingRunner`].

mod command;
pub mod ops;
mod runner;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use command::CommandSpec;
pub use runner::{CommandOutput, CommandRunner, OsError, SystemRunner};
