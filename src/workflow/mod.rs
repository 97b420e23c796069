//! Provisioning workflows.
//!
//! `create` and `init` each build a static step list for the detected mode,
//! run it through the sequencer, then hand off to the shared finisher.
mod create;
mod finish;
mod init;
mod plan;

#[cfg(test)]
pub(crate) mod testing;

pub use create::run_create;
pub use init::run_init;
