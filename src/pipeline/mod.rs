//! Sync pipeline.
//!
//! - `diff`: snapshot comparison
//! - `guard`: non-overlapping run flag
//! - `sync`: one full synchronization run
//! - `schedule`: periodic trigger

pub mod diff;
pub mod guard;
pub mod schedule;
pub mod sync;

pub use diff::compare;
pub use guard::{RunGuard, RunPermit};
pub use schedule::run_periodic;
pub use sync::SyncEngine;
