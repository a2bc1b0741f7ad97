//! Batched, deferred soft deletion of short links
//!
//! [`DeletionCoordinator`] accepts delete requests from callers, applies
//! them to the repository on a fixed interval, and writes whatever is
//! still unapplied at shutdown to a [`FallbackLog`].

mod coordinator;
mod fallback;

pub use coordinator::{DeletionCoordinator, ShutdownReport};
pub use fallback::{FallbackLog, apply_fallback_log, read_fallback_log};
