//! System-level modules
//!
//! - Logging setup
//! - Signal-driven shutdown of the deletion pipeline

pub mod logging;
pub mod shutdown;

pub use logging::init_logging;
pub use shutdown::{shutdown_on, wait_for_signal};
