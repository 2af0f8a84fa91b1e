//! Shared utilities for taskmill
//!
//! Atomic snapshot writes, XDG path resolution, tracing setup, and the
//! resilience layer (`RetryingExecutor`) used to wrap fallible operations.

pub mod atomic_file;
pub mod resilience;
pub mod tracing;
pub mod xdg;

pub use atomic_file::*;
pub use resilience::*;
pub use xdg::*;
