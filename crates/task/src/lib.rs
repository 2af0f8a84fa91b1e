//! Batch execution for taskmill
//!
//! A [`TaskScheduler`] runs a batch of independent [`WorkUnit`]s with at most
//! N executing at once, consults a [`taskmill_cache::ResultCache`] by each
//! unit's fingerprint, and returns a [`BatchResult`] aligned with the
//! submission order.

pub mod batch;
pub mod config;
pub mod fingerprint;
pub mod scheduler;
pub mod unit;

pub use batch::{BatchResult, SlotReport};
pub use config::SchedulerConfig;
pub use fingerprint::fingerprint;
pub use scheduler::TaskScheduler;
pub use unit::WorkUnit;
