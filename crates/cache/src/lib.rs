//! Persistent result cache for taskmill
//!
//! [`ResultCache`] memoizes the outcome of expensive or rate-limited work
//! across process runs. Entries expire after a TTL, the store is trimmed to
//! 80% of its capacity when it overflows, and the whole store is written as
//! one JSON snapshot after every mutation.

pub mod cache;
pub mod config;
pub mod entry;
pub mod errors;
pub mod stats;
pub mod store;
mod writer;

pub use cache::ResultCache;
pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use errors::{CacheError, Result};
pub use stats::CacheStats;
pub use store::{trim_target, CacheStore, SweepReport};
