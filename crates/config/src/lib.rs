//! Configuration for taskmill
//!
//! Settings are layered: built-in defaults, then a JSON file, then
//! `TASKMILL_*` environment variables, then command line overrides. The
//! loader records which layer supplied each setting.

pub mod loader;
pub mod settings;

pub use loader::*;
pub use settings::*;
