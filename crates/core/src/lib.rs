//! Core domain types, errors, and constants for `taskmill`.
//!
//! ## Key Components
//!
//! - **`errors`**: the primary `Error` enum and `Result` alias shared by every
//!   crate in the workspace.
//! - **`kind`**: `ErrorKind` and the pure `classify` function that maps an
//!   error to the category used for remediation.
//! - **`types`**: small shared enums such as `FailurePolicy`.
//! - **`constants`**: environment variable names and defaults.

pub mod constants;
pub mod errors;
pub mod kind;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result, ResultExt},
    kind::{classify, ErrorKind},
    types::*,
};
