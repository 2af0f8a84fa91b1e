//! Command-line front end for taskmill
//!
//! `taskmill run` feeds a JSON batch of commands through the scheduler, the
//! result cache and the retry layer. `taskmill cache` and `taskmill config`
//! inspect the state those layers work with.

pub mod commands;

pub use commands::{Commands, GlobalArgs};
