//! Race replay CLI library.
//!
//! Split from the binary so integration tests can exercise the argument
//! and configuration surface directly.

pub mod cli;
pub mod commands;
pub mod config;
pub mod input;

pub use cli::{Cli, Commands};
pub use config::Config;
