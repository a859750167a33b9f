//! Command-line interface for pipework
//!
//! clap derive for the command tree, `tracing-subscriber` for logs, and
//! [`Output`] for everything printed to the terminal.

pub mod commands;
pub mod output;

pub use commands::Cli;
pub use output::{Output, OutputFormat};
