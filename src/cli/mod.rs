//! CLI Module
//!
//! Exit codes shared by the `ledwatch` and `ledwatch-broker` binaries.

pub mod exit_codes;

pub use exit_codes::{exit_code_description, print_exit_codes, CliResult, ExitCodes};
