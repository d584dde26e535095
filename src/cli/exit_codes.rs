//! CLI Exit Codes
//!
//! Exit codes for the poller, so a scheduler or monitoring agent can act on
//! the outcome without parsing output.

use crate::config::ConfigError;
use crate::core::arbitration::BrokerError;
use crate::core::transport::TransportError;
use crate::core::walker::PollError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 2;

    /// Broker not reachable or refused the grant
    pub const BROKER_UNAVAILABLE: u8 = 3;

    /// No sender card answered
    pub const DEVICE_NOT_FOUND: u8 = 4;

    /// Fewer devices or receivers than expected, or a port aborted
    pub const PARTIAL_TOPOLOGY: u8 = 5;

    /// Serial transport failure
    pub const TRANSPORT_ERROR: u8 = 6;

    /// Every code, ascending
    pub const ALL: [u8; 7] = [
        Self::SUCCESS,
        Self::ERROR,
        Self::CONFIG_ERROR,
        Self::BROKER_UNAVAILABLE,
        Self::DEVICE_NOT_FOUND,
        Self::PARTIAL_TOPOLOGY,
        Self::TRANSPORT_ERROR,
    ];
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Error with a code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) => Some(msg),
            Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<PollError> for CliResult {
    fn from(err: PollError) -> Self {
        let code = match err {
            PollError::DeviceNotFound => ExitCodes::DEVICE_NOT_FOUND,
            PollError::PartialTopology(_) => ExitCodes::PARTIAL_TOPOLOGY,
            PollError::Transport(_) | PollError::TransportUnavailable { .. } => {
                ExitCodes::TRANSPORT_ERROR
            }
            PollError::Status { .. } => ExitCodes::ERROR,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<TransportError> for CliResult {
    fn from(err: TransportError) -> Self {
        Self::Error(ExitCodes::TRANSPORT_ERROR, err.to_string())
    }
}

impl From<BrokerError> for CliResult {
    fn from(err: BrokerError) -> Self {
        Self::Error(ExitCodes::BROKER_UNAVAILABLE, err.to_string())
    }
}

impl From<ConfigError> for CliResult {
    fn from(err: ConfigError) -> Self {
        Self::Error(ExitCodes::CONFIG_ERROR, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Configuration error",
        3 => "Broker unavailable",
        4 => "Device not found",
        5 => "Partial topology",
        6 => "Transport error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in ExitCodes::ALL {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);

        let error = CliResult::error(ExitCodes::BROKER_UNAVAILABLE, "no broker");
        assert!(!error.is_success());
        assert_eq!(error.code(), 3);
        assert_eq!(error.message(), Some("no broker"));
    }

    #[test]
    fn test_from_poll_error() {
        assert_eq!(CliResult::from(PollError::DeviceNotFound).code(), ExitCodes::DEVICE_NOT_FOUND);
        let partial = CliResult::from(PollError::PartialTopology("1 of 2 devices".into()));
        assert_eq!(partial.code(), ExitCodes::PARTIAL_TOPOLOGY);
        let io = PollError::Transport(TransportError::NotOpen);
        assert_eq!(CliResult::from(io).code(), ExitCodes::TRANSPORT_ERROR);
    }

    #[test]
    fn test_descriptions_cover_table() {
        for code in ExitCodes::ALL {
            assert_ne!(exit_code_description(code), "Unknown error");
        }
    }
}
