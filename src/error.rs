//! # Error Types
//!
//! Startup failures are [`ConfigError`] and abort before the scheduler runs.
//! [`TransportError`] is transient: tasks count and log it, then carry on.

use core::fmt;

/// Misconfiguration detected before scheduling begins.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A task with this name is already registered.
    DuplicateTaskName(&'static str),
    /// The task table already holds `MAX_TASKS` entries.
    TaskTableFull,
    /// The host sent something other than the readiness line.
    HandshakeMismatch,
    /// The setpoint line was not a decimal integer.
    InvalidSetpoint,
    /// The gain line was not a decimal number.
    InvalidGain,
    /// The transport failed while the handshake was in progress.
    Transport(TransportError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DuplicateTaskName(name) => {
                write!(f, "task name '{}' registered twice", name)
            }
            ConfigError::TaskTableFull => write!(f, "task table is full"),
            ConfigError::HandshakeMismatch => write!(f, "expected readiness line from host"),
            ConfigError::InvalidSetpoint => write!(f, "setpoint is not a decimal integer"),
            ConfigError::InvalidGain => write!(f, "gain is not a decimal number"),
            ConfigError::Transport(err) => write!(f, "handshake transport failure: {}", err),
        }
    }
}

impl From<TransportError> for ConfigError {
    fn from(err: TransportError) -> Self {
        ConfigError::Transport(err)
    }
}

/// Serial transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The peer is gone or no more input will arrive.
    Closed,
    /// A received line did not fit the supplied buffer.
    LineTooLong,
    /// Hardware-level error (framing, overrun, noise).
    Io,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => write!(f, "transport closed"),
            TransportError::LineTooLong => write!(f, "line exceeds receive buffer"),
            TransportError::Io => write!(f, "transport I/O error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_display_names_the_task() {
        let err = ConfigError::DuplicateTaskName("control");
        assert_eq!(err.to_string(), "task name 'control' registered twice");
    }

    #[test]
    fn test_transport_error_converts() {
        let err: ConfigError = TransportError::Closed.into();
        assert_eq!(err, ConfigError::Transport(TransportError::Closed));
        assert_eq!(err.to_string(), "handshake transport failure: transport closed");
    }
}
