//! Error types for the vboxexport core library.

use std::path::PathBuf;

/// Failure reported by a [`Driver`](crate::driver::Driver) command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// The VBoxManage binary could not be started.
    #[error("failed to launch '{}': {message}", program.display())]
    Spawn { program: PathBuf, message: String },

    /// VBoxManage ran and exited unsuccessfully.
    #[error("VBoxManage error: {stderr}")]
    Command { status: Option<i32>, stderr: String },
}

impl DriverError {
    /// Create a spawn error for the given program.
    pub fn spawn(program: impl Into<PathBuf>, source: &std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            message: source.to_string(),
        }
    }

    /// Create a command error from an exit status and stderr output.
    pub fn command(status: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::Command {
            status,
            stderr: stderr.into(),
        }
    }
}

/// The main error type for build steps.
///
/// `Clone` so a halting step can both store it in the build state and carry it
/// in [`StepAction::Halt`](crate::step::StepAction::Halt).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Every attempt to delete the SSH forwarding rule failed.
    #[error("Error deleting port forwarding rule: {source}")]
    DeleteForward { source: DriverError },

    /// The export command failed.
    #[error("Error exporting virtual machine: {source}")]
    Export { source: DriverError },

    /// A value an earlier step should have produced is missing.
    #[error("Missing build state: {message}")]
    MissingState { message: String },

    /// Step configuration was rejected before the build started.
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

/// Result of a driver command.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// A specialized Result type for build step operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error for a failed forwarding rule deletion.
    pub fn delete_forward(source: DriverError) -> Self {
        Self::DeleteForward { source }
    }

    /// Create an error for a failed export.
    pub fn export(source: DriverError) -> Self {
        Self::Export { source }
    }

    /// Create a missing state error.
    pub fn missing_state(message: impl Into<String>) -> Self {
        Self::MissingState {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
