//! Crate-wide error handling
//!
//! Every fallible operation in the simulator returns [`SimResult`]. The
//! helper trait [`SimErrorContext`] replaces bare `?` on I/O results where a
//! path or resource name makes the failure readable.

use std::path::Path;

/// Result type for simulator operations
pub type SimResult<T> = Result<T, SimulationError>;

/// Errors that can occur while configuring, running or persisting a simulation
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unknown type: {specifier}")]
    UnknownType { specifier: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupted data: {reason}")]
    CorruptedData { reason: String },

    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    #[error("{count} work unit(s) panicked in pool '{pool}'")]
    WorkUnitPanicked { pool: String, count: usize },

    #[error("Dispatcher has been shut down")]
    DispatcherShutdown,
}

/// Helper trait for attaching context to I/O failures
pub trait SimErrorContext<T> {
    fn sim_context(self, context: &str) -> SimResult<T>;
}

impl<T> SimErrorContext<T> for Result<T, std::io::Error> {
    fn sim_context(self, context: &str) -> SimResult<T> {
        self.map_err(|e| {
            SimulationError::Io(std::io::Error::new(e.kind(), format!("{}: {}", context, e)))
        })
    }
}

/// Create a configuration error
pub fn config_error(message: impl Into<String>) -> SimulationError {
    SimulationError::Config {
        message: message.into(),
    }
}

/// Create a corrupted data error
pub fn corrupted_data(reason: impl Into<String>) -> SimulationError {
    SimulationError::CorruptedData {
        reason: reason.into(),
    }
}

/// Create a save error for a path
pub fn save_error(path: impl AsRef<Path>, error: impl std::fmt::Display) -> SimulationError {
    SimulationError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("Save failed for {}: {}", path.as_ref().display(), error),
    ))
}

/// Create a load error for a path
pub fn load_error(path: impl AsRef<Path>, error: impl std::fmt::Display) -> SimulationError {
    SimulationError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("Load failed for {}: {}", path.as_ref().display(), error),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_context_keeps_kind() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        match result.sim_context("opening state") {
            Err(SimulationError::Io(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound);
                assert!(e.to_string().contains("opening state"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_display_messages() {
        let err = SimulationError::UnknownType {
            specifier: "FIXED(7".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown type: FIXED(7");
        assert!(config_error("worker count").to_string().contains("worker count"));
    }
}
