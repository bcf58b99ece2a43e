//! Runtime error types

use parley_core::{ChatResponse, CoreError};
use thiserror::Error;

/// Errors raised while folding a generation's events into a message.
#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Malformed stream: {0}")]
    MalformedStream(String),

    /// The message was still finished; `response` holds it.
    #[error("Premature termination: stream finished while tool call {call_id} was {phase}")]
    PrematureTermination {
        call_id: String,
        phase: &'static str,
        response: Box<ChatResponse>,
    },
}

impl AssemblerError {
    /// Whether this error halts the assembler for the rest of the message.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            AssemblerError::InvalidState(_) | AssemblerError::MalformedStream(_)
        )
    }
}

impl From<CoreError> for AssemblerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidState(msg) => AssemblerError::InvalidState(msg),
            other => AssemblerError::MalformedStream(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Assembler(#[from] AssemblerError),

    #[error("Model source error: {0}")]
    Source(String),

    #[error("Conversation store error: {0}")]
    Store(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_invalid_state_maps_to_invalid_state() {
        let err = AssemblerError::from(CoreError::InvalidState("finished".to_string()));
        assert!(matches!(err, AssemblerError::InvalidState(_)));
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn test_core_integrity_maps_to_malformed_stream() {
        let err = AssemblerError::from(CoreError::Integrity {
            result_id: "r".to_string(),
            call_id: "c".to_string(),
        });
        assert!(matches!(err, AssemblerError::MalformedStream(_)));
    }

    #[test]
    fn test_runtime_error_display() {
        assert_eq!(RuntimeError::Cancelled.to_string(), "Generation cancelled");
        let err = RuntimeError::from(AssemblerError::MalformedStream("bad".to_string()));
        assert_eq!(err.to_string(), "Malformed stream: bad");
    }
}
