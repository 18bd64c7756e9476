//! Error types for the workflow engine

use thiserror::Error;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while validating or executing a workflow
#[derive(Debug, Error)]
pub enum EngineError {
    /// The graph is not a DAG; detected before any node executes
    #[error("Workflow contains a cycle and cannot be executed")]
    Cycle,

    /// The graph failed a structural check, such as duplicate node ids
    #[error("Invalid workflow graph: {0}")]
    InvalidGraph(String),

    /// No processor is registered for a node type
    #[error("No processor registered for node type '{0}'")]
    UnknownNodeType(String),

    /// A node's configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required input
    #[error("Required input '{port}' is missing")]
    MissingInput { port: String },

    /// An outbound call failed or returned an unusable response
    #[error("External call failed: {0}")]
    ExternalCall(String),

    /// A user-supplied expression failed to parse or evaluate
    #[error("Expression evaluation failed: {0}")]
    Evaluation(String),

    /// A run is already in progress on this controller
    #[error("A run is already in progress")]
    AlreadyRunning,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Create a configuration error with a message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an evaluation error with a message
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Create an external-call error with a message
    pub fn external_call(msg: impl Into<String>) -> Self {
        Self::ExternalCall(msg.into())
    }

    /// Create a missing-input error for the given handle
    pub fn missing_input(port: impl Into<String>) -> Self {
        Self::MissingInput { port: port.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            EngineError::UnknownNodeType("mystery".to_string()).to_string(),
            "No processor registered for node type 'mystery'"
        );
        assert_eq!(
            EngineError::missing_input("default").to_string(),
            "Required input 'default' is missing"
        );
        assert_eq!(
            EngineError::Cycle.to_string(),
            "Workflow contains a cycle and cannot be executed"
        );
    }

    #[test]
    fn test_serde_error_converts() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json");
        let err: EngineError = bad.unwrap_err().into();
        assert!(matches!(err, EngineError::Serialization(_)));
    }
}
