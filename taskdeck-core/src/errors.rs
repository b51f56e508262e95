use thiserror::Error;

/// Domain-level failure recorded in task state.
///
/// Payloads are plain strings so the error can be cloned into every state
/// snapshot handed to observers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Live channel error: {0}")]
    Channel(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        TaskError::Serialization(err.to_string())
    }
}

pub type TaskResult<T> = Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display() {
        let err = TaskError::Rejected {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Request rejected with status 500: boom");
    }
}
