use taskdeck_core::TaskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal channel closed")]
    ChannelClosed,
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

impl From<ClientError> for TaskError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) if e.is_decode() => TaskError::Serialization(e.to_string()),
            ClientError::Http(e) => TaskError::Network(e.to_string()),
            ClientError::Status { status, body } => TaskError::Rejected {
                status: status.as_u16(),
                message: body,
            },
            ClientError::Cancelled => TaskError::Cancelled,
            ClientError::Database(e) => TaskError::Storage(e.to_string()),
            ClientError::Migration(e) => TaskError::Storage(e.to_string()),
            ClientError::Serialization(e) => TaskError::Serialization(e.to_string()),
            ClientError::WebSocket(e) => TaskError::Channel(e.to_string()),
            ClientError::InvalidState(message) | ClientError::Config(message) => {
                TaskError::InvalidOperation(message)
            }
            ClientError::ChannelClosed => TaskError::Channel("internal channel closed".into()),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
