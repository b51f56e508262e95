//! Taskdeck - offline-aware task list client
//!
//! This crate provides a unified API over the task state manager.
//!
//! # Example
//!
//! ```ignore
//! use taskdeck::{ClientConfig, SessionToken, TaskClient, TaskDraft};
//!
//! let client = TaskClient::start(ClientConfig::from_env()?, SessionToken::anonymous()).await?;
//! client.tasks().add_task(TaskDraft::new("Buy milk")).await?;
//! let mut updates = client.tasks().subscribe();
//! ```

// Re-export client types
pub use taskdeck_client::{
    ClientConfig, ClientError, ClientResult, ConnectivityHandle, ConnectivityStatus, FetchStatus,
    ReplayOutcome, SaveStatus, SessionToken, TaskClient, TaskManagerHandle, TaskState,
};

// Re-export core types that embedding applications need
pub use taskdeck_core::errors::{TaskError, TaskResult};
pub use taskdeck_core::models::{PendingAction, PendingOperation, Task, TaskDraft};
pub use taskdeck_core::protocol::{LiveEvent, LiveEventKind};
