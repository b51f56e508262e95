use crate::models::Task;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Frames the client sends over the live update channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientFrame {
    Authorization { token: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LiveEventKind {
    Created,
    Updated,
    Deleted,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LivePayload {
    #[serde(default)]
    pub item: Option<Task>,
}

/// Server push notifying that an item of the collection changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub event: LiveEventKind,
    #[serde(default)]
    pub payload: LivePayload,
}

impl LiveEvent {
    pub fn new(event: LiveEventKind, item: Task) -> Self {
        Self {
            event,
            payload: LivePayload { item: Some(item) },
        }
    }

    pub fn triggers_refresh(&self) -> bool {
        !matches!(self.event, LiveEventKind::Unknown)
    }

    pub fn item_id(&self) -> Option<&str> {
        self.payload.item.as_ref().and_then(|item| item.id.as_deref())
    }
}
