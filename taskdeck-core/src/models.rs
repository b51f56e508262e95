use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use uuid::Uuid;

/// Prefix carried by every identifier synthesized on the client.
pub const LOCAL_ID_PREFIX: &str = "local-";

pub fn new_local_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4())
}

pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PendingAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(
        rename = "_id",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    /// Base64 payload or URI produced by the camera collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_action: Option<PendingAction>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_local_only: bool,
}

impl Task {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: text.into(),
            ..Default::default()
        }
    }

    /// Identifier issued by the server, if any. Local ids are not server ids.
    pub fn server_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty() && !is_local_id(id))
    }

    pub fn has_server_id(&self) -> bool {
        self.server_id().is_some()
    }

    pub fn draft(&self) -> TaskDraft {
        TaskDraft {
            text: self.text.clone(),
            description: self.description.clone(),
            amount: self.amount,
            date: self.date.clone(),
            is_completed: self.is_completed,
            photo: self.photo.clone(),
            lat: self.lat,
            lng: self.lng,
        }
    }

    /// A task the server has never seen, created from a draft whose POST failed.
    pub fn local_from_draft(draft: TaskDraft) -> Self {
        Self {
            id: Some(new_local_id()),
            pending_action: Some(PendingAction::Create),
            is_local_only: true,
            ..Task::from(draft)
        }
    }

    /// Marks an edit that could not reach the server.
    pub fn with_pending_update(self) -> Self {
        let is_local_only = !self.has_server_id();
        Self {
            pending_action: Some(PendingAction::Update),
            is_local_only,
            ..self
        }
    }

    /// Copy with client bookkeeping stripped, as sent to the server.
    pub fn without_local_state(&self) -> Self {
        Self {
            pending_action: None,
            is_local_only: false,
            ..self.clone()
        }
    }
}

impl From<TaskDraft> for Task {
    fn from(draft: TaskDraft) -> Self {
        Self {
            id: None,
            text: draft.text,
            description: draft.description,
            amount: draft.amount,
            date: draft.date,
            is_completed: draft.is_completed,
            photo: draft.photo,
            lat: draft.lat,
            lng: draft.lng,
            pending_action: None,
            is_local_only: false,
        }
    }
}

/// Creation payload posted to the collection endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl TaskDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A mutation that could not reach the server, waiting for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingOperation {
    Create { task: Task },
    Update { task: Task },
    Delete { id: String },
}

impl PendingOperation {
    pub fn action(&self) -> PendingAction {
        match self {
            PendingOperation::Create { .. } => PendingAction::Create,
            PendingOperation::Update { .. } => PendingAction::Update,
            PendingOperation::Delete { .. } => PendingAction::Delete,
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            PendingOperation::Create { task } | PendingOperation::Update { task } => {
                task.id.as_deref()
            }
            PendingOperation::Delete { id } => Some(id.as_str()),
        }
    }
}

/// Last successfully observed page, mirrored to durable storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedPage {
    pub tasks: Vec<Task>,
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl CachedPage {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Lenient decoding of whatever was stored under the cache key.
    ///
    /// A bare array is an older layout and maps to `offset: 0`. Fields with the
    /// wrong type fall back to their defaults and undecodable tasks are dropped.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Self {
                tasks: decode_tasks(items),
                offset: 0,
                total: None,
            },
            Value::Object(mut map) => {
                let tasks = match map.remove("tasks") {
                    Some(Value::Array(items)) => decode_tasks(items),
                    _ => Vec::new(),
                };
                let offset = map
                    .get("offset")
                    .and_then(Value::as_u64)
                    .map(|offset| offset as usize)
                    .unwrap_or(0);
                let total = map
                    .get("total")
                    .and_then(Value::as_u64)
                    .map(|total| total as usize);
                Self {
                    tasks,
                    offset,
                    total,
                }
            }
            _ => Self::default(),
        }
    }
}

fn decode_tasks(items: Vec<Value>) -> Vec<Task> {
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_wire_format() {
        let task: Task = serde_json::from_value(json!({
            "_id": "srv-1",
            "text": "Buy milk",
            "amount": 2.5,
            "isCompleted": true,
            "lat": 46.77,
            "lng": 23.59
        }))
        .unwrap();

        assert_eq!(task.id.as_deref(), Some("srv-1"));
        assert_eq!(task.is_completed, Some(true));
        assert!(!task.is_local_only);

        let encoded = serde_json::to_value(&task).unwrap();
        assert_eq!(encoded["_id"], "srv-1");
        assert_eq!(encoded["isCompleted"], true);
        assert!(encoded.get("pendingAction").is_none());
        assert!(encoded.get("isLocalOnly").is_none());
        assert!(encoded.get("description").is_none());
    }

    #[test]
    fn test_task_accepts_plain_id_alias() {
        let task: Task = serde_json::from_value(json!({"id": "7", "text": "x"})).unwrap();
        assert_eq!(task.id.as_deref(), Some("7"));
    }

    #[test]
    fn test_local_task_from_draft() {
        let task = Task::local_from_draft(TaskDraft::new("A").with_description("offline"));

        let id = task.id.clone().unwrap();
        assert!(is_local_id(&id));
        assert!(task.is_local_only);
        assert_eq!(task.pending_action, Some(PendingAction::Create));
        assert_eq!(task.server_id(), None);
        assert_eq!(task.description.as_deref(), Some("offline"));

        let encoded = serde_json::to_value(&task).unwrap();
        assert_eq!(encoded["pendingAction"], "create");
        assert_eq!(encoded["isLocalOnly"], true);
    }

    #[test]
    fn test_pending_update_keeps_server_identity() {
        let server_task = Task::new("srv-1", "Edit me").with_pending_update();
        assert!(!server_task.is_local_only);
        assert_eq!(server_task.pending_action, Some(PendingAction::Update));

        let unsaved = Task {
            id: None,
            text: "never saved".into(),
            ..Default::default()
        }
        .with_pending_update();
        assert!(unsaved.is_local_only);

        let local = Task::local_from_draft(TaskDraft::new("draft")).with_pending_update();
        assert!(local.is_local_only);
    }

    #[test]
    fn test_pending_operation_tags() {
        let op = PendingOperation::Delete { id: "srv-9".into() };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"type": "delete", "id": "srv-9"})
        );
        assert_eq!(op.action(), PendingAction::Delete);
        assert_eq!(op.task_id(), Some("srv-9"));

        let create: PendingOperation = serde_json::from_value(json!({
            "type": "create",
            "task": {"_id": "local-1", "text": "A", "isLocalOnly": true}
        }))
        .unwrap();
        assert_eq!(create.action(), PendingAction::Create);
        assert_eq!(create.task_id(), Some("local-1"));
        assert_eq!(PendingAction::Update.to_string(), "update");
    }

    #[test]
    fn test_cached_page_legacy_array() {
        let page = CachedPage::from_value(json!([
            {"_id": "1", "text": "one"},
            {"_id": "2", "text": "two"}
        ]));
        assert_eq!(page.tasks.len(), 2);
        assert_eq!(page.offset, 0);
        assert_eq!(page.total, None);
    }

    #[test]
    fn test_cached_page_tolerates_wrong_types() {
        let page = CachedPage::from_value(json!({
            "tasks": "not a list",
            "offset": "7",
            "total": null
        }));
        assert_eq!(page, CachedPage::default());

        let page = CachedPage::from_value(json!({
            "tasks": [{"_id": "1", "text": "ok"}, 42],
            "offset": 14,
            "total": 30
        }));
        assert_eq!(page.tasks.len(), 1);
        assert_eq!(page.offset, 14);
        assert_eq!(page.total, Some(30));

        assert_eq!(CachedPage::from_value(json!("garbage")), CachedPage::default());
    }
}
