use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub board_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
    pub owner_id: String,
    pub assignee_id: Option<String>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A child unit of work. Same shape as a task, minus the description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub subtask_id: String,
    pub task_id: String,
    pub board_id: String,
    pub title: String,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
    pub owner_id: String,
    pub assignee_id: Option<String>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<String>,
    pub remark: Option<String>,
}

/// Partial update. An explicit `null` clears an optional field.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub assignee_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub remark: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubtaskRequest {
    pub title: String,
    pub status: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSubtaskRequest {
    pub title: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub assignee_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub remark: Option<Option<String>>,
}

/// Drag-and-drop column move.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assignee_id: Option<String>,
}
