use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::BoardMember;
use super::task::{Subtask, Task};
use std::collections::HashMap;

/// A column a board's tasks can sit in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardStatus {
    pub id: String,
    pub name: String,
    pub color: String,
    pub order: i32,
}

impl BoardStatus {
    fn new(id: &str, name: &str, color: &str, order: i32) -> Self {
        BoardStatus {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            order,
        }
    }

    pub fn defaults() -> Vec<BoardStatus> {
        vec![
            BoardStatus::new("todo", "To Do", "from-yellow-500 to-orange-600", 1),
            BoardStatus::new("in-progress", "In Progress", "from-blue-500 to-cyan-600", 2),
            BoardStatus::new("done", "Done", "from-green-500 to-emerald-600", 3),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub board_id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub members: Vec<String>,
    pub custom_statuses: Option<Vec<BoardStatus>>,
    pub created_at: DateTime<Utc>,
}

impl Board {
    pub fn is_member(&self, uid: &str) -> bool {
        self.owner_id == uid || self.members.iter().any(|m| m == uid)
    }

    pub fn is_owner(&self, uid: &str) -> bool {
        self.owner_id == uid
    }

    /// Custom statuses when defined, otherwise the defaults; sorted by order.
    pub fn effective_statuses(&self) -> Vec<BoardStatus> {
        let mut statuses = match &self.custom_statuses {
            Some(custom) if !custom.is_empty() => custom.clone(),
            _ => BoardStatus::defaults(),
        };
        statuses.sort_by_key(|s| s.order);
        statuses
    }

    pub fn has_status(&self, status: &str) -> bool {
        self.effective_statuses().iter().any(|s| s.id == status)
    }

    /// Status new tasks and subtasks start in.
    pub fn initial_status(&self) -> String {
        self.effective_statuses()
            .into_iter()
            .next()
            .map(|s| s.id)
            .unwrap_or_else(|| "todo".to_string())
    }
}

/// Request payload for creating or updating a board.
#[derive(Debug, Deserialize)]
pub struct BoardRequest {
    pub name: String,
    pub description: Option<String>,
    pub custom_statuses: Option<Vec<BoardStatus>>,
}

#[derive(Debug, Deserialize)]
pub struct InviteMemberRequest {
    pub email: String,
}

/// Everything a board view needs on first load.
#[derive(Debug, Serialize)]
pub struct BoardSnapshot {
    pub board: Board,
    pub statuses: Vec<BoardStatus>,
    pub tasks: Vec<Task>,
    pub subtasks: HashMap<String, Vec<Subtask>>,
    pub members: Vec<BoardMember>,
}
