//! Document store abstraction.
//!
//! Handlers only talk to [`Store`]. `MongoStore` backs production,
//! `MemoryStore` backs local development and the test suite.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::board::Board;
use crate::models::task::{Subtask, Task};
use crate::models::user::User;

pub type StoreResult<T> = Result<T, StoreError>;

/// Per-user read and dismissed marks for computed notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationState {
    pub user_id: String,
    pub read: Vec<String>,
    pub dismissed: Vec<String>,
}

impl NotificationState {
    pub fn empty(user_id: &str) -> Self {
        NotificationState {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }
}

/// Records listed in creation order.
pub trait Created {
    fn created_at(&self) -> DateTime<Utc>;
}

impl Created for Board {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Created for Task {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Created for Subtask {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Stable sort by creation time. Timestamps are stored as RFC3339 strings of
/// varying fractional width, so the database's string order is not used.
pub fn oldest_first<T: Created>(mut items: Vec<T>) -> Vec<T> {
    items.sort_by_key(|item| item.created_at());
    items
}

#[async_trait]
pub trait Store: Send + Sync {
    // users
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user(&self, user_id: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_users(&self, user_ids: &[String]) -> StoreResult<Vec<User>>;
    async fn update_user(&self, user: &User) -> StoreResult<()>;

    // boards
    async fn insert_board(&self, board: &Board) -> StoreResult<()>;
    async fn find_board(&self, board_id: &str) -> StoreResult<Option<Board>>;
    async fn find_boards(&self, board_ids: &[String]) -> StoreResult<Vec<Board>>;
    async fn list_boards_for_member(&self, user_id: &str) -> StoreResult<Vec<Board>>;
    async fn update_board(&self, board: &Board) -> StoreResult<bool>;
    /// Removes the board with all of its tasks and subtasks.
    async fn delete_board(&self, board_id: &str) -> StoreResult<bool>;
    /// Set-union insert; returns whether the member list changed.
    async fn add_board_member(&self, board_id: &str, user_id: &str) -> StoreResult<bool>;
    async fn remove_board_member(&self, board_id: &str, user_id: &str) -> StoreResult<bool>;

    // tasks
    async fn insert_task(&self, task: &Task) -> StoreResult<()>;
    async fn find_task(&self, board_id: &str, task_id: &str) -> StoreResult<Option<Task>>;
    /// Tasks of a board in creation order.
    async fn list_tasks(&self, board_id: &str) -> StoreResult<Vec<Task>>;
    async fn update_task(&self, task: &Task) -> StoreResult<bool>;
    async fn set_task_status(&self, board_id: &str, task_id: &str, status: &str) -> StoreResult<bool>;
    /// Removes the task and its subtasks.
    async fn delete_task(&self, board_id: &str, task_id: &str) -> StoreResult<bool>;
    /// Tasks the user owns or is assigned to, across all boards.
    async fn list_tasks_for_user(&self, user_id: &str) -> StoreResult<Vec<Task>>;

    // subtasks
    async fn insert_subtask(&self, subtask: &Subtask) -> StoreResult<()>;
    async fn find_subtask(&self, task_id: &str, subtask_id: &str) -> StoreResult<Option<Subtask>>;
    async fn list_subtasks(&self, task_id: &str) -> StoreResult<Vec<Subtask>>;
    async fn list_board_subtasks(&self, board_id: &str) -> StoreResult<Vec<Subtask>>;
    async fn update_subtask(&self, subtask: &Subtask) -> StoreResult<bool>;
    async fn set_subtask_status(&self, task_id: &str, subtask_id: &str, status: &str) -> StoreResult<bool>;
    async fn delete_subtask(&self, task_id: &str, subtask_id: &str) -> StoreResult<bool>;
    async fn list_subtasks_assigned_to(&self, user_id: &str) -> StoreResult<Vec<Subtask>>;

    // notification marks
    async fn load_notification_state(&self, user_id: &str) -> StoreResult<NotificationState>;
    async fn save_notification_state(&self, state: &NotificationState) -> StoreResult<()>;
}
