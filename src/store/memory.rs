use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{oldest_first, NotificationState, Store, StoreResult};
use crate::models::board::Board;
use crate::models::task::{Subtask, Task};
use crate::models::user::User;

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    boards: Vec<Board>,
    tasks: Vec<Task>,
    subtasks: Vec<Subtask>,
    notification_state: HashMap<String, NotificationState>,
}

/// Process-local store. Vectors keep insertion order like a collection scan.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn replace<T>(items: &mut [T], matches: impl Fn(&T) -> bool, value: &T) -> bool
where
    T: Clone,
{
    match items.iter_mut().find(|item| matches(item)) {
        Some(slot) => {
            *slot = value.clone();
            true
        }
        None => false,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.inner.write().await.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_users(&self, user_ids: &[String]) -> StoreResult<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .filter(|u| user_ids.contains(&u.user_id))
            .cloned()
            .collect())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        replace(&mut inner.users, |u| u.user_id == user.user_id, user);
        Ok(())
    }

    async fn insert_board(&self, board: &Board) -> StoreResult<()> {
        self.inner.write().await.boards.push(board.clone());
        Ok(())
    }

    async fn find_board(&self, board_id: &str) -> StoreResult<Option<Board>> {
        let inner = self.inner.read().await;
        Ok(inner.boards.iter().find(|b| b.board_id == board_id).cloned())
    }

    async fn find_boards(&self, board_ids: &[String]) -> StoreResult<Vec<Board>> {
        let inner = self.inner.read().await;
        Ok(inner
            .boards
            .iter()
            .filter(|b| board_ids.contains(&b.board_id))
            .cloned()
            .collect())
    }

    async fn list_boards_for_member(&self, user_id: &str) -> StoreResult<Vec<Board>> {
        let inner = self.inner.read().await;
        Ok(oldest_first(
            inner
                .boards
                .iter()
                .filter(|b| b.members.iter().any(|m| m == user_id))
                .cloned()
                .collect(),
        ))
    }

    async fn update_board(&self, board: &Board) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(replace(&mut inner.boards, |b| b.board_id == board.board_id, board))
    }

    async fn delete_board(&self, board_id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.boards.len();
        inner.boards.retain(|b| b.board_id != board_id);
        let removed = inner.boards.len() != before;
        inner.tasks.retain(|t| t.board_id != board_id);
        inner.subtasks.retain(|s| s.board_id != board_id);
        Ok(removed)
    }

    async fn add_board_member(&self, board_id: &str, user_id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.boards.iter_mut().find(|b| b.board_id == board_id) {
            Some(board) if !board.members.iter().any(|m| m == user_id) => {
                board.members.push(user_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove_board_member(&self, board_id: &str, user_id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.boards.iter_mut().find(|b| b.board_id == board_id) {
            Some(board) => {
                let before = board.members.len();
                board.members.retain(|m| m != user_id);
                Ok(board.members.len() != before)
            }
            None => Ok(false),
        }
    }

    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.inner.write().await.tasks.push(task.clone());
        Ok(())
    }

    async fn find_task(&self, board_id: &str, task_id: &str) -> StoreResult<Option<Task>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tasks
            .iter()
            .find(|t| t.board_id == board_id && t.task_id == task_id)
            .cloned())
    }

    async fn list_tasks(&self, board_id: &str) -> StoreResult<Vec<Task>> {
        let inner = self.inner.read().await;
        Ok(oldest_first(
            inner.tasks.iter().filter(|t| t.board_id == board_id).cloned().collect(),
        ))
    }

    async fn update_task(&self, task: &Task) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(replace(
            &mut inner.tasks,
            |t| t.board_id == task.board_id && t.task_id == task.task_id,
            task,
        ))
    }

    async fn set_task_status(&self, board_id: &str, task_id: &str, status: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner
            .tasks
            .iter_mut()
            .find(|t| t.board_id == board_id && t.task_id == task_id)
        {
            Some(task) => {
                task.status = status.to_string();
                task.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_task(&self, board_id: &str, task_id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.tasks.len();
        inner
            .tasks
            .retain(|t| !(t.board_id == board_id && t.task_id == task_id));
        let removed = inner.tasks.len() != before;
        if removed {
            inner.subtasks.retain(|s| s.task_id != task_id);
        }
        Ok(removed)
    }

    async fn list_tasks_for_user(&self, user_id: &str) -> StoreResult<Vec<Task>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tasks
            .iter()
            .filter(|t| t.owner_id == user_id || t.assignee_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn insert_subtask(&self, subtask: &Subtask) -> StoreResult<()> {
        self.inner.write().await.subtasks.push(subtask.clone());
        Ok(())
    }

    async fn find_subtask(&self, task_id: &str, subtask_id: &str) -> StoreResult<Option<Subtask>> {
        let inner = self.inner.read().await;
        Ok(inner
            .subtasks
            .iter()
            .find(|s| s.task_id == task_id && s.subtask_id == subtask_id)
            .cloned())
    }

    async fn list_subtasks(&self, task_id: &str) -> StoreResult<Vec<Subtask>> {
        let inner = self.inner.read().await;
        Ok(oldest_first(
            inner.subtasks.iter().filter(|s| s.task_id == task_id).cloned().collect(),
        ))
    }

    async fn list_board_subtasks(&self, board_id: &str) -> StoreResult<Vec<Subtask>> {
        let inner = self.inner.read().await;
        Ok(oldest_first(
            inner.subtasks.iter().filter(|s| s.board_id == board_id).cloned().collect(),
        ))
    }

    async fn update_subtask(&self, subtask: &Subtask) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(replace(
            &mut inner.subtasks,
            |s| s.task_id == subtask.task_id && s.subtask_id == subtask.subtask_id,
            subtask,
        ))
    }

    async fn set_subtask_status(&self, task_id: &str, subtask_id: &str, status: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner
            .subtasks
            .iter_mut()
            .find(|s| s.task_id == task_id && s.subtask_id == subtask_id)
        {
            Some(subtask) => {
                subtask.status = status.to_string();
                subtask.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_subtask(&self, task_id: &str, subtask_id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.subtasks.len();
        inner
            .subtasks
            .retain(|s| !(s.task_id == task_id && s.subtask_id == subtask_id));
        Ok(inner.subtasks.len() != before)
    }

    async fn list_subtasks_assigned_to(&self, user_id: &str) -> StoreResult<Vec<Subtask>> {
        let inner = self.inner.read().await;
        Ok(inner
            .subtasks
            .iter()
            .filter(|s| s.assignee_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn load_notification_state(&self, user_id: &str) -> StoreResult<NotificationState> {
        let inner = self.inner.read().await;
        Ok(inner
            .notification_state
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| NotificationState::empty(user_id)))
    }

    async fn save_notification_state(&self, state: &NotificationState) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .notification_state
            .insert(state.user_id.clone(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn board(id: &str, owner: &str) -> Board {
        Board {
            board_id: id.to_string(),
            name: format!("Board {}", id),
            description: None,
            owner_id: owner.to_string(),
            members: vec![owner.to_string()],
            custom_statuses: None,
            created_at: Utc::now(),
        }
    }

    fn task(board_id: &str, id: &str) -> Task {
        Task {
            task_id: id.to_string(),
            board_id: board_id.to_string(),
            title: format!("Task {}", id),
            description: None,
            status: "todo".to_string(),
            due_date: None,
            owner_id: "owner".to_string(),
            assignee_id: None,
            remark: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn subtask(board_id: &str, task_id: &str, id: &str) -> Subtask {
        Subtask {
            subtask_id: id.to_string(),
            task_id: task_id.to_string(),
            board_id: board_id.to_string(),
            title: format!("Subtask {}", id),
            status: "todo".to_string(),
            due_date: None,
            owner_id: "owner".to_string(),
            assignee_id: None,
            remark: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn deleting_task_removes_its_subtasks_only() {
        let store = MemoryStore::new();
        store.insert_board(&board("b1", "owner")).await.unwrap();
        store.insert_task(&task("b1", "t1")).await.unwrap();
        store.insert_task(&task("b1", "t2")).await.unwrap();
        store.insert_subtask(&subtask("b1", "t1", "s1")).await.unwrap();
        store.insert_subtask(&subtask("b1", "t1", "s2")).await.unwrap();
        store.insert_subtask(&subtask("b1", "t2", "s3")).await.unwrap();

        assert!(store.delete_task("b1", "t1").await.unwrap());
        assert!(store.list_subtasks("t1").await.unwrap().is_empty());
        assert_eq!(store.list_subtasks("t2").await.unwrap().len(), 1);
        assert!(!store.delete_task("b1", "t1").await.unwrap());
    }

    #[tokio::test]
    async fn deleting_board_cascades() {
        let store = MemoryStore::new();
        store.insert_board(&board("b1", "owner")).await.unwrap();
        store.insert_board(&board("b2", "owner")).await.unwrap();
        store.insert_task(&task("b1", "t1")).await.unwrap();
        store.insert_task(&task("b2", "t2")).await.unwrap();
        store.insert_subtask(&subtask("b1", "t1", "s1")).await.unwrap();

        assert!(store.delete_board("b1").await.unwrap());
        assert!(store.find_board("b1").await.unwrap().is_none());
        assert!(store.list_tasks("b1").await.unwrap().is_empty());
        assert!(store.list_board_subtasks("b1").await.unwrap().is_empty());
        assert_eq!(store.list_tasks("b2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn member_updates_behave_like_set_operations() {
        let store = MemoryStore::new();
        store.insert_board(&board("b1", "owner")).await.unwrap();

        assert!(store.add_board_member("b1", "alice").await.unwrap());
        assert!(!store.add_board_member("b1", "alice").await.unwrap());
        assert_eq!(store.list_boards_for_member("alice").await.unwrap().len(), 1);

        assert!(store.remove_board_member("b1", "alice").await.unwrap());
        assert!(!store.remove_board_member("b1", "alice").await.unwrap());
        assert!(store.list_boards_for_member("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_move_touches_only_status() {
        let store = MemoryStore::new();
        let mut t = task("b1", "t1");
        t.remark = Some("keep me".to_string());
        store.insert_task(&t).await.unwrap();

        assert!(store.set_task_status("b1", "t1", "in-progress").await.unwrap());
        let found = store.find_task("b1", "t1").await.unwrap().unwrap();
        assert_eq!(found.status, "in-progress");
        assert_eq!(found.remark.as_deref(), Some("keep me"));
        assert!(!store.set_task_status("b1", "missing", "done").await.unwrap());
    }

    #[tokio::test]
    async fn notification_state_defaults_to_empty() {
        let store = MemoryStore::new();
        let state = store.load_notification_state("alice").await.unwrap();
        assert_eq!(state, NotificationState::empty("alice"));

        let mut state = state;
        state.read.push("task_due_t1".to_string());
        store.save_notification_state(&state).await.unwrap();
        assert_eq!(store.load_notification_state("alice").await.unwrap().read, vec!["task_due_t1"]);
    }
}
