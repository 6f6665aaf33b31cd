use async_trait::async_trait;
use chrono::Utc;
use futures::stream::TryStreamExt;
use log::info;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};

use super::{oldest_first, NotificationState, Store, StoreResult};
use crate::error::StoreError;
use crate::models::board::Board;
use crate::models::task::{Subtask, Task};
use crate::models::user::User;

const USERS: &str = "users";
const BOARDS: &str = "boards";
const TASKS: &str = "tasks";
const SUBTASKS: &str = "subtasks";
const NOTIFICATION_STATE: &str = "notification_state";

pub struct MongoStore {
    pub client: Client,
    pub db: Database,
}

impl MongoStore {
    pub async fn init(uri: &str, db_name: &str) -> StoreResult<Self> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);
        let store = MongoStore { client, db };
        store.ensure_indexes().await?;
        info!("Connected to MongoDB database {}", db_name);
        Ok(store)
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = IndexOptions::builder().unique(true).build();
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        self.boards()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "board_id": 1 })
                    .options(unique)
                    .build(),
            )
            .await?;
        self.boards()
            .create_index(IndexModel::builder().keys(doc! { "members": 1 }).build())
            .await?;
        self.tasks()
            .create_index(IndexModel::builder().keys(doc! { "board_id": 1, "task_id": 1 }).build())
            .await?;
        self.subtasks()
            .create_index(IndexModel::builder().keys(doc! { "task_id": 1, "subtask_id": 1 }).build())
            .await?;
        self.subtasks()
            .create_index(IndexModel::builder().keys(doc! { "assignee_id": 1 }).build())
            .await?;
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection::<User>(USERS)
    }

    fn boards(&self) -> Collection<Board> {
        self.db.collection::<Board>(BOARDS)
    }

    fn tasks(&self) -> Collection<Task> {
        self.db.collection::<Task>(TASKS)
    }

    fn subtasks(&self) -> Collection<Subtask> {
        self.db.collection::<Subtask>(SUBTASKS)
    }

    fn notification_state(&self) -> Collection<NotificationState> {
        self.db.collection::<NotificationState>(NOTIFICATION_STATE)
    }
}

/// `$set` body for a last-write-wins status change.
fn status_update(status: &str) -> StoreResult<Document> {
    let now = to_bson(&Utc::now()).map_err(|e| StoreError::Backend(e.to_string()))?;
    Ok(doc! { "$set": { "status": status, "updated_at": now } })
}

#[async_trait]
impl Store for MongoStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.users().insert_one(user).await?;
        Ok(())
    }

    async fn find_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "user_id": user_id }).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "email": email }).await?)
    }

    async fn find_users(&self, user_ids: &[String]) -> StoreResult<Vec<User>> {
        let cursor = self.users().find(doc! { "user_id": { "$in": user_ids.to_vec() } }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        self.users()
            .replace_one(doc! { "user_id": &user.user_id }, user)
            .await?;
        Ok(())
    }

    async fn insert_board(&self, board: &Board) -> StoreResult<()> {
        self.boards().insert_one(board).await?;
        Ok(())
    }

    async fn find_board(&self, board_id: &str) -> StoreResult<Option<Board>> {
        Ok(self.boards().find_one(doc! { "board_id": board_id }).await?)
    }

    async fn find_boards(&self, board_ids: &[String]) -> StoreResult<Vec<Board>> {
        let cursor = self.boards().find(doc! { "board_id": { "$in": board_ids.to_vec() } }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_boards_for_member(&self, user_id: &str) -> StoreResult<Vec<Board>> {
        let cursor = self
            .boards()
            .find(doc! { "members": user_id })
            .await?;
        Ok(oldest_first(cursor.try_collect().await?))
    }

    async fn update_board(&self, board: &Board) -> StoreResult<bool> {
        let res = self
            .boards()
            .replace_one(doc! { "board_id": &board.board_id }, board)
            .await?;
        Ok(res.matched_count > 0)
    }

    async fn delete_board(&self, board_id: &str) -> StoreResult<bool> {
        let res = self.boards().delete_one(doc! { "board_id": board_id }).await?;
        self.subtasks().delete_many(doc! { "board_id": board_id }).await?;
        self.tasks().delete_many(doc! { "board_id": board_id }).await?;
        Ok(res.deleted_count > 0)
    }

    async fn add_board_member(&self, board_id: &str, user_id: &str) -> StoreResult<bool> {
        let res = self
            .boards()
            .update_one(
                doc! { "board_id": board_id },
                doc! { "$addToSet": { "members": user_id } },
            )
            .await?;
        Ok(res.modified_count > 0)
    }

    async fn remove_board_member(&self, board_id: &str, user_id: &str) -> StoreResult<bool> {
        let res = self
            .boards()
            .update_one(
                doc! { "board_id": board_id },
                doc! { "$pull": { "members": user_id } },
            )
            .await?;
        Ok(res.modified_count > 0)
    }

    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.tasks().insert_one(task).await?;
        Ok(())
    }

    async fn find_task(&self, board_id: &str, task_id: &str) -> StoreResult<Option<Task>> {
        Ok(self
            .tasks()
            .find_one(doc! { "board_id": board_id, "task_id": task_id })
            .await?)
    }

    async fn list_tasks(&self, board_id: &str) -> StoreResult<Vec<Task>> {
        let cursor = self
            .tasks()
            .find(doc! { "board_id": board_id })
            .await?;
        Ok(oldest_first(cursor.try_collect().await?))
    }

    async fn update_task(&self, task: &Task) -> StoreResult<bool> {
        let res = self
            .tasks()
            .replace_one(doc! { "board_id": &task.board_id, "task_id": &task.task_id }, task)
            .await?;
        Ok(res.matched_count > 0)
    }

    async fn set_task_status(&self, board_id: &str, task_id: &str, status: &str) -> StoreResult<bool> {
        let res = self
            .tasks()
            .update_one(doc! { "board_id": board_id, "task_id": task_id }, status_update(status)?)
            .await?;
        Ok(res.matched_count > 0)
    }

    async fn delete_task(&self, board_id: &str, task_id: &str) -> StoreResult<bool> {
        let res = self
            .tasks()
            .delete_one(doc! { "board_id": board_id, "task_id": task_id })
            .await?;
        if res.deleted_count > 0 {
            self.subtasks().delete_many(doc! { "task_id": task_id }).await?;
        }
        Ok(res.deleted_count > 0)
    }

    async fn list_tasks_for_user(&self, user_id: &str) -> StoreResult<Vec<Task>> {
        let filter = doc! { "$or": [ { "owner_id": user_id }, { "assignee_id": user_id } ] };
        let cursor = self.tasks().find(filter).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_subtask(&self, subtask: &Subtask) -> StoreResult<()> {
        self.subtasks().insert_one(subtask).await?;
        Ok(())
    }

    async fn find_subtask(&self, task_id: &str, subtask_id: &str) -> StoreResult<Option<Subtask>> {
        Ok(self
            .subtasks()
            .find_one(doc! { "task_id": task_id, "subtask_id": subtask_id })
            .await?)
    }

    async fn list_subtasks(&self, task_id: &str) -> StoreResult<Vec<Subtask>> {
        let cursor = self
            .subtasks()
            .find(doc! { "task_id": task_id })
            .await?;
        Ok(oldest_first(cursor.try_collect().await?))
    }

    async fn list_board_subtasks(&self, board_id: &str) -> StoreResult<Vec<Subtask>> {
        let cursor = self
            .subtasks()
            .find(doc! { "board_id": board_id })
            .await?;
        Ok(oldest_first(cursor.try_collect().await?))
    }

    async fn update_subtask(&self, subtask: &Subtask) -> StoreResult<bool> {
        let res = self
            .subtasks()
            .replace_one(
                doc! { "task_id": &subtask.task_id, "subtask_id": &subtask.subtask_id },
                subtask,
            )
            .await?;
        Ok(res.matched_count > 0)
    }

    async fn set_subtask_status(&self, task_id: &str, subtask_id: &str, status: &str) -> StoreResult<bool> {
        let res = self
            .subtasks()
            .update_one(doc! { "task_id": task_id, "subtask_id": subtask_id }, status_update(status)?)
            .await?;
        Ok(res.matched_count > 0)
    }

    async fn delete_subtask(&self, task_id: &str, subtask_id: &str) -> StoreResult<bool> {
        let res = self
            .subtasks()
            .delete_one(doc! { "task_id": task_id, "subtask_id": subtask_id })
            .await?;
        Ok(res.deleted_count > 0)
    }

    async fn list_subtasks_assigned_to(&self, user_id: &str) -> StoreResult<Vec<Subtask>> {
        let cursor = self.subtasks().find(doc! { "assignee_id": user_id }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn load_notification_state(&self, user_id: &str) -> StoreResult<NotificationState> {
        Ok(self
            .notification_state()
            .find_one(doc! { "user_id": user_id })
            .await?
            .unwrap_or_else(|| NotificationState::empty(user_id)))
    }

    async fn save_notification_state(&self, state: &NotificationState) -> StoreResult<()> {
        self.notification_state()
            .replace_one(doc! { "user_id": &state.user_id }, state)
            .upsert(true)
            .await?;
        Ok(())
    }
}
