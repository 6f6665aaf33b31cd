// src/my_tasks.rs

use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::models::board::Board;
use crate::models::task::{Subtask, Task};

#[derive(Debug, Serialize)]
pub struct AssignedTask {
    #[serde(flatten)]
    pub task: Task,
    pub board_name: String,
}

#[derive(Debug, Serialize)]
pub struct AssignedSubtask {
    #[serde(flatten)]
    pub subtask: Subtask,
    pub board_name: String,
    pub task_title: String,
}

#[derive(Debug, Serialize)]
pub struct MyTasks {
    pub tasks: Vec<AssignedTask>,
    pub subtasks: Vec<AssignedSubtask>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MyTasksQuery {
    /// Status id to keep; absent or `all` keeps everything.
    pub status: Option<String>,
    /// `asc` (default) or `desc`, by title.
    pub sort: Option<String>,
}

impl MyTasksQuery {
    fn wants(&self, status: &str) -> bool {
        match self.status.as_deref() {
            None | Some("all") => true,
            Some(wanted) => wanted == status,
        }
    }

    fn descending(&self) -> Result<bool, ApiError> {
        match self.sort.as_deref() {
            None | Some("asc") => Ok(false),
            Some("desc") => Ok(true),
            Some(other) => Err(ApiError::bad_request(format!("Unknown sort order: {}", other))),
        }
    }
}

// Case-insensitive title order. Subtasks sort under their parent task's title.
fn sort_by_title<T>(items: &mut [T], descending: bool, title: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| {
        let order = title(a).to_lowercase().cmp(&title(b).to_lowercase());
        if descending {
            order.reverse()
        } else {
            order
        }
    });
}

/// GET /my-tasks?status=&sort=asc|desc
/// Tasks and subtasks assigned to the caller on boards they still belong to.
pub async fn my_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<MyTasksQuery>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let descending = query.descending()?;

    let boards: HashMap<String, Board> = data
        .store
        .list_boards_for_member(&uid)
        .await?
        .into_iter()
        .map(|b| (b.board_id.clone(), b))
        .collect();

    let mut tasks: Vec<AssignedTask> = data
        .store
        .list_tasks_for_user(&uid)
        .await?
        .into_iter()
        .filter(|t| t.assignee_id.as_deref() == Some(uid.as_str()) && query.wants(&t.status))
        .filter_map(|task| {
            let board = boards.get(&task.board_id)?;
            Some(AssignedTask { board_name: board.name.clone(), task })
        })
        .collect();
    sort_by_title(&mut tasks, descending, |t| t.task.title.as_str());

    let mut parents: HashMap<String, Option<Task>> = HashMap::new();
    let mut subtasks = Vec::new();
    for subtask in data.store.list_subtasks_assigned_to(&uid).await? {
        if !query.wants(&subtask.status) {
            continue;
        }
        let Some(board) = boards.get(&subtask.board_id) else {
            continue;
        };
        if !parents.contains_key(&subtask.task_id) {
            let parent = data.store.find_task(&subtask.board_id, &subtask.task_id).await?;
            parents.insert(subtask.task_id.clone(), parent);
        }
        let Some(Some(parent)) = parents.get(&subtask.task_id) else {
            continue;
        };
        subtasks.push(AssignedSubtask {
            board_name: board.name.clone(),
            task_title: parent.title.clone(),
            subtask,
        });
    }
    sort_by_title(&mut subtasks, descending, |s| s.task_title.as_str());

    Ok(HttpResponse::Ok().json(MyTasks { tasks, subtasks }))
}
