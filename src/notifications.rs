//! Due and overdue reminders for the caller's tasks and subtasks.
//!
//! Notifications are computed on every request from the current documents.
//! Only the read and dismissed marks are persisted, keyed by the stable
//! notification id.

use std::collections::{HashMap, HashSet};

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::Serialize;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::models::board::Board;
use crate::models::task::{Subtask, Task};
use crate::models::DONE_STATUS;
use crate::store::NotificationState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskDue,
    SubtaskDue,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub board_id: String,
    pub board_name: String,
    pub task_id: String,
    pub task_title: String,
    pub subtask_id: Option<String>,
    pub subtask_title: Option<String>,
    pub due_date: DateTime<Utc>,
    pub overdue: bool,
    pub is_read: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

/// Everything the scan needs, already loaded from the store.
pub struct ScanInput<'a> {
    pub user_id: &'a str,
    pub now: DateTime<Utc>,
    pub window: Duration,
    pub boards: &'a HashMap<String, Board>,
    /// Tasks the user owns or is assigned to.
    pub tasks: &'a [Task],
    /// Subtasks assigned to the user.
    pub subtasks: &'a [Subtask],
    /// Parent tasks of `subtasks`, by task id.
    pub parents: &'a HashMap<String, Task>,
}

fn due_wording(due: DateTime<Utc>, now: DateTime<Utc>) -> (bool, &'static str, &'static str) {
    if due < now {
        (true, "Overdue Task", "overdue")
    } else {
        (false, "Task Due Soon", "due soon")
    }
}

/// Open items due within the window or already overdue, soonest first.
pub fn scan(input: &ScanInput<'_>) -> Vec<Notification> {
    let horizon = input.now + input.window;
    let visible_board = |board_id: &str| {
        input
            .boards
            .get(board_id)
            .filter(|board| board.is_member(input.user_id))
    };

    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for task in input.tasks {
        if task.status == DONE_STATUS {
            continue;
        }
        let (Some(due), Some(board)) = (task.due_date, visible_board(&task.board_id)) else {
            continue;
        };
        if due > horizon {
            continue;
        }
        let id = format!("task_due_{}", task.task_id);
        if !seen.insert(id.clone()) {
            continue;
        }
        let (overdue, title, wording) = due_wording(due, input.now);
        out.push(Notification {
            id,
            kind: NotificationKind::TaskDue,
            title: title.to_string(),
            message: format!("\"{}\" is {}", task.title, wording),
            board_id: board.board_id.clone(),
            board_name: board.name.clone(),
            task_id: task.task_id.clone(),
            task_title: task.title.clone(),
            subtask_id: None,
            subtask_title: None,
            due_date: due,
            overdue,
            is_read: false,
        });
    }

    for subtask in input.subtasks {
        if subtask.status == DONE_STATUS {
            continue;
        }
        let (Some(parent), Some(board)) = (
            input.parents.get(&subtask.task_id),
            visible_board(&subtask.board_id),
        ) else {
            continue;
        };
        let Some(due) = subtask.due_date.or(parent.due_date) else {
            continue;
        };
        if due > horizon {
            continue;
        }
        let (overdue, title, wording) = due_wording(due, input.now);
        out.push(Notification {
            id: format!("subtask_due_{}", subtask.subtask_id),
            kind: NotificationKind::SubtaskDue,
            title: title.to_string(),
            message: format!("\"{}\" in \"{}\" is {}", subtask.title, parent.title, wording),
            board_id: board.board_id.clone(),
            board_name: board.name.clone(),
            task_id: parent.task_id.clone(),
            task_title: parent.title.clone(),
            subtask_id: Some(subtask.subtask_id.clone()),
            subtask_title: Some(subtask.title.clone()),
            due_date: due,
            overdue,
            is_read: false,
        });
    }

    out.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
    out
}

/// Drops dismissed entries and flags read ones. Unread come first, then
/// soonest due.
pub fn apply_state(notifications: Vec<Notification>, state: &NotificationState) -> Vec<Notification> {
    let mut shown: Vec<Notification> = notifications
        .into_iter()
        .filter(|n| !state.dismissed.contains(&n.id))
        .map(|mut n| {
            n.is_read = state.read.contains(&n.id);
            n
        })
        .collect();
    shown.sort_by(|a, b| {
        a.is_read
            .cmp(&b.is_read)
            .then_with(|| a.due_date.cmp(&b.due_date))
            .then_with(|| a.id.cmp(&b.id))
    });
    shown
}

async fn compute(data: &AppState, uid: &str) -> Result<Vec<Notification>, ApiError> {
    let tasks = data.store.list_tasks_for_user(uid).await?;
    let subtasks = data.store.list_subtasks_assigned_to(uid).await?;

    let mut parents: HashMap<String, Task> = HashMap::new();
    for subtask in &subtasks {
        if parents.contains_key(&subtask.task_id) {
            continue;
        }
        if let Some(task) = data.store.find_task(&subtask.board_id, &subtask.task_id).await? {
            parents.insert(task.task_id.clone(), task);
        }
    }

    let board_ids: Vec<String> = tasks
        .iter()
        .map(|t| t.board_id.clone())
        .chain(subtasks.iter().map(|s| s.board_id.clone()))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let boards: HashMap<String, Board> = data
        .store
        .find_boards(&board_ids)
        .await?
        .into_iter()
        .map(|b| (b.board_id.clone(), b))
        .collect();

    let found = scan(&ScanInput {
        user_id: uid,
        now: Utc::now(),
        window: Duration::days(data.config.due_soon_days),
        boards: &boards,
        tasks: &tasks,
        subtasks: &subtasks,
        parents: &parents,
    });
    debug!("Computed {} notification(s) for user {}", found.len(), uid);
    Ok(found)
}

/// Keeps the persisted marks limited to notifications that still exist.
fn prune(state: &mut NotificationState, current: &[Notification]) {
    let live: HashSet<&str> = current.iter().map(|n| n.id.as_str()).collect();
    state.read.retain(|id| live.contains(id.as_str()));
    state.dismissed.retain(|id| live.contains(id.as_str()));
}

fn listing(notifications: Vec<Notification>, state: &NotificationState) -> NotificationList {
    let notifications = apply_state(notifications, state);
    let unread_count = notifications.iter().filter(|n| !n.is_read).count();
    NotificationList { notifications, unread_count }
}

/// GET /notifications
pub async fn list_notifications(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let current = compute(&data, &uid).await?;
    let state = data.store.load_notification_state(&uid).await?;
    Ok(HttpResponse::Ok().json(listing(current, &state)))
}

async fn update_marks(
    data: &AppState,
    uid: &str,
    change: impl FnOnce(&mut NotificationState, &[Notification]) -> Result<(), ApiError>,
) -> Result<NotificationList, ApiError> {
    let current = compute(data, uid).await?;
    let mut state = data.store.load_notification_state(uid).await?;
    change(&mut state, &current)?;
    prune(&mut state, &current);
    data.store.save_notification_state(&state).await?;
    Ok(listing(current, &state))
}

fn require_known(current: &[Notification], id: &str) -> Result<(), ApiError> {
    if current.iter().any(|n| n.id == id) {
        Ok(())
    } else {
        Err(ApiError::not_found("Notification not found"))
    }
}

/// POST /notifications/{id}/read
pub async fn mark_read(
    req: HttpRequest,
    data: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let id = id.into_inner();
    let list = update_marks(&data, &uid, |state, current| {
        require_known(current, &id)?;
        if !state.read.contains(&id) {
            state.read.push(id.clone());
        }
        Ok(())
    })
    .await?;
    Ok(HttpResponse::Ok().json(list))
}

/// POST /notifications/read_all
pub async fn mark_all_read(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let list = update_marks(&data, &uid, |state, current| {
        state.read = current.iter().map(|n| n.id.clone()).collect();
        Ok(())
    })
    .await?;
    Ok(HttpResponse::Ok().json(list))
}

/// DELETE /notifications/{id}
pub async fn dismiss(
    req: HttpRequest,
    data: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let id = id.into_inner();
    let list = update_marks(&data, &uid, |state, current| {
        require_known(current, &id)?;
        if !state.dismissed.contains(&id) {
            state.dismissed.push(id.clone());
        }
        Ok(())
    })
    .await?;
    Ok(HttpResponse::Ok().json(list))
}
