// src/dashboard.rs

use std::collections::BTreeMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::models::board::Board;
use crate::models::task::Task;
use crate::models::DONE_STATUS;

#[derive(Debug, Serialize, PartialEq)]
pub struct BoardSummary {
    pub board_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_owner: bool,
    pub member_count: usize,
    pub task_count: usize,
    pub completed_count: usize,
    /// Task counts keyed by status id. Every effective status is present.
    pub status_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DashboardTotals {
    pub boards: usize,
    /// Sum of member counts across boards; a user on two boards counts twice.
    pub members: usize,
    pub created_this_month: usize,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub totals: DashboardTotals,
    pub boards: Vec<BoardSummary>,
}

/// Headline figures. "This month" is the calendar month of `now`, in UTC.
pub fn totals(boards: &[Board], now: DateTime<Utc>) -> DashboardTotals {
    DashboardTotals {
        boards: boards.len(),
        members: boards.iter().map(|b| b.members.len()).sum(),
        created_this_month: boards
            .iter()
            .filter(|b| b.created_at.year() == now.year() && b.created_at.month() == now.month())
            .count(),
    }
}

pub fn summarize(board: &Board, tasks: &[Task], uid: &str) -> BoardSummary {
    let mut status_counts: BTreeMap<String, usize> = board
        .effective_statuses()
        .into_iter()
        .map(|s| (s.id, 0))
        .collect();
    for task in tasks {
        *status_counts.entry(task.status.clone()).or_insert(0) += 1;
    }

    BoardSummary {
        board_id: board.board_id.clone(),
        name: board.name.clone(),
        description: board.description.clone(),
        is_owner: board.is_owner(uid),
        member_count: board.members.len(),
        task_count: tasks.len(),
        completed_count: tasks.iter().filter(|t| t.status == DONE_STATUS).count(),
        status_counts,
    }
}

/// GET /dashboard
pub async fn get_dashboard(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let mut boards = data.store.list_boards_for_member(&uid).await?;
    boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut summaries = Vec::with_capacity(boards.len());
    for board in &boards {
        let tasks = data.store.list_tasks(&board.board_id).await?;
        summaries.push(summarize(board, &tasks, &uid));
    }
    Ok(HttpResponse::Ok().json(Dashboard {
        totals: totals(&boards, Utc::now()),
        boards: summaries,
    }))
}
