// src/board.rs

use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::info;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::members::board_members;
use crate::models::board::{Board, BoardRequest, BoardSnapshot, BoardStatus};
use crate::models::task::Subtask;
use crate::realtime::BoardEvent;
use crate::validation;

/// Loads a board the caller belongs to. Non-members get a 403.
pub async fn require_member(data: &AppState, board_id: &str, uid: &str) -> Result<Board, ApiError> {
    let board = data
        .store
        .find_board(board_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Board not found"))?;
    if !board.is_member(uid) {
        return Err(ApiError::forbidden("Not a member of this board"));
    }
    Ok(board)
}

/// Loads a board the caller owns.
pub async fn require_owner(data: &AppState, board_id: &str, uid: &str, action: &str) -> Result<Board, ApiError> {
    let board = require_member(data, board_id, uid).await?;
    if !board.is_owner(uid) {
        return Err(ApiError::forbidden(format!("Only the board owner can {}", action)));
    }
    Ok(board)
}

fn checked_statuses(statuses: Option<Vec<BoardStatus>>) -> Result<Option<Vec<BoardStatus>>, ApiError> {
    match statuses {
        Some(list) if !list.is_empty() => {
            validation::custom_statuses(&list)?;
            Ok(Some(list))
        }
        _ => Ok(None),
    }
}

pub async fn load_snapshot(data: &AppState, board: Board) -> Result<BoardSnapshot, ApiError> {
    let tasks = data.store.list_tasks(&board.board_id).await?;
    let mut subtasks: HashMap<String, Vec<Subtask>> =
        tasks.iter().map(|t| (t.task_id.clone(), Vec::new())).collect();
    for subtask in data.store.list_board_subtasks(&board.board_id).await? {
        subtasks.entry(subtask.task_id.clone()).or_default().push(subtask);
    }
    let members = board_members(data, &board).await?;

    Ok(BoardSnapshot {
        statuses: board.effective_statuses(),
        board,
        tasks,
        subtasks,
        members,
    })
}

/// GET /boards
/// Boards the caller is a member of, newest first.
pub async fn list_boards(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let mut boards = data.store.list_boards_for_member(&uid).await?;
    boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(HttpResponse::Ok().json(boards))
}

/// POST /boards
pub async fn create_board(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<BoardRequest>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let payload = payload.into_inner();

    let board = Board {
        board_id: Uuid::new_v4().to_string(),
        name: validation::required_text("Board name", &payload.name)?,
        description: validation::optional_text(payload.description),
        owner_id: uid.clone(),
        members: vec![uid],
        custom_statuses: checked_statuses(payload.custom_statuses)?,
        created_at: Utc::now(),
    };
    data.store.insert_board(&board).await?;
    info!("Board created: {}", board.board_id);

    Ok(HttpResponse::Created().json(board))
}

/// GET /boards/{board_id}
pub async fn get_board(
    req: HttpRequest,
    data: web::Data<AppState>,
    board_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    Ok(HttpResponse::Ok().json(board))
}

/// PUT /boards/{board_id}
/// Owner only. An empty status list restores the defaults.
pub async fn update_board(
    req: HttpRequest,
    data: web::Data<AppState>,
    board_id: web::Path<String>,
    payload: web::Json<BoardRequest>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let mut board = require_owner(&data, &board_id, &uid, "edit this board").await?;
    let payload = payload.into_inner();

    board.name = validation::required_text("Board name", &payload.name)?;
    board.description = validation::optional_text(payload.description);
    board.custom_statuses = checked_statuses(payload.custom_statuses)?;

    if !data.store.update_board(&board).await? {
        return Err(ApiError::not_found("Board not found"));
    }
    info!("Board updated: {}", board.board_id);
    data.publish(&board.board_id, BoardEvent::BoardUpdated { board: board.clone() });

    Ok(HttpResponse::Ok().json(board))
}

/// DELETE /boards/{board_id}
/// Owner only; takes the board's tasks and subtasks with it.
pub async fn delete_board(
    req: HttpRequest,
    data: web::Data<AppState>,
    board_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let board = require_owner(&data, &board_id, &uid, "delete this board").await?;

    if !data.store.delete_board(&board.board_id).await? {
        return Err(ApiError::not_found("Board not found or already deleted"));
    }
    info!("Board deleted: {}", board.board_id);
    data.publish(&board.board_id, BoardEvent::BoardDeleted { board_id: board.board_id.clone() });

    Ok(HttpResponse::NoContent().finish())
}

/// GET /boards/{board_id}/statuses
pub async fn get_statuses(
    req: HttpRequest,
    data: web::Data<AppState>,
    board_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    Ok(HttpResponse::Ok().json(board.effective_statuses()))
}

/// GET /boards/{board_id}/snapshot
pub async fn get_snapshot(
    req: HttpRequest,
    data: web::Data<AppState>,
    board_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    Ok(HttpResponse::Ok().json(load_snapshot(&data, board).await?))
}
