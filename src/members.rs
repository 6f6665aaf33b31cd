// Board membership: listing, inviting by e-mail and removing members.

use actix_web::{web, HttpRequest, HttpResponse};
use log::{info, warn};
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::board::{require_member, require_owner};
use crate::error::ApiError;
use crate::models::board::{Board, InviteMemberRequest};
use crate::models::user::BoardMember;
use crate::realtime::BoardEvent;
use crate::validation;

/// Public copies of the board's members, owner first, then join order.
/// Uids without a user document are skipped.
pub async fn board_members(data: &AppState, board: &Board) -> Result<Vec<BoardMember>, ApiError> {
    let mut ids = vec![board.owner_id.clone()];
    ids.extend(board.members.iter().filter(|m| **m != board.owner_id).cloned());

    let users = data.store.find_users(&ids).await?;
    Ok(ids
        .iter()
        .filter_map(|id| users.iter().find(|u| &u.user_id == id))
        .map(BoardMember::from)
        .collect())
}

async fn publish_members(data: &AppState, board_id: &str) -> Result<(), ApiError> {
    if let Some(board) = data.store.find_board(board_id).await? {
        let members = board_members(data, &board).await?;
        data.publish(board_id, BoardEvent::MembersChanged { members });
    }
    Ok(())
}

/// GET /boards/{board_id}/members
pub async fn list_members(
    req: HttpRequest,
    data: web::Data<AppState>,
    board_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    Ok(HttpResponse::Ok().json(board_members(&data, &board).await?))
}

/// POST /boards/{board_id}/members
/// Owner only. The invitee must already have an account.
pub async fn invite_member(
    req: HttpRequest,
    data: web::Data<AppState>,
    board_id: web::Path<String>,
    payload: web::Json<InviteMemberRequest>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let board = require_owner(&data, &board_id, &uid, "invite users").await?;
    let email = validation::normalize_email(&payload.email)?;

    let invitee = match data.store.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            return Err(ApiError::not_found(
                "No user found with this email address. They need to create an account first.",
            ))
        }
    };
    if board.is_member(&invitee.user_id) {
        return Err(ApiError::conflict("This user is already a member of the board."));
    }

    if !data.store.add_board_member(&board.board_id, &invitee.user_id).await? {
        // Lost a race with a concurrent invite; the end state is the same.
        warn!("User {} was already added to board {}", invitee.user_id, board.board_id);
    }
    info!("User {} invited to board {}", invitee.user_id, board.board_id);
    publish_members(&data, &board.board_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Successfully invited {} to the board.", email),
        "member": BoardMember::from(&invitee),
    })))
}

/// DELETE /boards/{board_id}/members/{uid}
/// Owner only. The owner can never be removed.
pub async fn remove_member(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (board_id, member_uid) = path.into_inner();
    let uid = current_user(&req)?;
    let board = require_owner(&data, &board_id, &uid, "remove members").await?;

    if board.is_owner(&member_uid) {
        return Err(ApiError::bad_request("The board owner cannot be removed."));
    }
    if !data.store.remove_board_member(&board.board_id, &member_uid).await? {
        return Err(ApiError::not_found("Member not found on this board"));
    }
    info!("User {} removed from board {}", member_uid, board.board_id);
    publish_members(&data, &board.board_id).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Member removed successfully." })))
}
