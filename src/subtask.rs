use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, info};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::board::require_member;
use crate::error::ApiError;
use crate::models::task::{
    AssignRequest, CreateSubtaskRequest, StatusRequest, Subtask, Task, UpdateSubtaskRequest,
};
use crate::realtime::BoardEvent;
use crate::task::{check_assignee, check_status};
use crate::validation;

async fn find_parent(data: &AppState, board_id: &str, task_id: &str) -> Result<Task, ApiError> {
    data.store
        .find_task(board_id, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))
}

async fn find_subtask(data: &AppState, task_id: &str, subtask_id: &str) -> Result<Subtask, ApiError> {
    data.store
        .find_subtask(task_id, subtask_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Subtask not found"))
}

/// GET /boards/{board_id}/tasks/{task_id}/subtasks
pub async fn list_subtasks(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (board_id, task_id) = path.into_inner();
    let uid = current_user(&req)?;
    require_member(&data, &board_id, &uid).await?;
    let task = find_parent(&data, &board_id, &task_id).await?;
    Ok(HttpResponse::Ok().json(data.store.list_subtasks(&task.task_id).await?))
}

/// POST /boards/{board_id}/tasks/{task_id}/subtasks
pub async fn create_subtask(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    payload: web::Json<CreateSubtaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let (board_id, task_id) = path.into_inner();
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    let task = find_parent(&data, &board_id, &task_id).await?;
    let payload = payload.into_inner();

    let status = payload.status.unwrap_or_else(|| board.initial_status());
    check_status(&board, &status)?;
    check_assignee(&board, payload.assignee_id.as_deref())?;

    let now = Utc::now();
    let subtask = Subtask {
        subtask_id: Uuid::new_v4().to_string(),
        task_id: task.task_id,
        board_id: board.board_id,
        title: validation::required_text("Title", &payload.title)?,
        status,
        due_date: payload.due_date,
        owner_id: uid,
        assignee_id: payload.assignee_id,
        remark: validation::optional_text(payload.remark),
        created_at: now,
        updated_at: now,
    };
    data.store.insert_subtask(&subtask).await?;
    info!("Subtask created: {} under task {}", subtask.subtask_id, subtask.task_id);
    data.publish(&subtask.board_id, BoardEvent::SubtaskUpserted { subtask: subtask.clone() });

    Ok(HttpResponse::Created().json(subtask))
}

/// PUT /boards/{board_id}/tasks/{task_id}/subtasks/{subtask_id}
pub async fn update_subtask(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
    payload: web::Json<UpdateSubtaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let (board_id, task_id, subtask_id) = path.into_inner();
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    find_parent(&data, &board_id, &task_id).await?;
    let mut subtask = find_subtask(&data, &task_id, &subtask_id).await?;
    let payload = payload.into_inner();

    if let Some(title) = &payload.title {
        subtask.title = validation::required_text("Title", title)?;
    }
    if let Some(status) = payload.status {
        check_status(&board, &status)?;
        subtask.status = status;
    }
    if let Some(due_date) = payload.due_date {
        subtask.due_date = due_date;
    }
    if let Some(assignee) = payload.assignee_id {
        check_assignee(&board, assignee.as_deref())?;
        subtask.assignee_id = assignee;
    }
    if let Some(remark) = payload.remark {
        subtask.remark = validation::optional_text(remark);
    }
    subtask.updated_at = Utc::now();

    if !data.store.update_subtask(&subtask).await? {
        return Err(ApiError::not_found("Subtask not found"));
    }
    info!("Subtask updated: {}", subtask.subtask_id);
    data.publish(&board_id, BoardEvent::SubtaskUpserted { subtask: subtask.clone() });

    Ok(HttpResponse::Ok().json(subtask))
}

/// PUT /boards/{board_id}/tasks/{task_id}/subtasks/{subtask_id}/status
pub async fn set_subtask_status(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
    payload: web::Json<StatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let (board_id, task_id, subtask_id) = path.into_inner();
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    find_parent(&data, &board_id, &task_id).await?;
    check_status(&board, &payload.status)?;

    if !data
        .store
        .set_subtask_status(&task_id, &subtask_id, &payload.status)
        .await?
    {
        return Err(ApiError::not_found("Subtask not found"));
    }
    debug!("Subtask {} moved to {}", subtask_id, payload.status);
    let subtask = find_subtask(&data, &task_id, &subtask_id).await?;
    data.publish(&board_id, BoardEvent::SubtaskUpserted { subtask: subtask.clone() });

    Ok(HttpResponse::Ok().json(subtask))
}

/// PUT /boards/{board_id}/tasks/{task_id}/subtasks/{subtask_id}/assignee
pub async fn assign_subtask(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
    payload: web::Json<AssignRequest>,
) -> Result<HttpResponse, ApiError> {
    let (board_id, task_id, subtask_id) = path.into_inner();
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    find_parent(&data, &board_id, &task_id).await?;
    let mut subtask = find_subtask(&data, &task_id, &subtask_id).await?;

    check_assignee(&board, payload.assignee_id.as_deref())?;
    subtask.assignee_id = payload.into_inner().assignee_id;
    subtask.updated_at = Utc::now();
    data.store.update_subtask(&subtask).await?;
    data.publish(&board_id, BoardEvent::SubtaskUpserted { subtask: subtask.clone() });

    Ok(HttpResponse::Ok().json(subtask))
}

/// DELETE /boards/{board_id}/tasks/{task_id}/subtasks/{subtask_id}
pub async fn delete_subtask(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (board_id, task_id, subtask_id) = path.into_inner();
    let uid = current_user(&req)?;
    require_member(&data, &board_id, &uid).await?;
    find_parent(&data, &board_id, &task_id).await?;

    if !data.store.delete_subtask(&task_id, &subtask_id).await? {
        return Err(ApiError::not_found("Subtask not found"));
    }
    info!("Subtask deleted: {}", subtask_id);
    data.publish(&board_id, BoardEvent::SubtaskDeleted { task_id, subtask_id });

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use crate::test_support::{bearer, create_board, recorded, signup, test_state, watch};
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn subtask_lifecycle() {
        let state = test_state();
        let app = test_app!(state);
        let owner = signup(&state, "owner@example.com", "Owner").await;
        let board_id = create_board(&state, &owner, "Launch").await;

        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks", board_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Parent"}))
            .to_request();
        let task: Value = test::call_and_read_body_json(&app, req).await;
        let base = format!("/boards/{}/tasks/{}/subtasks", board_id, task["task_id"].as_str().unwrap());

        let req = test::TestRequest::post()
            .uri(&base)
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Child", "remark": "needs review", "assignee_id": owner}))
            .to_request();
        let subtask: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(subtask["status"], "todo");
        assert_eq!(subtask["remark"], "needs review");
        let item = format!("{}/{}", base, subtask["subtask_id"].as_str().unwrap());

        let req = test::TestRequest::put()
            .uri(&item)
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Renamed", "status": "in-progress", "remark": null}))
            .to_request();
        let subtask: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(subtask["title"], "Renamed");
        assert_eq!(subtask["status"], "in-progress");
        assert!(subtask["remark"].is_null());

        let req = test::TestRequest::get()
            .uri(&base)
            .insert_header(bearer(&state, &owner))
            .to_request();
        let list: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(list.len(), 1);

        let req = test::TestRequest::delete()
            .uri(&item)
            .insert_header(bearer(&state, &owner))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::delete()
            .uri(&item)
            .insert_header(bearer(&state, &owner))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn subtask_needs_existing_parent() {
        let state = test_state();
        let app = test_app!(state);
        let owner = signup(&state, "owner@example.com", "Owner").await;
        let board_id = create_board(&state, &owner, "Launch").await;

        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks/missing/subtasks", board_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Orphan"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn subtask_changes_are_published_to_the_board() {
        let state = test_state();
        let app = test_app!(state);
        let owner = signup(&state, "owner@example.com", "Owner").await;
        let board_id = create_board(&state, &owner, "Launch").await;

        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks", board_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Parent"}))
            .to_request();
        let task: Value = test::call_and_read_body_json(&app, req).await;
        let subtasks_uri = format!("/boards/{}/tasks/{}/subtasks", board_id, task["task_id"].as_str().unwrap());
        let watcher = watch(&state, &board_id, &owner).await;

        let req = test::TestRequest::post()
            .uri(&subtasks_uri)
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Child"}))
            .to_request();
        let subtask: Value = test::call_and_read_body_json(&app, req).await;
        let uri = format!("{}/{}", subtasks_uri, subtask["subtask_id"].as_str().unwrap());

        let req = test::TestRequest::put()
            .uri(&format!("{}/status", uri))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"status": "done"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::delete()
            .uri(&uri)
            .insert_header(bearer(&state, &owner))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        assert_eq!(
            recorded(&state, &watcher).await,
            ["subtask_upserted", "subtask_upserted", "subtask_deleted"]
        );
    }
}
