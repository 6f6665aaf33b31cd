// src/task.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, info};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::board::require_member;
use crate::error::ApiError;
use crate::models::board::Board;
use crate::models::task::{AssignRequest, CreateTaskRequest, StatusRequest, Task, UpdateTaskRequest};
use crate::models::DONE_STATUS;
use crate::realtime::BoardEvent;
use crate::validation;

pub fn check_status(board: &Board, status: &str) -> Result<(), ApiError> {
    if board.has_status(status) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("Unknown status for this board: {}", status)))
    }
}

/// Assignees must currently belong to the board.
pub fn check_assignee(board: &Board, assignee: Option<&str>) -> Result<(), ApiError> {
    match assignee {
        Some(uid) if !board.is_member(uid) => {
            Err(ApiError::bad_request("Assignee must be a member of this board"))
        }
        _ => Ok(()),
    }
}

/// A task may only move to `done` once every subtask is `done`.
async fn check_can_complete(data: &AppState, task_id: &str) -> Result<(), ApiError> {
    let open = data
        .store
        .list_subtasks(task_id)
        .await?
        .iter()
        .filter(|s| s.status != DONE_STATUS)
        .count();
    if open > 0 {
        return Err(ApiError::conflict(format!(
            "Cannot mark task as done: {} subtask(s) are not done",
            open
        )));
    }
    Ok(())
}

async fn find_task(data: &AppState, board_id: &str, task_id: &str) -> Result<Task, ApiError> {
    data.store
        .find_task(board_id, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))
}

/// GET /boards/{board_id}/tasks
pub async fn list_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
    board_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    let tasks = data.store.list_tasks(&board.board_id).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// POST /boards/{board_id}/tasks
pub async fn create_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    board_id: web::Path<String>,
    payload: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    let payload = payload.into_inner();

    let status = payload.status.unwrap_or_else(|| board.initial_status());
    check_status(&board, &status)?;
    check_assignee(&board, payload.assignee_id.as_deref())?;

    let now = Utc::now();
    let task = Task {
        task_id: Uuid::new_v4().to_string(),
        board_id: board.board_id.clone(),
        title: validation::required_text("Title", &payload.title)?,
        description: validation::optional_text(payload.description),
        status,
        due_date: payload.due_date,
        owner_id: uid,
        assignee_id: payload.assignee_id,
        remark: validation::optional_text(payload.remark),
        created_at: now,
        updated_at: now,
    };
    data.store.insert_task(&task).await?;
    info!("Task created: {} on board {}", task.task_id, task.board_id);
    data.publish(&task.board_id, BoardEvent::TaskUpserted { task: task.clone() });

    Ok(HttpResponse::Created().json(task))
}

/// GET /boards/{board_id}/tasks/{task_id}
pub async fn get_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (board_id, task_id) = path.into_inner();
    let uid = current_user(&req)?;
    require_member(&data, &board_id, &uid).await?;
    Ok(HttpResponse::Ok().json(find_task(&data, &board_id, &task_id).await?))
}

/// PUT /boards/{board_id}/tasks/{task_id}
pub async fn update_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    payload: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let (board_id, task_id) = path.into_inner();
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    let mut task = find_task(&data, &board_id, &task_id).await?;
    let payload = payload.into_inner();

    if let Some(title) = &payload.title {
        task.title = validation::required_text("Title", title)?;
    }
    if let Some(description) = payload.description {
        task.description = validation::optional_text(description);
    }
    if let Some(due_date) = payload.due_date {
        task.due_date = due_date;
    }
    if let Some(assignee) = payload.assignee_id {
        check_assignee(&board, assignee.as_deref())?;
        task.assignee_id = assignee;
    }
    if let Some(remark) = payload.remark {
        task.remark = validation::optional_text(remark);
    }
    if let Some(status) = payload.status {
        check_status(&board, &status)?;
        if status == DONE_STATUS && task.status != DONE_STATUS {
            check_can_complete(&data, &task.task_id).await?;
        }
        task.status = status;
    }
    task.updated_at = Utc::now();

    if !data.store.update_task(&task).await? {
        return Err(ApiError::not_found("Task not found"));
    }
    info!("Task updated: {}", task.task_id);
    data.publish(&board_id, BoardEvent::TaskUpserted { task: task.clone() });

    Ok(HttpResponse::Ok().json(task))
}

/// PUT /boards/{board_id}/tasks/{task_id}/status
/// Column move from the board view.
pub async fn set_task_status(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    payload: web::Json<StatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let (board_id, task_id) = path.into_inner();
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    let task = find_task(&data, &board_id, &task_id).await?;
    check_status(&board, &payload.status)?;
    if payload.status == DONE_STATUS {
        check_can_complete(&data, &task.task_id).await?;
    }

    if !data.store.set_task_status(&board_id, &task_id, &payload.status).await? {
        return Err(ApiError::not_found("Task not found"));
    }
    debug!("Task {} moved to {}", task_id, payload.status);
    let task = find_task(&data, &board_id, &task_id).await?;
    data.publish(&board_id, BoardEvent::TaskUpserted { task: task.clone() });

    Ok(HttpResponse::Ok().json(task))
}

/// PUT /boards/{board_id}/tasks/{task_id}/assignee
pub async fn assign_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    payload: web::Json<AssignRequest>,
) -> Result<HttpResponse, ApiError> {
    let (board_id, task_id) = path.into_inner();
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    let mut task = find_task(&data, &board_id, &task_id).await?;

    check_assignee(&board, payload.assignee_id.as_deref())?;
    task.assignee_id = payload.into_inner().assignee_id;
    task.updated_at = Utc::now();
    data.store.update_task(&task).await?;
    data.publish(&board_id, BoardEvent::TaskUpserted { task: task.clone() });

    Ok(HttpResponse::Ok().json(task))
}

/// DELETE /boards/{board_id}/tasks/{task_id}
/// Removes the task together with its subtasks.
pub async fn delete_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (board_id, task_id) = path.into_inner();
    let uid = current_user(&req)?;
    require_member(&data, &board_id, &uid).await?;

    if !data.store.delete_task(&board_id, &task_id).await? {
        return Err(ApiError::not_found("Task not found"));
    }
    info!("Task deleted: {} (with subtasks)", task_id);
    data.publish(&board_id, BoardEvent::TaskDeleted { task_id });

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use crate::test_support::{bearer, create_board, recorded, signup, test_state, watch};
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn creating_a_task_adds_it_to_the_list() {
        let state = test_state();
        let app = test_app!(state);
        let owner = signup(&state, "owner@example.com", "Owner").await;
        let board_id = create_board(&state, &owner, "Launch").await;

        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks", board_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Write docs", "due_date": "2030-01-01T00:00:00Z"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let task: Value = test::read_body_json(resp).await;
        assert_eq!(task["status"], "todo");
        assert_eq!(task["owner_id"], json!(owner));

        let req = test::TestRequest::get()
            .uri(&format!("/boards/{}/tasks", board_id))
            .insert_header(bearer(&state, &owner))
            .to_request();
        let tasks: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["title"], "Write docs");
    }

    #[actix_web::test]
    async fn unknown_status_and_outside_assignee_rejected() {
        let state = test_state();
        let app = test_app!(state);
        let owner = signup(&state, "owner@example.com", "Owner").await;
        let outsider = signup(&state, "out@example.com", "Out").await;
        let board_id = create_board(&state, &owner, "Launch").await;

        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks", board_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Bad", "status": "blocked"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks", board_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Bad", "assignee_id": outsider}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn task_cannot_be_done_with_open_subtasks() {
        let state = test_state();
        let app = test_app!(state);
        let owner = signup(&state, "owner@example.com", "Owner").await;
        let board_id = create_board(&state, &owner, "Launch").await;

        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks", board_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Release"}))
            .to_request();
        let task: Value = test::call_and_read_body_json(&app, req).await;
        let task_id = task["task_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks/{}/subtasks", board_id, task_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Tag build"}))
            .to_request();
        let subtask: Value = test::call_and_read_body_json(&app, req).await;
        let subtask_id = subtask["subtask_id"].as_str().unwrap().to_string();

        for uri in [
            format!("/boards/{}/tasks/{}/status", board_id, task_id),
            format!("/boards/{}/tasks/{}", board_id, task_id),
        ] {
            let req = test::TestRequest::put()
                .uri(&uri)
                .insert_header(bearer(&state, &owner))
                .set_json(json!({"status": "done"}))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::CONFLICT);
        }

        let req = test::TestRequest::put()
            .uri(&format!("/boards/{}/tasks/{}/subtasks/{}/status", board_id, task_id, subtask_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"status": "done"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::put()
            .uri(&format!("/boards/{}/tasks/{}/status", board_id, task_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"status": "done"}))
            .to_request();
        let task: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(task["status"], "done");
    }

    #[actix_web::test]
    async fn update_clears_fields_with_null() {
        let state = test_state();
        let app = test_app!(state);
        let owner = signup(&state, "owner@example.com", "Owner").await;
        let board_id = create_board(&state, &owner, "Launch").await;

        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks", board_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({
                "title": "Plan",
                "description": "Q3",
                "due_date": "2030-01-01T00:00:00Z",
                "assignee_id": owner
            }))
            .to_request();
        let task: Value = test::call_and_read_body_json(&app, req).await;
        let task_id = task["task_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri(&format!("/boards/{}/tasks/{}", board_id, task_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"due_date": null, "assignee_id": null, "remark": "waiting on legal"}))
            .to_request();
        let task: Value = test::call_and_read_body_json(&app, req).await;
        assert!(task["due_date"].is_null());
        assert!(task["assignee_id"].is_null());
        assert_eq!(task["description"], "Q3");
        assert_eq!(task["remark"], "waiting on legal");
    }

    #[actix_web::test]
    async fn deleting_a_task_removes_its_subtasks() {
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
        let task_id = task["task_id"].as_str().unwrap().to_string();

        for title in ["One", "Two"] {
            let req = test::TestRequest::post()
                .uri(&format!("/boards/{}/tasks/{}/subtasks", board_id, task_id))
                .insert_header(bearer(&state, &owner))
                .set_json(json!({"title": title}))
                .to_request();
            test::call_service(&app, req).await;
        }
        assert_eq!(state.store.list_subtasks(&task_id).await.unwrap().len(), 2);

        let req = test::TestRequest::delete()
            .uri(&format!("/boards/{}/tasks/{}", board_id, task_id))
            .insert_header(bearer(&state, &owner))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(state.store.list_subtasks(&task_id).await.unwrap().is_empty());

        let req = test::TestRequest::get()
            .uri(&format!("/boards/{}/tasks/{}", board_id, task_id))
            .insert_header(bearer(&state, &owner))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn assign_requires_membership() {
        let state = test_state();
        let app = test_app!(state);
        let owner = signup(&state, "owner@example.com", "Owner").await;
        let member = signup(&state, "member@example.com", "Member").await;
        let board_id = create_board(&state, &owner, "Launch").await;

        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks", board_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Review"}))
            .to_request();
        let task: Value = test::call_and_read_body_json(&app, req).await;
        let uri = format!("/boards/{}/tasks/{}/assignee", board_id, task["task_id"].as_str().unwrap());

        let req = test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"assignee_id": member}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        state.store.add_board_member(&board_id, &member).await.unwrap();
        let req = test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"assignee_id": member}))
            .to_request();
        let task: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(task["assignee_id"], json!(member));
    }

    #[actix_web::test]
    async fn status_move_checks_the_task_belongs_to_the_board() {
        let state = test_state();
        let app = test_app!(state);
        let owner = signup(&state, "owner@example.com", "Owner").await;
        let board_a = create_board(&state, &owner, "A").await;
        let board_b = create_board(&state, &owner, "B").await;

        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks", board_b))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Elsewhere"}))
            .to_request();
        let task: Value = test::call_and_read_body_json(&app, req).await;
        let task_id = task["task_id"].as_str().unwrap().to_string();
        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks/{}/subtasks", board_b, task_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Still open"}))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::put()
            .uri(&format!("/boards/{}/tasks/{}/status", board_a, task_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"status": "done"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn task_changes_are_published_to_the_board() {
        let state = test_state();
        let app = test_app!(state);
        let owner = signup(&state, "owner@example.com", "Owner").await;
        let board_id = create_board(&state, &owner, "Launch").await;
        let other_board = create_board(&state, &owner, "Other").await;
        let watcher = watch(&state, &board_id, &owner).await;
        let bystander = watch(&state, &other_board, &owner).await;

        let req = test::TestRequest::post()
            .uri(&format!("/boards/{}/tasks", board_id))
            .insert_header(bearer(&state, &owner))
            .set_json(json!({"title": "Ship"}))
            .to_request();
        let task: Value = test::call_and_read_body_json(&app, req).await;
        let uri = format!("/boards/{}/tasks/{}", board_id, task["task_id"].as_str().unwrap());

        let edits = [
            (uri.clone(), json!({"title": "Ship it"})),
            (format!("{}/status", uri), json!({"status": "in-progress"})),
            (format!("{}/assignee", uri), json!({"assignee_id": owner})),
        ];
        for (uri, body) in edits {
            let req = test::TestRequest::put()
                .uri(&uri)
                .insert_header(bearer(&state, &owner))
                .set_json(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
        let req = test::TestRequest::delete()
            .uri(&uri)
            .insert_header(bearer(&state, &owner))
            .to_request();
        test::call_service(&app, req).await;

        assert_eq!(
            recorded(&state, &watcher).await,
            ["task_upserted", "task_upserted", "task_upserted", "task_upserted", "task_deleted"]
        );
        assert!(recorded(&state, &bystander).await.is_empty());
    }
}
