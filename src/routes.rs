// src/routes.rs

use actix_web::web;

use crate::auth::{change_password, get_profile, get_user, login, signup, update_profile};
use crate::board::{create_board, delete_board, get_board, get_snapshot, get_statuses, list_boards, update_board};
use crate::dashboard::get_dashboard;
use crate::members::{invite_member, list_members, remove_member};
use crate::my_tasks::my_tasks;
use crate::notifications::{dismiss, list_notifications, mark_all_read, mark_read};
use crate::realtime::session::board_ws;
use crate::subtask::{
    assign_subtask, create_subtask, delete_subtask, list_subtasks, set_subtask_status, update_subtask,
};
use crate::task::{assign_task, create_task, delete_task, get_task, list_tasks, set_task_status, update_task};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/signup", web::post().to(signup))
            .route("/login", web::post().to(login)),
    )
    // USERS
    .service(
        web::scope("/users")
            .route("/me", web::get().to(get_profile))
            .route("/me", web::put().to(update_profile))
            .route("/me/password", web::put().to(change_password))
            .route("/{uid}", web::get().to(get_user)),
    )
    // BOARDS
    .service(
        web::scope("/boards")
            .route("", web::get().to(list_boards))
            .route("", web::post().to(create_board))
            .service(
                web::scope("/{board_id}")
                    .route("", web::get().to(get_board))
                    .route("", web::put().to(update_board))
                    .route("", web::delete().to(delete_board))
                    .route("/statuses", web::get().to(get_statuses))
                    .route("/snapshot", web::get().to(get_snapshot))
                    .service(
                        web::scope("/members")
                            .route("", web::get().to(list_members))
                            .route("", web::post().to(invite_member))
                            .route("/{uid}", web::delete().to(remove_member)),
                    )
                    .service(
                        web::scope("/tasks")
                            .route("", web::get().to(list_tasks))
                            .route("", web::post().to(create_task))
                            .route("/{task_id}", web::get().to(get_task))
                            .route("/{task_id}", web::put().to(update_task))
                            .route("/{task_id}", web::delete().to(delete_task))
                            .route("/{task_id}/status", web::put().to(set_task_status))
                            .route("/{task_id}/assignee", web::put().to(assign_task))
                            .service(
                                web::scope("/{task_id}/subtasks")
                                    .route("", web::get().to(list_subtasks))
                                    .route("", web::post().to(create_subtask))
                                    .route("/{subtask_id}", web::put().to(update_subtask))
                                    .route("/{subtask_id}", web::delete().to(delete_subtask))
                                    .route("/{subtask_id}/status", web::put().to(set_subtask_status))
                                    .route("/{subtask_id}/assignee", web::put().to(assign_subtask)),
                            ),
                    ),
            ),
    )
    // NOTIFICATIONS
    .service(
        web::scope("/notifications")
            .route("", web::get().to(list_notifications))
            .route("/read_all", web::post().to(mark_all_read))
            .route("/{id}/read", web::post().to(mark_read))
            .route("/{id}", web::delete().to(dismiss)),
    )
    .route("/my-tasks", web::get().to(my_tasks))
    .route("/dashboard", web::get().to(get_dashboard))
    // WEBSOCKET route for real-time
    .service(web::resource("/ws/boards/{board_id}").route(web::get().to(board_ws)));
}
