// Shared fixtures for handler tests.

use std::sync::Arc;

use actix::prelude::*;
use actix_web::{http::header, web};
use chrono::Utc;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::create_jwt;
use crate::config::Config;
use crate::models::board::Board;
use crate::models::user::User;
use crate::realtime::hub::{Subscribe, SubscriberCount};
use crate::realtime::{BoardEvent, BoardHub};
use crate::store::MemoryStore;

pub const PASSWORD: &str = "correct-horse";

/// Builds the full routed app around `state`, with authentication.
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(crate::middleware::Authentication::new(&$state.config.jwt_secret))
                .app_data($state.clone())
                .configure(crate::routes::configure),
        )
        .await
    };
}

/// Must be called from inside a running actix system.
pub fn test_state() -> web::Data<AppState> {
    web::Data::new(AppState {
        store: Arc::new(MemoryStore::new()),
        hub: BoardHub::new().start(),
        config: Config::for_tests(),
    })
}

/// Inserts a user with [`PASSWORD`] and returns its uid.
pub async fn signup(state: &AppState, email: &str, display_name: &str) -> String {
    let user = User {
        user_id: Uuid::new_v4().to_string(),
        email: email.trim().to_lowercase(),
        display_name: Some(display_name.to_string()),
        photo_url: None,
        password_hash: bcrypt::hash(PASSWORD, state.config.bcrypt_cost).unwrap(),
        created_at: Utc::now(),
    };
    state.store.insert_user(&user).await.unwrap();
    user.user_id
}

pub async fn create_board(state: &AppState, owner: &str, name: &str) -> String {
    let board = Board {
        board_id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: None,
        owner_id: owner.to_string(),
        members: vec![owner.to_string()],
        custom_statuses: None,
        created_at: Utc::now(),
    };
    state.store.insert_board(&board).await.unwrap();
    board.board_id
}

/// Stand-in for a WebSocket session; keeps every event it is sent.
#[derive(Default)]
pub struct EventRecorder {
    events: Vec<BoardEvent>,
}

impl Actor for EventRecorder {
    type Context = Context<Self>;
}

impl Handler<BoardEvent> for EventRecorder {
    type Result = ();

    fn handle(&mut self, msg: BoardEvent, _: &mut Context<Self>) {
        self.events.push(msg);
    }
}

#[derive(Message)]
#[rtype(result = "Vec<BoardEvent>")]
pub struct Drain;

impl Handler<Drain> for EventRecorder {
    type Result = MessageResult<Drain>;

    fn handle(&mut self, _: Drain, _: &mut Context<Self>) -> Self::Result {
        MessageResult(std::mem::take(&mut self.events))
    }
}

/// Subscribes a recorder to `board_id` on the app's hub as `user_id`.
pub async fn watch(state: &AppState, board_id: &str, user_id: &str) -> Addr<EventRecorder> {
    let recorder = EventRecorder::default().start();
    state
        .hub
        .send(Subscribe {
            board_id: board_id.to_string(),
            user_id: user_id.to_string(),
            addr: recorder.clone().recipient(),
        })
        .await
        .unwrap();
    recorder
}

/// `type` tags of everything the recorder got since the last call.
///
/// Handlers publish with `do_send`, so the hub is queried first to make sure
/// it has fanned out every pending event.
pub async fn recorded(state: &AppState, recorder: &Addr<EventRecorder>) -> Vec<String> {
    state
        .hub
        .send(SubscriberCount { board_id: String::new() })
        .await
        .unwrap();
    recorder
        .send(Drain)
        .await
        .unwrap()
        .iter()
        .map(|e| serde_json::to_value(e).unwrap()["type"].as_str().unwrap().to_string())
        .collect()
}

pub fn bearer(state: &AppState, uid: &str) -> (header::HeaderName, String) {
    let token = create_jwt(uid, &state.config.jwt_secret, state.config.token_ttl_hours).unwrap();
    (header::AUTHORIZATION, format!("Bearer {}", token))
}
