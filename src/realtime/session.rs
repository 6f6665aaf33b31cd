use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, error, info};
use serde::Serialize;

use super::hub::{BoardEvent, BoardHub, Subscribe, Unsubscribe};
use crate::app_state::AppState;
use crate::auth::current_user;
use crate::board::{load_snapshot, require_member};
use crate::models::board::BoardSnapshot;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SnapshotFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    snapshot: &'a BoardSnapshot,
}

/// One browser tab watching one board.
pub struct BoardSession {
    pub user_id: String,
    pub board_id: String,
    pub hb: Instant,
    pub hub: Addr<BoardHub>,
    snapshot: Option<BoardSnapshot>,
}

impl BoardSession {
    pub fn new(user_id: String, board_id: String, hub: Addr<BoardHub>, snapshot: BoardSnapshot) -> Self {
        BoardSession {
            user_id,
            board_id,
            hb: Instant::now(),
            hub,
            snapshot: Some(snapshot),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                info!("Board session heartbeat failed for user {}, disconnecting", act.user_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for BoardSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);

        if let Some(snapshot) = self.snapshot.take() {
            let frame = SnapshotFrame { kind: "snapshot", snapshot: &snapshot };
            match serde_json::to_string(&frame) {
                Ok(text) => ctx.text(text),
                Err(e) => error!("Failed to serialize board snapshot: {}", e),
            }
        }

        self.hub.do_send(Subscribe {
            board_id: self.board_id.clone(),
            user_id: self.user_id.clone(),
            addr: ctx.address().recipient(),
        });
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.hub.do_send(Unsubscribe {
            board_id: self.board_id.clone(),
            addr: ctx.address().recipient(),
        });
    }
}

impl Handler<BoardEvent> for BoardSession {
    type Result = ();

    fn handle(&mut self, msg: BoardEvent, ctx: &mut Self::Context) {
        let access_lost = match &msg {
            BoardEvent::BoardDeleted { .. } => true,
            BoardEvent::MembersChanged { members } => !members.iter().any(|m| m.uid == self.user_id),
            _ => false,
        };
        match serde_json::to_string(&msg) {
            Ok(text) => ctx.text(text),
            Err(e) => error!("Failed to serialize board event: {}", e),
        }
        if access_lost {
            info!("Closing board session of user {} on board {}", self.user_id, self.board_id);
            ctx.close(None);
            ctx.stop();
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for BoardSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                // Read-only channel; mutations go through the REST endpoints.
                debug!("Ignoring client frame on board {}: {}", self.board_id, text);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                error!("Board session protocol error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// GET /ws/boards/{board_id}
pub async fn board_ws(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
    board_id: web::Path<String>,
) -> Result<HttpResponse, actix_web::Error> {
    let uid = current_user(&req)?;
    let board = require_member(&data, &board_id, &uid).await?;
    let snapshot = load_snapshot(&data, board).await?;

    let session = BoardSession::new(uid, board_id.into_inner(), data.hub.clone(), snapshot);
    ws::start(session, &req, stream)
}
