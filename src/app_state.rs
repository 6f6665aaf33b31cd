use std::sync::Arc;

use actix::Addr;

use crate::config::Config;
use crate::realtime::{BoardEvent, BoardHub, Publish};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub hub: Addr<BoardHub>,
    pub config: Config,
}

impl AppState {
    /// Fire-and-forget fan-out to live board sessions.
    pub fn publish(&self, board_id: &str, event: BoardEvent) {
        self.hub.do_send(Publish {
            board_id: board_id.to_string(),
            event,
        });
    }
}
