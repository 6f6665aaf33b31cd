use std::collections::HashMap;

use actix::prelude::*;
use log::{debug, info};
use serde::Serialize;

use crate::models::board::Board;
use crate::models::task::{Subtask, Task};
use crate::models::user::BoardMember;

/// Change notification pushed to every session watching a board.
#[derive(Message, Serialize, Debug, Clone)]
#[rtype(result = "()")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEvent {
    BoardUpdated { board: Board },
    BoardDeleted { board_id: String },
    MembersChanged { members: Vec<BoardMember> },
    TaskUpserted { task: Task },
    TaskDeleted { task_id: String },
    SubtaskUpserted { subtask: Subtask },
    SubtaskDeleted { task_id: String, subtask_id: String },
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub board_id: String,
    pub user_id: String,
    pub addr: Recipient<BoardEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub board_id: String,
    pub addr: Recipient<BoardEvent>,
}

/// Fan an event out to a board's subscribers; yields the delivery count.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct Publish {
    pub board_id: String,
    pub event: BoardEvent,
}

#[derive(Message)]
#[rtype(result = "usize")]
pub struct SubscriberCount {
    pub board_id: String,
}

struct Subscriber {
    user_id: String,
    addr: Recipient<BoardEvent>,
}

/// Routes board events to the sessions subscribed to that board.
///
/// A `MembersChanged` event is delivered to every session, then sessions of
/// users missing from the new member list are dropped. `BoardDeleted` drops
/// the whole board.
#[derive(Default)]
pub struct BoardHub {
    subscribers: HashMap<String, Vec<Subscriber>>,
}

impl BoardHub {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for BoardHub {
    type Context = Context<Self>;
}

impl Handler<Subscribe> for BoardHub {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _: &mut Context<Self>) {
        info!("User {} subscribed to board {}", msg.user_id, msg.board_id);
        self.subscribers.entry(msg.board_id).or_default().push(Subscriber {
            user_id: msg.user_id,
            addr: msg.addr,
        });
    }
}

impl Handler<Unsubscribe> for BoardHub {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _: &mut Context<Self>) {
        if let Some(subs) = self.subscribers.get_mut(&msg.board_id) {
            subs.retain(|s| s.addr != msg.addr);
            if subs.is_empty() {
                self.subscribers.remove(&msg.board_id);
            }
        }
        debug!("Session left board {}", msg.board_id);
    }
}

impl Handler<Publish> for BoardHub {
    type Result = usize;

    fn handle(&mut self, msg: Publish, _: &mut Context<Self>) -> usize {
        let subs = match self.subscribers.get_mut(&msg.board_id) {
            Some(subs) => subs,
            None => return 0,
        };
        for sub in subs.iter() {
            sub.addr.do_send(msg.event.clone());
        }
        let delivered = subs.len();
        debug!("Published event to {} session(s) on board {}", delivered, msg.board_id);

        match &msg.event {
            BoardEvent::MembersChanged { members } => {
                subs.retain(|s| {
                    let still_member = members.iter().any(|m| m.uid == s.user_id);
                    if !still_member {
                        info!("Dropping session of user {} from board {}", s.user_id, msg.board_id);
                    }
                    still_member
                });
                if subs.is_empty() {
                    self.subscribers.remove(&msg.board_id);
                }
            }
            BoardEvent::BoardDeleted { .. } => {
                self.subscribers.remove(&msg.board_id);
            }
            _ => {}
        }
        delivered
    }
}

impl Handler<SubscriberCount> for BoardHub {
    type Result = usize;

    fn handle(&mut self, msg: SubscriberCount, _: &mut Context<Self>) -> usize {
        self.subscribers.get(&msg.board_id).map_or(0, |s| s.len())
    }
}
