//! Per-board live updates over WebSocket.

pub mod hub;
pub mod session;

pub use hub::{BoardEvent, BoardHub, Publish};
