//! Outbound queues of the players in a match
//!
//! The tick task only ever uses `try_send`. A full queue drops a `Tick` for
//! that player; too many drops in a row disconnect them. Any other message
//! meeting a full queue disconnects the player at once, since a later tick
//! would not carry what was lost.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

use crate::ws::protocol::ServerMsg;

/// Outbound queue of one player
#[derive(Debug)]
struct Session {
    tx: mpsc::Sender<ServerMsg>,
    dropped_in_a_row: u32,
}

/// What happened to a message handed to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    Dropped,
    Disconnected,
}

/// Per-match set of outbound queues, indexed like the roster
#[derive(Debug)]
pub struct SessionHub {
    sessions: Vec<Option<Session>>,
    max_dropped_frames: u32,
}

impl SessionHub {
    pub fn new(max_dropped_frames: u32) -> Self {
        Self {
            sessions: Vec::new(),
            max_dropped_frames: max_dropped_frames.max(1),
        }
    }

    /// Register the outbound queue of the player at `index`
    pub fn attach(&mut self, index: usize, tx: mpsc::Sender<ServerMsg>) {
        if self.sessions.len() <= index {
            self.sessions.resize_with(index + 1, || None);
        }
        self.sessions[index] = Some(Session {
            tx,
            dropped_in_a_row: 0,
        });
    }

    /// Drop the player's queue; its writer task ends once the queue drains
    pub fn detach(&mut self, index: usize) -> bool {
        self.sessions
            .get_mut(index)
            .and_then(Option::take)
            .is_some()
    }

    pub fn is_connected(&self, index: usize) -> bool {
        matches!(self.sessions.get(index), Some(Some(_)))
    }

    pub fn connected(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_some()).count()
    }

    pub fn send_to(&mut self, index: usize, msg: ServerMsg) -> Delivery {
        let max = self.max_dropped_frames;
        let Some(slot) = self.sessions.get_mut(index) else {
            return Delivery::Disconnected;
        };
        let Some(session) = slot.as_mut() else {
            return Delivery::Disconnected;
        };

        match session.tx.try_send(msg) {
            Ok(()) => {
                session.dropped_in_a_row = 0;
                Delivery::Queued
            }
            Err(TrySendError::Full(rejected)) if !matches!(rejected, ServerMsg::Tick(_)) => {
                warn!(
                    player = index,
                    msg_id = rejected.msg_id(),
                    "Outbound queue full for control message, disconnecting"
                );
                *slot = None;
                Delivery::Disconnected
            }
            Err(TrySendError::Full(_)) => {
                session.dropped_in_a_row += 1;
                if session.dropped_in_a_row == 1 {
                    warn!(player = index, "Outbound queue full, dropping frames");
                }
                if session.dropped_in_a_row >= max {
                    warn!(
                        player = index,
                        dropped = session.dropped_in_a_row,
                        "Player not draining outbound queue, disconnecting"
                    );
                    *slot = None;
                    Delivery::Disconnected
                } else {
                    Delivery::Dropped
                }
            }
            Err(TrySendError::Closed(_)) => {
                info!(player = index, "Outbound queue closed");
                *slot = None;
                Delivery::Disconnected
            }
        }
    }

    /// Send to every connected player
    pub fn broadcast(&mut self, msg: &ServerMsg) {
        self.broadcast_except(None, msg);
    }

    /// Send to every connected player other than `skip`
    pub fn broadcast_except(&mut self, skip: Option<usize>, msg: &ServerMsg) {
        for index in 0..self.sessions.len() {
            if Some(index) == skip || !self.is_connected(index) {
                continue;
            }
            self.send_to(index, msg.clone());
        }
    }
}
