//! Game simulation modules

pub mod lifecycle;
pub mod r#match;
pub mod physics;
pub mod player;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod vector;

pub use r#match::{JoinedMatch, MatchRegistry, MatchSettings, MatchSummary};

use tokio::sync::{mpsc, oneshot};

use crate::ws::protocol::{ClientCommand, ServerMsg};
use player::Team;

/// Commands a connection sends to its match task
#[derive(Debug)]
pub enum MatchCommand {
    /// Seat a new player; the reply carries its roster index
    Join {
        team: Team,
        outbound: mpsc::Sender<ServerMsg>,
        reply: oneshot::Sender<Result<usize, JoinError>>,
    },
    Input {
        player: usize,
        command: ClientCommand,
    },
    Leave {
        player: usize,
    },
}

/// Reasons a handshake does not result in a seat
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("team must be 0 or 1, got {0}")]
    InvalidTeam(i64),

    #[error("total players must be between 1 and {max}, got {requested}")]
    InvalidRoster { requested: i64, max: usize },

    #[error("match is full ({0} players)")]
    MatchFull(usize),

    #[error("match closed")]
    MatchClosed,
}
