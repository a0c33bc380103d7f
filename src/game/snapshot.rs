//! Builds outbound messages from match state

use crate::ws::protocol::{HelloMsg, PlayerJoinedMsg, PlayerTick, ServerMsg, TickMsg};

use super::state::MatchState;

/// Per-tick positions of every player and the ball
pub fn tick(state: &MatchState) -> ServerMsg {
    let players = state
        .players
        .iter()
        .enumerate()
        .map(|(index, player)| {
            let body = state.body(index);
            PlayerTick {
                player: index,
                x: body.position.x,
                y: body.position.y,
                angle: player.angle,
                force: player.input.boost,
            }
        })
        .collect();

    ServerMsg::Tick(TickMsg {
        players,
        ball: state.ball().position,
    })
}

/// Full layout for the player at `local_index`
pub fn hello(state: &MatchState, local_index: usize) -> ServerMsg {
    let mut positions = Vec::with_capacity(state.players.len());
    let mut angles = Vec::with_capacity(state.players.len());
    let mut teams = Vec::with_capacity(state.players.len());
    for (index, player) in state.players.iter().enumerate() {
        positions.push(state.body(index).position);
        angles.push(player.angle);
        teams.push(player.team.index() as u8);
    }

    ServerMsg::Hello(HelloMsg {
        player_positions: positions,
        player_angles: angles,
        teams,
        local_player_index: local_index,
        field_width: state.arena.width,
        field_height: state.arena.height,
        static_colliders: state.arena.colliders.clone(),
        ball: state.ball().position,
        goals: state.arena.goals.to_vec(),
    })
}

/// Announcement of the player at `index` to everyone else
pub fn player_joined(state: &MatchState, index: usize) -> ServerMsg {
    let player = &state.players[index];
    ServerMsg::PlayerJoined(PlayerJoinedMsg {
        position: state.body(index).position,
        angle: player.angle,
        team: player.team.index() as u8,
    })
}
