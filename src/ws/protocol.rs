//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize, Serializer};

use crate::game::vector::{Rect, Vec2};

/// First message on every connection
#[derive(Debug, Clone, Deserialize)]
pub struct Handshake {
    /// Match to join; the first join creates it
    #[serde(alias = "GameId", alias = "gameId", alias = "matchId")]
    pub game_id: String,
    /// 0 or 1
    #[serde(alias = "Team")]
    pub team: i64,
    /// Roster size, fixed by the first join
    #[serde(alias = "TotalPlayers", alias = "totalPlayers")]
    pub total_players: i64,
}

impl Handshake {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Commands sent from client to server after the handshake.
///
/// Wire form is a tag byte followed by a value: `f`/`m` + `d` (down) or
/// anything else (up), `r` + decimal angle in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientCommand {
    /// Boost / forward-thrust key
    Boost(bool),
    /// Continuous drive (mouse button)
    Drive(bool),
    /// Desired facing in radians
    Aim(f32),
}

impl ClientCommand {
    pub fn parse(payload: &[u8]) -> Result<Self, CommandParseError> {
        let (&tag, value) = match payload.split_first() {
            Some((tag, value)) if !value.is_empty() => (tag, value),
            _ => return Err(CommandParseError::TooShort(payload.len())),
        };

        match tag {
            b'f' => Ok(Self::Boost(value[0] == b'd')),
            b'm' => Ok(Self::Drive(value[0] == b'd')),
            b'r' => {
                let angle = std::str::from_utf8(value)
                    .ok()
                    .and_then(|s| s.trim().parse::<f32>().ok())
                    .filter(|a| a.is_finite())
                    .ok_or(CommandParseError::InvalidAngle)?;
                Ok(Self::Aim(angle))
            }
            other => Err(CommandParseError::UnknownTag(other as char)),
        }
    }
}

/// Inbound payloads that are dropped without a reply
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandParseError {
    #[error("payload too short ({0} bytes)")]
    TooShort(usize),

    #[error("unknown command tag {0:?}")]
    UnknownTag(char),

    #[error("angle is not a finite number")]
    InvalidAngle,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMsg {
    /// Full match layout, sent once to a joining player
    Hello(HelloMsg),
    /// Sent to everyone else when a player joins
    PlayerJoined(PlayerJoinedMsg),
    /// Per-tick positions
    Tick(TickMsg),
    /// Countdown digits and score lines
    Text(TextMsg),
}

impl ServerMsg {
    /// Numeric discriminator carried as `msgId`
    pub fn msg_id(&self) -> u8 {
        match self {
            Self::Hello(_) => 1,
            Self::PlayerJoined(_) => 2,
            Self::Tick(_) => 3,
            Self::Text(_) => 4,
        }
    }

    pub fn text(message: impl Into<String>) -> Self {
        Self::Text(TextMsg {
            message: message.into(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Serialize)]
struct Tagged<'a, T: Serialize> {
    #[serde(rename = "msgId")]
    msg_id: u8,
    #[serde(flatten)]
    body: &'a T,
}

impl Serialize for ServerMsg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let msg_id = self.msg_id();
        match self {
            Self::Hello(body) => Tagged { msg_id, body }.serialize(serializer),
            Self::PlayerJoined(body) => Tagged { msg_id, body }.serialize(serializer),
            Self::Tick(body) => Tagged { msg_id, body }.serialize(serializer),
            Self::Text(body) => Tagged { msg_id, body }.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloMsg {
    pub player_positions: Vec<Vec2>,
    pub player_angles: Vec<f32>,
    pub teams: Vec<u8>,
    pub local_player_index: usize,
    pub field_width: f32,
    pub field_height: f32,
    pub static_colliders: Vec<Rect>,
    pub ball: Vec2,
    pub goals: Vec<Rect>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerJoinedMsg {
    pub position: Vec2,
    pub angle: f32,
    pub team: u8,
}

/// One player's entry in a tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerTick {
    /// Player index
    #[serde(rename = "p")]
    pub player: usize,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "a")]
    pub angle: f32,
    /// Boost input currently held
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickMsg {
    #[serde(rename = "pt")]
    pub players: Vec<PlayerTick>,
    pub ball: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextMsg {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_flag_commands() {
        assert_eq!(ClientCommand::parse(b"fd"), Ok(ClientCommand::Boost(true)));
        assert_eq!(ClientCommand::parse(b"fu"), Ok(ClientCommand::Boost(false)));
        assert_eq!(ClientCommand::parse(b"md"), Ok(ClientCommand::Drive(true)));
        assert_eq!(ClientCommand::parse(b"mx"), Ok(ClientCommand::Drive(false)));
    }

    #[test]
    fn parses_angle_command() {
        assert_eq!(
            ClientCommand::parse(b"r-1.5707"),
            Ok(ClientCommand::Aim(-1.5707))
        );
        assert_eq!(ClientCommand::parse(b"r3"), Ok(ClientCommand::Aim(3.0)));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!(
            ClientCommand::parse(b"f"),
            Err(CommandParseError::TooShort(1))
        );
        assert_eq!(ClientCommand::parse(b""), Err(CommandParseError::TooShort(0)));
        assert_eq!(
            ClientCommand::parse(b"rabc"),
            Err(CommandParseError::InvalidAngle)
        );
        assert_eq!(
            ClientCommand::parse(b"rNaN"),
            Err(CommandParseError::InvalidAngle)
        );
        assert_eq!(
            ClientCommand::parse(b"wd"),
            Err(CommandParseError::UnknownTag('w'))
        );
    }

    #[test]
    fn handshake_accepts_both_casings() {
        let go_style: Handshake =
            Handshake::parse(r#"{"GameId":"abc","Team":1,"TotalPlayers":4}"#).unwrap();
        assert_eq!(go_style.game_id, "abc");
        assert_eq!(go_style.team, 1);
        assert_eq!(go_style.total_players, 4);

        let camel: Handshake =
            Handshake::parse(r#"{"matchId":"xyz","team":0,"totalPlayers":2}"#).unwrap();
        assert_eq!(camel.game_id, "xyz");
        assert_eq!(camel.total_players, 2);

        assert!(Handshake::parse(r#"{"team":0}"#).is_err());
    }

    #[test]
    fn server_messages_carry_msg_id() {
        let text = serde_json::to_value(ServerMsg::text("1:0")).unwrap();
        assert_eq!(text, json!({ "msgId": 4, "message": "1:0" }));

        let tick = ServerMsg::Tick(TickMsg {
            players: vec![PlayerTick {
                player: 0,
                x: 200.0,
                y: 390.0,
                angle: 0.0,
                force: true,
            }],
            ball: Vec2::new(500.0, 350.0),
        });
        assert_eq!(
            serde_json::to_value(tick).unwrap(),
            json!({
                "msgId": 3,
                "pt": [{ "p": 0, "x": 200.0, "y": 390.0, "a": 0.0, "force": true }],
                "ball": { "x": 500.0, "y": 350.0 }
            })
        );
    }

    #[test]
    fn hello_uses_camel_case_fields() {
        let hello = ServerMsg::Hello(HelloMsg {
            player_positions: vec![Vec2::new(1.0, 2.0)],
            player_angles: vec![0.0],
            teams: vec![0],
            local_player_index: 0,
            field_width: 1000.0,
            field_height: 700.0,
            static_colliders: vec![Rect::new(0.0, 0.0, 60.0, 250.0)],
            ball: Vec2::new(500.0, 350.0),
            goals: vec![],
        });
        let value = serde_json::to_value(hello).unwrap();
        assert_eq!(value["msgId"], 1);
        assert_eq!(value["localPlayerIndex"], 0);
        assert_eq!(value["fieldWidth"], 1000.0);
        assert_eq!(value["staticColliders"][0]["height"], 250.0);
        assert_eq!(value["playerPositions"][0]["y"], 2.0);
    }
}
