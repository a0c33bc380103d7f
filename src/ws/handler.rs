//! WebSocket upgrade handler

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::JoinedMatch;
use crate::ws::protocol::{ClientCommand, Handshake, ServerMsg};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// Why a connection never got past its handshake
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("no handshake received within {0:?}")]
    Timeout(Duration),

    #[error("connection closed before handshake")]
    Closed,

    #[error("malformed handshake: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("handshake is not valid UTF-8")]
    NotUtf8,

    #[error("websocket error: {0}")]
    Socket(#[from] axum::Error),
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    let timeout = Duration::from_secs(state.config.handshake_timeout_secs);
    let handshake = match read_handshake(&mut ws_stream, timeout).await {
        Ok(handshake) => handshake,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Handshake failed");
            reject(&mut ws_sink, e.to_string()).await;
            return;
        }
    };

    let (outbound_tx, outbound_rx) = mpsc::channel(state.config.outbound_queue_capacity);
    let joined = match state.match_registry.join(&handshake, outbound_tx).await {
        Ok(joined) => joined,
        Err(e) => {
            warn!(
                session_id = %session_id,
                game_id = %handshake.game_id,
                error = %e,
                "Join rejected"
            );
            reject(&mut ws_sink, e.to_string()).await;
            return;
        }
    };

    info!(
        session_id = %session_id,
        match_id = %joined.handle.id,
        game_id = %handshake.game_id,
        player = joined.player,
        "Player seated"
    );

    run_session(session_id, joined, ws_sink, ws_stream, outbound_rx).await;

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Wait for the first data frame and parse it as a handshake
async fn read_handshake(
    ws_stream: &mut WsStream,
    timeout: Duration,
) -> Result<Handshake, HandshakeError> {
    let read = async {
        while let Some(frame) = ws_stream.next().await {
            match frame? {
                Message::Text(text) => return Ok(Handshake::parse(&text)?),
                Message::Binary(bytes) => {
                    let text = std::str::from_utf8(&bytes).map_err(|_| HandshakeError::NotUtf8)?;
                    return Ok(Handshake::parse(text)?);
                }
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => break,
            }
        }
        Err::<Handshake, HandshakeError>(HandshakeError::Closed)
    };

    tokio::time::timeout(timeout, read)
        .await
        .map_err(|_| HandshakeError::Timeout(timeout))?
}

/// Tell the client why it was turned away, then close
async fn reject(ws_sink: &mut WsSink, reason: String) {
    let _ = send_msg(ws_sink, &ServerMsg::text(reason)).await;
    let _ = ws_sink.close().await;
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session_id: Uuid,
    joined: JoinedMatch,
    mut ws_sink: WsSink,
    mut ws_stream: WsStream,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
) {
    let JoinedMatch { handle, player } = joined;

    // Spawn writer task: outbound queue -> WebSocket
    let mut writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                return;
            }
        }
        // Match dropped our queue
        debug!(session_id = %session_id, "Outbound queue closed");
        let _ = ws_sink.close().await;
    });

    // Reader loop: WebSocket -> match task
    loop {
        tokio::select! {
            _ = &mut writer_handle => break,
            frame = ws_stream.next() => {
                let command = match frame {
                    Some(Ok(Message::Text(text))) => ClientCommand::parse(text.as_bytes()),
                    Some(Ok(Message::Binary(bytes))) => ClientCommand::parse(&bytes),
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => {
                        info!(session_id = %session_id, "Client initiated close");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                };

                match command {
                    Ok(command) => {
                        if !handle.send_input(player, command).await {
                            debug!(session_id = %session_id, "Match closed");
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(session_id = %session_id, error = %e, "Ignoring malformed command");
                    }
                }
            }
        }
    }

    // Signal disconnect to match loop
    handle.leave(player).await;

    // Abort writer task
    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> anyhow::Result<()> {
    let json = msg.to_json()?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}
