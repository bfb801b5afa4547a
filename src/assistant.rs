use std::collections::HashMap;
use std::io;
use std::net::TcpStream;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::game::{GameState, Play};

pub const DEFAULT_ASSISTANT_URL: &str = "ws://localhost:8765";
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskEnvelope<'a> {
    pub content: &'a str,
    pub game_context: &'a GameState,
}

#[derive(Debug, Serialize)]
pub struct ExplainPlayEnvelope<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: &'a str,
    pub play_type: &'a str,
}

impl<'a> ExplainPlayEnvelope<'a> {
    pub fn new(play: &'a Play) -> Self {
        Self {
            kind: "explain_play",
            content: &play.description,
            play_type: play.kind.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Inbound {
    Text {
        #[serde(default)]
        content: String,
    },
    Explanation {
        #[serde(default)]
        content: String,
    },
    Error {
        #[serde(default)]
        content: String,
    },
    #[serde(other)]
    Unknown,
}

pub fn parse_inbound(raw: &str) -> Result<Inbound> {
    serde_json::from_str(raw).context("invalid assistant message")
}

/// Message pipe under the assistant client. `recv_text` returns `None` once the
/// peer has closed.
pub trait AssistantTransport {
    fn send_text(&mut self, text: String) -> Result<()>;
    fn recv_text(&mut self) -> Result<Option<String>>;
    fn close(&mut self) -> Result<()>;
}

pub struct WsTransport {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// A read that waits longer than `reply_timeout` fails instead of blocking
    /// the caller forever on a silent peer.
    pub fn connect(url: &str, reply_timeout: Duration) -> Result<Self> {
        let (socket, _response) =
            tungstenite::connect(url).with_context(|| format!("connect {url}"))?;
        let stream = match socket.get_ref() {
            MaybeTlsStream::Plain(stream) => stream,
            _ => bail!("unsupported assistant stream for {url}"),
        };
        stream
            .set_read_timeout(Some(reply_timeout))
            .context("set assistant read timeout")?;
        Ok(Self { socket })
    }
}

impl AssistantTransport for WsTransport {
    fn send_text(&mut self, text: String) -> Result<()> {
        self.socket
            .send(Message::Text(text))
            .context("websocket send failed")
    }

    fn recv_text(&mut self) -> Result<Option<String>> {
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Close(_)) => return Ok(None),
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(None);
                }
                Err(tungstenite::Error::Io(err))
                    if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    bail!("assistant reply timed out");
                }
                Err(err) => return Err(err).context("websocket read failed"),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        match self.socket.close(None) {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(err) => Err(err).context("websocket close failed"),
        }
    }
}

/// Client side of the realtime assistant channel. Every question carries the
/// current game snapshot as `gameContext`.
pub struct AssistantClient<T: AssistantTransport> {
    transport: T,
    state: ConnectionState,
    explanations: HashMap<String, String>,
}

impl AssistantClient<WsTransport> {
    pub fn connect(url: &str, reply_timeout: Duration) -> Result<Self> {
        tracing::info!(url, "connecting to assistant channel");
        let transport = WsTransport::connect(url, reply_timeout)?;
        Ok(Self::from_transport(transport))
    }
}

impl<T: AssistantTransport> AssistantClient<T> {
    pub fn from_transport(transport: T) -> Self {
        Self {
            transport,
            state: ConnectionState::Open,
            explanations: HashMap::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn ask(&mut self, question: &str, game: &GameState) -> Result<String> {
        let envelope = AskEnvelope {
            content: question,
            game_context: game,
        };
        self.send(&envelope)?;
        loop {
            match self.next_inbound()? {
                Inbound::Text { content } => return Ok(content),
                Inbound::Error { content } => bail!("assistant error: {content}"),
                other => tracing::debug!(?other, "skipping message while awaiting reply"),
            }
        }
    }

    /// Explanations are cached by play description for the life of the client.
    pub fn explain_play(&mut self, play: &Play) -> Result<String> {
        if let Some(cached) = self.explanations.get(&play.description) {
            return Ok(cached.clone());
        }
        self.send(&ExplainPlayEnvelope::new(play))?;
        loop {
            match self.next_inbound()? {
                Inbound::Explanation { content } => {
                    self.explanations
                        .insert(play.description.clone(), content.clone());
                    return Ok(content);
                }
                Inbound::Error { content } => bail!("assistant error: {content}"),
                other => tracing::debug!(?other, "skipping message while awaiting explanation"),
            }
        }
    }

    pub fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        self.transport.close()
    }

    fn send(&mut self, envelope: &impl Serialize) -> Result<()> {
        if self.state != ConnectionState::Open {
            bail!("assistant channel is {}", self.state.label());
        }
        let text = serde_json::to_string(envelope).context("serialize assistant message")?;
        if let Err(err) = self.transport.send_text(text) {
            self.state = ConnectionState::Closed;
            return Err(err);
        }
        Ok(())
    }

    fn next_inbound(&mut self) -> Result<Inbound> {
        let raw = match self.transport.recv_text() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.state = ConnectionState::Closed;
                return Err(anyhow!("assistant channel closed"));
            }
            Err(err) => {
                self.state = ConnectionState::Closed;
                return Err(err);
            }
        };
        match parse_inbound(&raw) {
            Ok(inbound) => Ok(inbound),
            Err(err) => {
                tracing::warn!(%raw, "unparseable assistant message: {err:#}");
                Ok(Inbound::Unknown)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::fixtures;

    #[derive(Default)]
    struct ScriptedTransport {
        sent: Vec<String>,
        replies: VecDeque<String>,
        closed: bool,
    }

    impl AssistantTransport for ScriptedTransport {
        fn send_text(&mut self, text: String) -> Result<()> {
            self.sent.push(text);
            Ok(())
        }

        fn recv_text(&mut self) -> Result<Option<String>> {
            Ok(self.replies.pop_front())
        }

        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    fn scripted(replies: &[&str]) -> AssistantClient<ScriptedTransport> {
        AssistantClient::from_transport(ScriptedTransport {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            ..ScriptedTransport::default()
        })
    }

    #[test]
    fn ask_sends_question_with_game_context() {
        let mut client = scripted(&[r#"{"type":"text","content":"Two down in the first."}"#]);
        let game = fixtures::opening_game();
        let reply = client.ask("what's happening?", &game).unwrap();
        assert_eq!(reply, "Two down in the first.");

        let sent: serde_json::Value = serde_json::from_str(&client.transport.sent[0]).unwrap();
        assert_eq!(sent["content"], "what's happening?");
        assert_eq!(sent["gameContext"]["venue"]["name"], "Yankee Stadium");
        assert!(sent.get("type").is_none());
    }

    #[test]
    fn ask_surfaces_server_errors() {
        let mut client = scripted(&[r#"{"type":"error","content":"Invalid message format"}"#]);
        let err = client.ask("hi", &fixtures::opening_game()).unwrap_err();
        assert!(err.to_string().contains("Invalid message format"));
        assert_eq!(client.state(), ConnectionState::Open);
    }

    #[test]
    fn closed_peer_moves_client_to_closed() {
        let mut client = scripted(&[]);
        assert!(client.ask("hi", &fixtures::opening_game()).is_err());
        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(client.ask("again", &fixtures::opening_game()).is_err());
        assert_eq!(client.transport.sent.len(), 1);
    }

    #[test]
    fn unknown_and_garbled_messages_are_skipped() {
        let mut client = scripted(&[
            "not json",
            r#"{"type":"heartbeat"}"#,
            r#"{"type":"text","content":"ok"}"#,
        ]);
        let reply = client.ask("hi", &fixtures::opening_game()).unwrap();
        assert_eq!(reply, "ok");
    }

    #[test]
    fn explanations_are_cached_by_description() {
        let mut client = scripted(&[r#"{"type":"explanation","content":"*Strategic Move* ..."}"#]);
        let mut game = fixtures::opening_game();
        game.plays.push(Play {
            kind: crate::game::PlayKind::DoublePlay,
            description: "Torres turns two".to_string(),
            player: "Gleyber Torres".to_string(),
            inning: 1,
            inning_half: crate::game::InningHalf::Top,
            timestamp: chrono::Utc::now(),
        });
        let play = &game.plays[0];
        let first = client.explain_play(play).unwrap();
        let second = client.explain_play(play).unwrap();
        assert_eq!(first, second);
        assert_eq!(client.transport.sent.len(), 1);

        let sent: serde_json::Value = serde_json::from_str(&client.transport.sent[0]).unwrap();
        assert_eq!(sent["type"], "explain_play");
        assert_eq!(sent["play_type"], "double_play");
    }

    #[test]
    fn close_is_idempotent() {
        let mut client = scripted(&[]);
        client.close().unwrap();
        client.close().unwrap();
        assert!(client.transport.closed);
        assert_eq!(client.state(), ConnectionState::Closed);
    }
}
