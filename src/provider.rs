use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;

use crate::assistant::{AssistantClient, ConnectionState, WsTransport};
use crate::commentary;
use crate::config::Config;
use crate::game::{GameState, Play};
use crate::genai::{GeminiClient, Generated, GenerativeClient, ProxyClient};
use crate::speech::{self, SpeechClient};
use crate::state::Delta;

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    Ask {
        question: String,
        context: Arc<GameState>,
        speak: bool,
    },
    ExplainPlay(Play),
    Reconnect,
}

/// Everything the worker talks to. Each backend is optional; a missing one
/// turns the matching command into a `[WARN]` log line.
pub struct Backends {
    pub assistant_url: Option<String>,
    /// How long a question may wait on the channel before the text API takes over.
    pub assistant_timeout: Duration,
    pub text: Option<Box<dyn GenerativeClient>>,
    pub speech: Option<SpeechClient>,
    pub audio_dir: PathBuf,
}

impl Backends {
    pub fn from_config(config: &Config) -> Self {
        let text: Option<Box<dyn GenerativeClient>> = match (&config.proxy_url, &config.gemini_api_key) {
            (Some(url), _) => Some(Box::new(ProxyClient::new(url.clone(), config.proxy_key.clone()))),
            (None, Some(key)) => Some(Box::new(GeminiClient::new(
                config.gemini_api_base.clone(),
                config.gemini_model.clone(),
                key.clone(),
            ))),
            (None, None) => None,
        };
        let speech = config.gemini_api_key.as_ref().map(|key| {
            SpeechClient::new(config.tts_url.clone(), key.clone(), config.voice.clone())
        });
        Self {
            assistant_url: Some(config.assistant_url.clone()),
            assistant_timeout: config.assistant_timeout,
            text,
            speech,
            audio_dir: config.audio_dir.clone(),
        }
    }
}

pub fn spawn_assistant_provider(
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
    backends: Backends,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut worker = Worker {
            tx,
            backends,
            channel: None,
        };
        worker.connect();
        while let Ok(cmd) = cmd_rx.recv() {
            worker.handle(cmd);
        }
        if let Some(mut channel) = worker.channel.take() {
            let _ = channel.close();
        }
        tracing::info!("assistant provider stopped");
    })
}

struct Worker {
    tx: Sender<Delta>,
    backends: Backends,
    channel: Option<AssistantClient<WsTransport>>,
}

impl Worker {
    fn connect(&mut self) {
        let Some(url) = self.backends.assistant_url.clone() else {
            return;
        };
        self.send(Delta::AssistantConnection(ConnectionState::Connecting));
        match AssistantClient::connect(&url, self.backends.assistant_timeout) {
            Ok(client) => {
                self.channel = Some(client);
                self.send(Delta::AssistantConnection(ConnectionState::Open));
            }
            Err(err) => {
                self.channel = None;
                self.send(Delta::AssistantConnection(ConnectionState::Closed));
                self.send(Delta::Log(format!("[WARN] Assistant connect error: {err:#}")));
            }
        }
    }

    fn handle(&mut self, cmd: ProviderCommand) {
        match cmd {
            ProviderCommand::Ask {
                question,
                context,
                speak,
            } => match self.ask(&question, &context) {
                Ok(reply) => {
                    self.send(Delta::AssistantReply(reply.text.clone()));
                    if speak {
                        self.speak(reply);
                    }
                }
                Err(err) => {
                    tracing::warn!("ask failed: {err:#}");
                    self.send(Delta::Log(format!("[WARN] Failed to generate response: {err:#}")));
                }
            },
            ProviderCommand::ExplainPlay(play) => match self.explain(&play) {
                Ok(text) => self.send(Delta::AssistantReply(text)),
                Err(err) => {
                    self.send(Delta::Log(format!("[WARN] Failed to get explanation: {err:#}")));
                }
            },
            ProviderCommand::Reconnect => {
                if let Some(mut channel) = self.channel.take() {
                    let _ = channel.close();
                }
                self.connect();
            }
        }
    }

    /// Realtime channel first; the text API with a locally built prompt when
    /// the channel is down or not configured.
    fn ask(&mut self, question: &str, context: &GameState) -> Result<Generated> {
        if let Some(channel) = self.channel.as_mut() {
            match channel.ask(question, context) {
                Ok(text) => return Ok(Generated { text, audio: None }),
                Err(err) => {
                    let state = channel.state();
                    self.send(Delta::Log(format!("[WARN] Assistant channel error: {err:#}")));
                    if state == ConnectionState::Closed {
                        self.channel = None;
                        self.send(Delta::AssistantConnection(ConnectionState::Closed));
                    }
                }
            }
        }
        let Some(text_api) = self.backends.text.as_ref() else {
            anyhow::bail!("no assistant channel or text API available");
        };
        text_api.generate(&commentary::game_prompt(context, question))
    }

    fn explain(&mut self, play: &Play) -> Result<String> {
        if let Some(channel) = self.channel.as_mut() {
            match channel.explain_play(play) {
                Ok(text) => return Ok(text),
                Err(err) => {
                    if channel.state() == ConnectionState::Closed {
                        self.channel = None;
                        self.send(Delta::AssistantConnection(ConnectionState::Closed));
                    }
                    tracing::warn!("explain via channel failed: {err:#}");
                }
            }
        }
        let Some(text_api) = self.backends.text.as_ref() else {
            anyhow::bail!("no assistant channel or text API available");
        };
        Ok(text_api
            .generate(&commentary::explain_play_prompt(&play.description))?
            .text)
    }

    fn speak(&mut self, reply: Generated) {
        let audio = match reply.audio {
            Some(audio) => Ok(audio),
            None => match self.backends.speech.as_ref() {
                Some(client) => client.synthesize(&reply.text),
                None => {
                    self.send(Delta::Log("[INFO] Speech output unavailable".to_string()));
                    return;
                }
            },
        };
        let saved = audio.and_then(|bytes| speech::save_audio(&self.backends.audio_dir, &bytes));
        match saved {
            Ok(path) => self.send(Delta::SpeechSaved(path.display().to_string())),
            Err(err) => self.send(Delta::Log(format!("[WARN] Speech error: {err:#}"))),
        }
    }

    fn send(&self, delta: Delta) {
        let _ = self.tx.send(delta);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::mpsc;

    use super::*;
    use crate::assistant::DEFAULT_REPLY_TIMEOUT;
    use crate::fixtures;

    struct EchoText {
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl GenerativeClient for EchoText {
        fn generate(&self, prompt: &str) -> Result<Generated> {
            self.prompts
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(prompt.to_string());
            Ok(Generated {
                text: "Judge is locked in tonight.".to_string(),
                audio: Some(b"ID3".to_vec()),
            })
        }
    }

    fn offline_backends(prompts: Arc<Mutex<Vec<String>>>, audio_dir: PathBuf) -> Backends {
        Backends {
            assistant_url: None,
            assistant_timeout: DEFAULT_REPLY_TIMEOUT,
            text: Some(Box::new(EchoText { prompts })),
            speech: None,
            audio_dir,
        }
    }

    #[test]
    fn ask_falls_back_to_text_api_with_game_prompt() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let handle = spawn_assistant_provider(
            tx,
            cmd_rx,
            offline_backends(Arc::clone(&prompts), std::env::temp_dir()),
        );
        cmd_tx
            .send(ProviderCommand::Ask {
                question: "how's Judge doing?".to_string(),
                context: Arc::new(fixtures::opening_game()),
                speak: false,
            })
            .unwrap();
        drop(cmd_tx);
        handle.join().unwrap();

        let deltas: Vec<Delta> = rx.try_iter().collect();
        assert!(deltas.iter().any(
            |d| matches!(d, Delta::AssistantReply(text) if text == "Judge is locked in tonight.")
        ));
        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("The fan asks: how's Judge doing?"));
    }

    #[test]
    fn speak_uses_audio_returned_with_the_text() {
        let dir = std::env::temp_dir().join(format!("mlb_voice_provider_{}", std::process::id()));
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let handle = spawn_assistant_provider(tx, cmd_rx, offline_backends(prompts, dir.clone()));
        cmd_tx
            .send(ProviderCommand::Ask {
                question: "say something".to_string(),
                context: Arc::new(fixtures::opening_game()),
                speak: true,
            })
            .unwrap();
        drop(cmd_tx);
        handle.join().unwrap();

        let saved = rx.try_iter().find_map(|d| match d {
            Delta::SpeechSaved(path) => Some(path),
            _ => None,
        });
        assert!(saved.is_some_and(|p| p.ends_with(".mp3")));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn ask_without_any_backend_logs_a_warning() {
        let (tx, rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let backends = Backends {
            assistant_url: None,
            assistant_timeout: DEFAULT_REPLY_TIMEOUT,
            text: None,
            speech: None,
            audio_dir: std::env::temp_dir(),
        };
        let handle = spawn_assistant_provider(tx, cmd_rx, backends);
        cmd_tx
            .send(ProviderCommand::ExplainPlay(Play {
                kind: crate::game::PlayKind::Groundout,
                description: "Story grounds out to short.".to_string(),
                player: "Trevor Story".to_string(),
                inning: 2,
                inning_half: crate::game::InningHalf::Top,
                timestamp: chrono::Utc::now(),
            }))
            .unwrap();
        drop(cmd_tx);
        handle.join().unwrap();

        let logs: Vec<String> = rx
            .try_iter()
            .filter_map(|d| match d {
                Delta::Log(line) => Some(line),
                _ => None,
            })
            .collect();
        assert!(logs.iter().any(|l| l.starts_with("[WARN] Failed to get explanation")));
    }

    #[test]
    fn silent_channel_times_out_and_falls_back_to_text_api() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut socket = tungstenite::accept(stream).unwrap();
            let _ = socket.read();
            let _ = done_rx.recv();
        });

        let prompts = Arc::new(Mutex::new(Vec::new()));
        let mut backends = offline_backends(Arc::clone(&prompts), std::env::temp_dir());
        backends.assistant_url = Some(url);
        backends.assistant_timeout = Duration::from_millis(200);

        let (tx, rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let handle = spawn_assistant_provider(tx, cmd_rx, backends);
        cmd_tx
            .send(ProviderCommand::Ask {
                question: "anyone there?".to_string(),
                context: Arc::new(fixtures::opening_game()),
                speak: false,
            })
            .unwrap();
        drop(cmd_tx);
        handle.join().unwrap();
        drop(done_tx);
        server.join().unwrap();

        let deltas: Vec<Delta> = rx.try_iter().collect();
        assert!(deltas.iter().any(
            |d| matches!(d, Delta::AssistantConnection(ConnectionState::Closed))
        ));
        assert!(deltas.iter().any(
            |d| matches!(d, Delta::AssistantReply(text) if text == "Judge is locked in tonight.")
        ));
        assert_eq!(prompts.lock().unwrap().len(), 1);
    }
}
