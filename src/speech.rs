use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::http_client::post_json;

pub const DEFAULT_TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub language_code: String,
    pub name: String,
    #[serde(skip)]
    pub audio_encoding: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            name: "en-US-Standard-A".to_string(),
            audio_encoding: "MP3".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechClient {
    url: String,
    api_key: String,
    voice: VoiceConfig,
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: &'a VoiceConfig,
    #[serde(rename = "audioConfig")]
    audio_config: AudioConfig<'a>,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct AudioConfig<'a> {
    #[serde(rename = "audioEncoding")]
    audio_encoding: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

impl SpeechClient {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, voice: VoiceConfig) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            voice,
        }
    }

    /// Returns the encoded audio (MP3 by default) for `text`.
    pub fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let body = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: &self.voice,
            audio_config: AudioConfig {
                audio_encoding: &self.voice.audio_encoding,
            },
        };
        let url = format!("{}?key={}", self.url, self.api_key);
        let raw = post_json(&url, &body, &[]).context("text-to-speech request failed")?;
        parse_synthesize_response(&raw)
    }
}

pub fn parse_synthesize_response(raw: &str) -> Result<Vec<u8>> {
    let resp: SynthesizeResponse =
        serde_json::from_str(raw).context("invalid text-to-speech response")?;
    let encoded = resp
        .audio_content
        .filter(|a| !a.is_empty())
        .ok_or_else(|| anyhow!("text-to-speech response missing audioContent"))?;
    STANDARD.decode(encoded).context("invalid audioContent")
}

/// Writes the clip as `reply-<timestamp>.mp3` under `dir`, via a temp file.
pub fn save_audio(dir: &Path, bytes: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let name = format!("reply-{}.mp3", Utc::now().format("%Y%m%d-%H%M%S%.3f"));
    let path = dir.join(name);
    let tmp = path.with_extension("mp3.tmp");
    fs::write(&tmp, bytes).context("write audio")?;
    fs::rename(&tmp, &path).context("swap audio")?;
    Ok(path)
}
