use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::assistant::{DEFAULT_ASSISTANT_URL, DEFAULT_REPLY_TIMEOUT};
use crate::genai::{DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_MODEL};
use crate::scheduler::DEFAULT_INTERVAL;
use crate::speech::{DEFAULT_TTS_URL, VoiceConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub tts_url: String,
    pub voice: VoiceConfig,
    pub proxy_url: Option<String>,
    pub proxy_key: Option<String>,
    pub assistant_url: String,
    pub assistant_timeout: Duration,
    pub scenario_interval: Duration,
    pub audio_dir: PathBuf,
    pub log_file: PathBuf,
}

impl Config {
    /// Reads `.env.local` then `.env` (first value wins) before the process environment.
    pub fn load() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_env()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let opt = |key: &str| non_blank(lookup(key));
        let voice = VoiceConfig {
            name: opt("TTS_VOICE").unwrap_or_else(|| VoiceConfig::default().name),
            ..VoiceConfig::default()
        };

        Self {
            gemini_api_key: opt("GEMINI_API_KEY"),
            gemini_model: opt("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_api_base: opt("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            tts_url: opt("TTS_API_URL").unwrap_or_else(|| DEFAULT_TTS_URL.to_string()),
            voice,
            proxy_url: opt("PROXY_URL"),
            proxy_key: opt("PROXY_KEY"),
            assistant_url: opt("ASSISTANT_WS_URL")
                .unwrap_or_else(|| DEFAULT_ASSISTANT_URL.to_string()),
            assistant_timeout: secs_at_least_one(opt("ASSISTANT_TIMEOUT_SECS"))
                .unwrap_or(DEFAULT_REPLY_TIMEOUT),
            scenario_interval: secs_at_least_one(opt("SCENARIO_INTERVAL_SECS"))
                .unwrap_or(DEFAULT_INTERVAL),
            audio_dir: opt("AUDIO_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            log_file: opt("MLB_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("mlb_voice.log")),
        }
    }

    pub fn has_text_api(&self) -> bool {
        self.proxy_url.is_some() || self.gemini_api_key.is_some()
    }
}

fn non_blank(val: Option<String>) -> Option<String> {
    val.and_then(|val| if val.trim().is_empty() { None } else { Some(val) })
}

fn secs_at_least_one(val: Option<String>) -> Option<Duration> {
    val.and_then(|val| val.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs.max(1)))
}
