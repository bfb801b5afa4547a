use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::http_client::post_json;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const NO_RESPONSE: &str = "No response generated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    /// Already-decoded speech, when the backend returned it alongside the text.
    pub audio: Option<Vec<u8>>,
}

pub trait GenerativeClient: Send {
    fn generate(&self, prompt: &str) -> Result<Generated>;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base.trim_end_matches('/'),
            self.model,
            self.api_key
        )
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerativeClient for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<Generated> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };
        tracing::debug!(model = %self.model, chars = prompt.len(), "gemini generateContent");
        let raw = post_json(&self.endpoint(), &body, &[]).context("gemini request failed")?;
        Ok(Generated {
            text: parse_generate_response(&raw)?,
            audio: None,
        })
    }
}

/// First candidate's first text part, or a fixed placeholder when the model
/// returned nothing usable.
pub fn parse_generate_response(raw: &str) -> Result<String> {
    let resp: GenerateResponse =
        serde_json::from_str(raw).context("invalid generateContent response")?;
    let text = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| NO_RESPONSE.to_string());
    Ok(text)
}

/// Edge function that wraps text generation and speech in one call.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    url: String,
    key: Option<String>,
}

impl ProxyClient {
    pub fn new(url: impl Into<String>, key: Option<String>) -> Self {
        Self {
            url: url.into(),
            key,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProxyRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyResponse {
    generated_text: Option<String>,
    audio_content: Option<String>,
    error: Option<String>,
}

impl GenerativeClient for ProxyClient {
    fn generate(&self, prompt: &str) -> Result<Generated> {
        let bearer = self.key.as_ref().map(|k| format!("Bearer {k}"));
        let mut headers: Vec<(&str, &str)> = Vec::new();
        if let Some(bearer) = bearer.as_deref() {
            headers.push(("authorization", bearer));
        }
        let raw = post_json(&self.url, &ProxyRequest { prompt }, &headers)
            .context("proxy request failed")?;
        parse_proxy_response(&raw)
    }
}

pub fn parse_proxy_response(raw: &str) -> Result<Generated> {
    let resp: ProxyResponse = serde_json::from_str(raw).context("invalid proxy response")?;
    if let Some(error) = resp.error {
        return Err(anyhow!("proxy error: {error}"));
    }
    let text = resp
        .generated_text
        .ok_or_else(|| anyhow!("proxy response missing generatedText"))?;
    let audio = match resp.audio_content.as_deref().filter(|a| !a.is_empty()) {
        Some(encoded) => Some(STANDARD.decode(encoded).context("invalid audioContent")?),
        None => None,
    };
    Ok(Generated { text, audio })
}
