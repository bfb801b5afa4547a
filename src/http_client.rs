use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde::Serialize;

const REQUEST_TIMEOUT_SECS: u64 = 10;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// POSTs `body` as JSON and returns the response text, treating any non-2xx
/// status as an error that carries the body.
pub fn post_json(url: &str, body: &impl Serialize, extra_headers: &[(&str, &str)]) -> Result<String> {
    let client = http_client()?;
    let mut req = client.post(url).json(body);
    for (name, value) in extra_headers {
        req = req.header(*name, *value);
    }
    let resp = req.send().context("request failed")?;
    let status = resp.status();
    let text = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow!("http {}: {}", status, text));
    }
    Ok(text)
}
