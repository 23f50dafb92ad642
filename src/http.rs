use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};

const RETRYABLE_CODES: &[u16] = &[429, 500, 502, 503, 504];

/// One authenticated API request. Query pairs are URL-encoded and appended;
/// a body is sent as JSON. Implemented by [`HttpClient`] and by recording
/// stubs in tests.
pub trait Transport {
    fn request(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Value>;
}

pub struct HttpClient {
    base_url: String,
    max_retries: u32,
    client: Client,
}

impl HttpClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", cfg.token))
            .map_err(|_| Error::Config("token contains invalid header characters".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent("singularity-cli")
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.timeout))
            .build()
            .map_err(|err| Error::Network(format!("build http client: {err}")))?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            max_retries: cfg.max_retries,
            client,
        })
    }

    fn attempt(
        &self,
        method: &reqwest::Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> AttemptOutcome {
        let mut req = self.client.request(method.clone(), url);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(value) = body {
            req = req.json(value);
        }

        match req.send() {
            Err(err) => AttemptOutcome::Transport(err.to_string()),
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().unwrap_or_default();
                if status.is_success() {
                    AttemptOutcome::Success(parse_body_value(&text))
                } else {
                    AttemptOutcome::Http {
                        status: status.as_u16(),
                        reason: status.canonical_reason().unwrap_or("").to_string(),
                        body: text,
                    }
                }
            }
        }
    }
}

impl Transport for HttpClient {
    fn request(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let method: reqwest::Method = method
            .parse()
            .map_err(|_| Error::Validation(format!("invalid http method: {method}")))?;
        debug!(%url, %method, "sending request");

        run_attempts(
            self.max_retries,
            method.as_str(),
            &url,
            || self.attempt(&method, &url, query, body.as_ref()),
            thread::sleep,
        )
    }
}

/// Result of a single request attempt, before retry classification.
pub(crate) enum AttemptOutcome {
    Success(Value),
    Http { status: u16, reason: String, body: String },
    Transport(String),
}

/// Retry loop shared by the live client and the tests: runs `attempt` up to
/// `max_retries` times, sleeping `2^(n-1)` seconds after attempt `n` when the
/// outcome is retryable. The last attempt surfaces its error unchanged.
pub(crate) fn run_attempts(
    max_retries: u32,
    method: &str,
    url: &str,
    mut attempt: impl FnMut() -> AttemptOutcome,
    mut sleep: impl FnMut(Duration),
) -> Result<Value> {
    let max = max_retries.max(1);
    let mut attempt_no = 0u32;
    loop {
        attempt_no += 1;
        let last = attempt_no >= max;
        match attempt() {
            AttemptOutcome::Success(value) => return Ok(value),
            AttemptOutcome::Http { status, reason, body } => {
                if !last && is_retryable(status) {
                    let delay = backoff_delay(attempt_no);
                    warn!(
                        status,
                        attempt = attempt_no,
                        max_attempts = max,
                        delay_s = delay.as_secs(),
                        "HTTP error, retrying"
                    );
                    sleep(delay);
                    continue;
                }
                return Err(api_error(method, url, status, &reason, &body));
            }
            AttemptOutcome::Transport(msg) => {
                if !last {
                    let delay = backoff_delay(attempt_no);
                    warn!(
                        error = %msg,
                        attempt = attempt_no,
                        max_attempts = max,
                        delay_s = delay.as_secs(),
                        "network error, retrying"
                    );
                    sleep(delay);
                    continue;
                }
                return Err(Error::Network(msg));
            }
        }
    }
}

fn is_retryable(status: u16) -> bool {
    RETRYABLE_CODES.contains(&status)
}

pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << (attempt.saturating_sub(1)))
}

/// Build the terminal API error. If the body is JSON carrying a non-empty
/// `errors: [{code, message}]` array, the message joins every entry as
/// `[code] message`; otherwise the raw body is appended after the status line.
fn api_error(method: &str, url: &str, status: u16, reason: &str, body: &str) -> Error {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if let Some(errors) = parsed.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let joined: Vec<String> = errors
                    .iter()
                    .map(|entry| {
                        format!("[{}] {}", field_text(entry, "code"), field_text(entry, "message"))
                    })
                    .collect();
                return Error::Api {
                    status,
                    message: format!("HTTP {status} on {method} {url}: {}", joined.join("; ")),
                };
            }
        }
    }
    Error::Api {
        status,
        message: format!("HTTP {status} {reason} on {method} {url}\n{body}"),
    }
}

fn field_text(entry: &Value, key: &str) -> String {
    match entry.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn parse_body_value(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
