
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Blocking JSON-over-HTTP client shared by the OpenAI and Pinecone clients
#[derive(Debug, Clone)]
pub struct JsonClient {
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff_unit: Duration,
}

impl JsonClient {
    #[inline]
    pub fn new(timeout: Duration, retry_attempts: u32) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            retry_attempts: retry_attempts.max(1),
            backoff_unit: Duration::from_secs(1),
        }
    }

    /// Shorten the delay between retries; only useful for tests
    #[inline]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    #[inline]
    pub fn get_json<R>(&self, url: &Url, headers: &[(&str, &str)]) -> Result<R>
    where
        R: DeserializeOwned,
    {
        debug!("GET {}", url);

        let response_text = self
            .request_with_retry(url, || {
                let mut request = self.agent.get(url.as_str());
                for (name, value) in headers {
                    request = request.header(*name, *value);
                }
                request
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .with_context(|| format!("GET {} failed", url))?;

        parse_body(&response_text).with_context(|| format!("Failed to parse response from {}", url))
    }

    #[inline]
    pub fn post_json<B, R>(&self, url: &Url, headers: &[(&str, &str)], body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let request_json =
            serde_json::to_string(body).context("Failed to serialize request body")?;

        debug!("POST {} ({} bytes)", url, request_json.len());

        let response_text = self
            .request_with_retry(url, || {
                let mut request = self
                    .agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json");
                for (name, value) in headers {
                    request = request.header(*name, *value);
                }
                request
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .with_context(|| format!("POST {} failed", url))?;

        parse_body(&response_text).with_context(|| format!("Failed to parse response from {}", url))
    }

    fn request_with_retry<F>(&self, url: &Url, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 || *status == 429 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay = self.backoff_unit * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) as u32;
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All request attempts failed for {}", url);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

/// Empty bodies are treated as `{}` so endpoints that answer with no content still deserialize
fn parse_body<R: DeserializeOwned>(text: &str) -> Result<R> {
    let text = if text.trim().is_empty() { "{}" } else { text };
    Ok(serde_json::from_str(text)?)
}

/// Join `path` onto `base`, treating `base` as a directory even without a trailing slash
#[inline]
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .with_context(|| format!("Failed to build URL for {} from {}", path, base))
}
