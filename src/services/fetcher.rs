// src/services/fetcher.rs

//! Rate-limited fetcher with retry and candidate URL fallback.

use std::error::Error as StdError;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;

use crate::error::{FetchFailure, Result};
use crate::models::FetcherConfig;
use crate::services::RequestGate;
use crate::utils::http::create_async_client;

/// Status and body of one HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Transport-level failure of a single attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    /// Not worth retrying (TLS, redirect loops, undecodable body)
    #[error("{0}")]
    Fatal(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::Fatal(_))
    }
}

/// Performs a single GET. Implementations must not retry on their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// `reqwest` backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_reqwest)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest)?;
        Ok(RawResponse { status, body })
    }
}

/// Lowercase fragments that identify a TLS failure somewhere in a source chain.
const TLS_MARKERS: &[&str] = &["tls", "certificate", "handshake", "ssl"];

fn classify_reqwest(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if is_tls_failure(&error) {
        TransportError::Fatal(format!("TLS failure: {error}"))
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else if error.is_request() || error.is_body() {
        TransportError::Request(error.to_string())
    } else {
        TransportError::Fatal(error.to_string())
    }
}

/// reqwest reports TLS failures as connect errors; the cause is only visible
/// further down the source chain.
fn is_tls_failure(error: &(dyn StdError + 'static)) -> bool {
    let mut source = error.source();
    while let Some(cause) = source {
        let message = cause.to_string().to_ascii_lowercase();
        if TLS_MARKERS.iter().any(|m| message.contains(m)) {
            return true;
        }
        source = cause.source();
    }
    false
}

/// A value read from the candidate URL that produced it.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    pub url: String,
    pub retries: u32,
}

/// Result of one attempt against one URL.
#[derive(Debug)]
enum Attempt {
    Document(String),
    /// The publisher says there is nothing here (404/410 or empty page)
    Missing,
    Transient(String),
    Rejected(String),
}

/// Final outcome for one candidate URL after its retries.
enum CandidateOutcome {
    Document(String),
    Missing,
    Failed(String),
}

fn classify_response(response: RawResponse) -> Attempt {
    match response.status {
        200..=299 if response.body.trim().is_empty() => Attempt::Missing,
        200..=299 => Attempt::Document(response.body),
        404 | 410 => Attempt::Missing,
        408 | 429 | 500..=599 => Attempt::Transient(format!("HTTP {}", response.status)),
        status => Attempt::Rejected(format!("HTTP {status}")),
    }
}

/// Fetches result pages through the shared [`RequestGate`].
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    gate: RequestGate,
    timeout: Duration,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    /// Candidate index that produced the last accepted document
    preferred: AtomicUsize,
}

impl Fetcher {
    /// Create a fetcher that talks HTTP.
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        Ok(Self::with_transport(
            config,
            Arc::new(HttpTransport::new(config)?),
        ))
    }

    /// Create a fetcher over any transport.
    pub fn with_transport(config: &FetcherConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            gate: RequestGate::new(
                config.max_concurrent,
                Duration::from_millis(config.rate_limit_ms),
            ),
            timeout: Duration::from_millis(config.timeout_ms),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
            preferred: AtomicUsize::new(0),
        }
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    /// Stop admitting requests; pending and future fetches fail fast.
    pub fn shutdown(&self) {
        self.gate.close();
    }

    /// Fetch the first non-empty document among the candidates.
    pub async fn fetch_document(
        &self,
        urls: &[String],
    ) -> std::result::Result<Fetched<String>, FetchFailure> {
        self.fetch_with(urls, |body| Some(body.to_string())).await
    }

    /// Fetch through the candidates until `interpret` accepts a document.
    ///
    /// `interpret` returning `None` means "this page has no record", and the
    /// next candidate is tried. When every candidate is exhausted the failure
    /// is `NotFound` if all of them reported a missing record, otherwise
    /// `Network`.
    pub async fn fetch_with<T, F>(
        &self,
        urls: &[String],
        mut interpret: F,
    ) -> std::result::Result<Fetched<T>, FetchFailure>
    where
        F: FnMut(&str) -> Option<T> + Send,
        T: Send,
    {
        let mut retries = 0;
        let mut last_failure: Option<String> = None;

        for index in self.candidate_order(urls.len()) {
            let url = &urls[index];
            match self.try_candidate(url, &mut retries).await {
                CandidateOutcome::Document(body) => {
                    if let Some(value) = interpret(&body) {
                        self.preferred.store(index, Ordering::Relaxed);
                        return Ok(Fetched {
                            value,
                            url: url.clone(),
                            retries,
                        });
                    }
                    log::debug!("No record on {}, trying next candidate", url);
                }
                CandidateOutcome::Missing => {
                    log::debug!("Nothing published at {}", url);
                }
                CandidateOutcome::Failed(message) => {
                    log::debug!("Candidate {} failed: {}", url, message);
                    last_failure = Some(format!("{url}: {message}"));
                }
            }
        }

        match last_failure {
            Some(message) => Err(FetchFailure::Network { message, retries }),
            None => Err(FetchFailure::NotFound { retries }),
        }
    }

    /// Preferred candidate first, the rest in configured order.
    fn candidate_order(&self, len: usize) -> Vec<usize> {
        let preferred = self.preferred.load(Ordering::Relaxed);
        let mut order = Vec::with_capacity(len);
        if preferred < len {
            order.push(preferred);
        }
        order.extend((0..len).filter(|&i| i != preferred));
        order
    }

    async fn try_candidate(&self, url: &str, retries: &mut u32) -> CandidateOutcome {
        let mut attempt = 1;
        loop {
            match self.attempt(url).await {
                Attempt::Document(body) => return CandidateOutcome::Document(body),
                Attempt::Missing => return CandidateOutcome::Missing,
                Attempt::Transient(message) if attempt < self.max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    log::debug!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        url,
                        message,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    *retries += 1;
                }
                Attempt::Transient(message) | Attempt::Rejected(message) => {
                    return CandidateOutcome::Failed(message);
                }
            }
        }
    }

    async fn attempt(&self, url: &str) -> Attempt {
        let Some(_permit) = self.gate.admit().await else {
            return Attempt::Rejected("request gate closed".into());
        };

        match tokio::time::timeout(self.timeout, self.transport.get(url, self.timeout)).await {
            Err(_) => Attempt::Transient(TransportError::Timeout.to_string()),
            Ok(Err(e)) if e.is_transient() => Attempt::Transient(e.to_string()),
            Ok(Err(e)) => Attempt::Rejected(e.to_string()),
            Ok(Ok(response)) => classify_response(response),
        }
    }

    /// Exponential backoff with up to 25% jitter, capped at `backoff_max`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt.saturating_sub(1)).min(16);
        let base = self.backoff_base.saturating_mul(factor).min(self.backoff_max);
        let spread = (base.as_millis() / 4) as u64;
        let jitter = if spread == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=spread)
        };
        (base + Duration::from_millis(jitter)).min(self.backoff_max)
    }
}
