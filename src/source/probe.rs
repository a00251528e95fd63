//! Endpoint prober
//!
//! Walks an ordered list of candidate URLs and returns the first usable
//! response. Each candidate gets exactly one attempt.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::config::HttpConfig;

/// Per-request settings applied to every candidate
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOptions {
    pub timeout: Duration,
    pub accept: String,
    pub user_agent: String,
}

impl From<&HttpConfig> for ProbeOptions {
    fn from(http: &HttpConfig) -> Self {
        Self {
            timeout: http.timeout(),
            accept: http.accept.clone(),
            user_agent: http.user_agent.clone(),
        }
    }
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

/// A successful response body and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub url: String,
    pub body: String,
    pub content_type: Option<String>,
}

/// Errors returned by the prober
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// No candidate produced a usable response
    #[error("All {attempted} candidate endpoints failed")]
    AllCandidatesExhausted { attempted: usize },
}

/// Why a single candidate was skipped
#[derive(Debug, Error)]
enum CandidateFailure {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("empty body")]
    EmptyBody,
}

/// Sequential fallback over candidate endpoints
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
    options: ProbeOptions,
}

impl Prober {
    /// Create a prober with its own HTTP client
    pub fn new(options: ProbeOptions) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .build()?;

        Ok(Self { client, options })
    }

    /// Return the first non-empty 200 response among `candidates`
    ///
    /// # Arguments
    /// * `candidates` - URLs in priority order
    ///
    /// # Returns
    /// * `Ok(Payload)` - Body of the first candidate that answered
    /// * `Err(ProbeError)` - If every candidate failed
    pub async fn probe(&self, candidates: &[String]) -> Result<Payload, ProbeError> {
        self.probe_map(candidates, Some).await
    }

    /// Like [`Prober::probe`], but a payload rejected by `accept` also counts
    /// as a failed candidate
    pub async fn probe_map<T, F>(&self, candidates: &[String], mut accept: F) -> Result<T, ProbeError>
    where
        F: FnMut(Payload) -> Option<T>,
    {
        for url in candidates {
            match self.fetch(url).await {
                Ok(payload) => {
                    if let Some(value) = accept(payload) {
                        tracing::info!("Using data from {}", url);
                        return Ok(value);
                    }
                    tracing::debug!("Candidate {} returned no usable data", url);
                }
                Err(e) => {
                    tracing::debug!("Candidate {} failed: {}", url, e);
                }
            }
        }

        Err(ProbeError::AllCandidatesExhausted {
            attempted: candidates.len(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<Payload, CandidateFailure> {
        tracing::debug!("Probing {}", url);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, &self.options.accept)
            .timeout(self.options.timeout)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(CandidateFailure::Status(status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(CandidateFailure::EmptyBody);
        }

        Ok(Payload {
            url: url.to_string(),
            body,
            content_type,
        })
    }
}
