use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::source::model::{Post, SearchResponse};

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    /// Transient: refused connection, DNS failure, timeout.
    #[error("connection failure: {0}")]
    Connection(String),

    #[error("unexpected http status {0}")]
    Http(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A data source that returns every post of one subreddit created in `[after, before)`.
///
/// `size_hint` is passed through as the result-size parameter so the source does not silently
/// truncate a bucket.
pub trait PostSource: Sync {
    fn search(
        &self,
        subreddit: &str,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
        size_hint: u32,
    ) -> Result<Vec<Post>, SourceError>;
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub size_hint: u32,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.pushshift.io".to_string(),
            size_hint: 10_000,
            timeout_secs: 60,
        }
    }
}

/// Pushshift-style submission search over a blocking HTTP client.
pub struct PushshiftSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl PushshiftSource {
    pub fn new(cfg: &SourceConfig) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(concat!("karmaboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Connection(format!("build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/reddit/search/submission/", self.base_url)
    }
}

impl PostSource for PushshiftSource {
    fn search(
        &self,
        subreddit: &str,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
        size_hint: u32,
    ) -> Result<Vec<Post>, SourceError> {
        // The API's `after` is exclusive; step back one second so `after` itself is included.
        let resp = self
            .client
            .get(self.endpoint())
            .query(&[
                ("subreddit", subreddit.to_string()),
                ("after", (after.timestamp() - 1).to_string()),
                ("before", before.timestamp().to_string()),
                ("size", size_hint.to_string()),
                ("sort", "asc".to_string()),
            ])
            .send()
            .map_err(transport_failure)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Http(status.as_u16()));
        }

        // A body cut short is a dropped connection, not bad data.
        let body = resp.bytes().map_err(transport_failure)?;
        let parsed: SearchResponse = serde_json::from_slice(&body)
            .map_err(|e| SourceError::Malformed(format!("r/{subreddit}: {e}")))?;
        Ok(parsed.data)
    }
}

fn transport_failure(e: reqwest::Error) -> SourceError {
    SourceError::Connection(e.to_string())
}
