use std::{io::Read as _, sync::Arc, time::Duration};

use image::RgbaImage;

use crate::{
    assets::{allow_list::AllowList, decode::decode_image},
    foundation::error::{KarmaError, KarmaResult},
    logs::TextLog,
};

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".bmp"];

/// Provider-specific URL normalization: for URLs starting with `prefix`, replace the first
/// `from` with `to` and append `suffix` unless the URL already names an image file.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RewriteRule {
    pub prefix: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub suffix: String,
}

impl RewriteRule {
    /// Imgur page links to their direct-content host.
    pub fn imgur() -> Self {
        Self {
            prefix: "https://imgur".to_string(),
            from: "imgur.com".to_string(),
            to: "i.imgur.com".to_string(),
            suffix: ".png".to_string(),
        }
    }

    pub fn apply(&self, url: &str) -> Option<String> {
        if !url.starts_with(self.prefix.as_str()) {
            return None;
        }
        let mut out = if self.from.is_empty() {
            url.to_string()
        } else {
            url.replacen(self.from.as_str(), self.to.as_str(), 1)
        };
        if !self.suffix.is_empty() && !has_image_extension(&out) {
            out.push_str(&self.suffix);
        }
        Some(out)
    }
}

fn has_image_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// First matching rule wins; unmatched URLs pass through unchanged.
pub fn normalize_url(rules: &[RewriteRule], url: &str) -> String {
    rules
        .iter()
        .find_map(|r| r.apply(url))
        .unwrap_or_else(|| url.to_string())
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_bytes: u64,
    pub rewrites: Vec<RewriteRule>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: 32 * 1024 * 1024,
            rewrites: vec![RewriteRule::imgur()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// Timeout, refused or reset connection.
    Network(String),
    /// The server answered, but not with usable image bytes.
    Content(String),
}

/// Byte transport for media URLs.
pub trait MediaTransport: Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

/// Blocking `reqwest` transport with a streamed, size-capped body read.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    max_bytes: u64,
}

impl HttpTransport {
    pub fn new(cfg: &FetchConfig) -> KarmaResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(concat!("karmaboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KarmaError::Other(anyhow::anyhow!("build media http client: {e}")))?;
        Ok(Self {
            client,
            max_bytes: cfg.max_bytes,
        })
    }
}

impl MediaTransport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() || e.is_request() {
                TransportError::Network(e.to_string())
            } else {
                TransportError::Content(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Content(format!("http status {status}")));
        }

        let mut body = Vec::new();
        resp.take(self.max_bytes + 1)
            .read_to_end(&mut body)
            .map_err(|e| TransportError::Network(format!("read body: {e}")))?;
        if body.len() as u64 > self.max_bytes {
            return Err(TransportError::Content(format!(
                "body exceeds {} bytes",
                self.max_bytes
            )));
        }
        Ok(body)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NoImageReason {
    NotAllowed,
    Content(String),
    Network(String),
}

#[derive(Debug)]
pub enum FetchOutcome {
    Image(RgbaImage),
    NoImage(NoImageReason),
}

impl FetchOutcome {
    pub fn image(self) -> Option<RgbaImage> {
        match self {
            Self::Image(img) => Some(img),
            Self::NoImage(_) => None,
        }
    }
}

/// Resolves a post's media URL to a decoded image. Never fails: every problem becomes
/// [`FetchOutcome::NoImage`], and content/network problems are written to the error log.
pub struct ImageFetcher<T = HttpTransport> {
    allow: AllowList,
    rewrites: Vec<RewriteRule>,
    transport: T,
    errors: Arc<TextLog>,
}

impl<T: MediaTransport> ImageFetcher<T> {
    pub fn new(
        allow: AllowList,
        rewrites: Vec<RewriteRule>,
        transport: T,
        errors: Arc<TextLog>,
    ) -> Self {
        Self {
            allow,
            rewrites,
            transport,
            errors,
        }
    }

    pub fn fetch(&self, url: &str) -> FetchOutcome {
        if !self.allow.allows(url) {
            tracing::debug!(url, "media url not on allow list");
            return FetchOutcome::NoImage(NoImageReason::NotAllowed);
        }

        let target = normalize_url(&self.rewrites, url);
        let reason = match self.transport.get(&target) {
            Ok(bytes) => match decode_image(&bytes) {
                Ok(img) => return FetchOutcome::Image(img),
                Err(e) => NoImageReason::Content(e.to_string()),
            },
            Err(TransportError::Content(detail)) => NoImageReason::Content(detail),
            Err(TransportError::Network(detail)) => NoImageReason::Network(detail),
        };

        match &reason {
            NoImageReason::Content(detail) => {
                tracing::warn!(url = %target, %detail, "could not load post image");
                self.errors
                    .append(&format!("could not load image of post {target}: {detail}"));
            }
            NoImageReason::Network(detail) => {
                tracing::warn!(url = %target, %detail, "network failure fetching post image");
                self.errors
                    .append(&format!("network failure fetching image of post {target}: {detail}"));
            }
            NoImageReason::NotAllowed => {}
        }
        FetchOutcome::NoImage(reason)
    }
}
