//! Document retrieval for the job worker.
//!
//! Supports remote `http(s)` URLs and embedded `data:` URLs (documents the
//! UI ships inline). Size probing never downloads the content: HEAD for
//! remote documents, encoded-length arithmetic for embedded ones — the size
//! feeds the large-document throttle, an estimate is enough.

use async_trait::async_trait;
use base64::Engine;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Server returned HTTP {0}")]
    Status(u16),

    #[error("Cannot decode document content: {0}")]
    Decode(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedUrl(String),
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Byte size of the document, estimated without a full download.
    async fn probe_size(&self, url: &str) -> Result<u64, FetchError>;

    /// The document text.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpDocumentFetcher {
    client: reqwest::Client,
}

impl HttpDocumentFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpDocumentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn probe_size(&self, url: &str) -> Result<u64, FetchError> {
        if let Some(data) = url.strip_prefix("data:") {
            return Ok(estimate_data_url_size(data));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(FetchError::UnsupportedUrl(scheme_of(url)));
        }

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        Ok(response.content_length().unwrap_or(0))
    }

    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        if let Some(data) = url.strip_prefix("data:") {
            return decode_data_url(data);
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(FetchError::UnsupportedUrl(scheme_of(url)));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

fn scheme_of(url: &str) -> String {
    url.split(':').next().unwrap_or("").to_string()
}

/// `data:[<mediatype>][;base64],<payload>` — size without decoding.
fn estimate_data_url_size(data: &str) -> u64 {
    let Some((header, payload)) = data.split_once(',') else {
        return 0;
    };
    if header.ends_with(";base64") {
        // 4 encoded chars carry 3 bytes; padding trims the tail
        let padding = payload.chars().rev().take_while(|c| *c == '=').count() as u64;
        (payload.len() as u64 / 4) * 3 - padding.min(2)
    } else {
        payload.len() as u64
    }
}

fn decode_data_url(data: &str) -> Result<String, FetchError> {
    let Some((header, payload)) = data.split_once(',') else {
        return Err(FetchError::Decode("data URL without payload".into()));
    };

    if header.ends_with(";base64") {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| FetchError::Decode(e.to_string()))
    } else {
        Ok(percent_decode(payload))
    }
}

/// Minimal percent decoding for plain-text data URLs.
fn percent_decode(payload: &str) -> String {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Mock fetcher for worker tests — configurable content, size and failure.
pub struct MockDocumentFetcher {
    text: String,
    size: u64,
    fail: bool,
}

impl MockDocumentFetcher {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            size: text.len() as u64,
            fail: false,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn failing() -> Self {
        Self {
            text: String::new(),
            size: 0,
            fail: true,
        }
    }
}

#[async_trait]
impl DocumentFetcher for MockDocumentFetcher {
    async fn probe_size(&self, _url: &str) -> Result<u64, FetchError> {
        if self.fail {
            return Err(FetchError::Request("mock failure".into()));
        }
        Ok(self.size)
    }

    async fn fetch_text(&self, _url: &str) -> Result<String, FetchError> {
        if self.fail {
            return Err(FetchError::Request("mock failure".into()));
        }
        Ok(self.text.clone())
    }
}
