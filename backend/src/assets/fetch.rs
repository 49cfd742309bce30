//! Image download with a browser-like request profile.
//!
//! Covers the DOWNLOADING and VALIDATING stages: the bytes come back only if
//! the answer is 2xx, declares an `image/*` content type and is large enough
//! not to be a placeholder.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};

use crate::config::AssetConfig;
use crate::error::{AssetError, AssetResult};

/// HTTP client for remote images.
#[derive(Debug, Clone)]
pub struct Fetcher {
    http: reqwest::Client,
    min_bytes: usize,
}

impl Fetcher {
    pub fn new(config: &AssetConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("fr-FR,fr;q=0.9,en;q=0.8"));
        headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("image"));
        headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("no-cors"));
        headers.insert("Sec-Fetch-Site", HeaderValue::from_static("cross-site"));

        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.fetch_timeout)
            .build()?;

        Ok(Self { http, min_bytes: config.min_bytes })
    }

    /// Fetch `url` and check it looks like a real image.
    pub async fn download(&self, url: &str) -> AssetResult<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::FetchHttpError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let bytes = response.bytes().await.map_err(|e| classify(url, e))?.to_vec();
        validate(&content_type, bytes.len(), self.min_bytes)?;

        Ok(bytes)
    }
}

fn classify(url: &str, err: reqwest::Error) -> AssetError {
    if err.is_timeout() {
        AssetError::FetchTimeout(url.to_string())
    } else {
        AssetError::Network { url: url.to_string(), message: err.to_string() }
    }
}

/// Reject non-image content types and placeholder-sized payloads.
pub fn validate(content_type: &str, len: usize, min_bytes: usize) -> AssetResult<()> {
    if !content_type.trim().to_lowercase().starts_with("image/") {
        let shown = if content_type.is_empty() { "<none>" } else { content_type };
        return Err(AssetError::InvalidAsset(format!("not an image: {}", shown)));
    }
    if len < min_bytes {
        return Err(AssetError::InvalidAsset(format!("image too small: {} bytes", len)));
    }
    Ok(())
}
