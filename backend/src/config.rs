//! Run configuration.
//!
//! Store credentials come from the environment (a `.env` file is honoured by the
//! binary). Tuning knobs have defaults matching the store's tolerance and can be
//! overridden with the builder-style setters.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Default store API root.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Browser-like user agent used when downloading images.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// =============================================================================
// Store
// =============================================================================

/// Scheme placed before the token in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthScheme {
    Bearer,
    Jwt,
}

impl AuthScheme {
    pub fn prefix(&self) -> &'static str {
        match self {
            AuthScheme::Bearer => "Bearer",
            AuthScheme::Jwt => "JWT",
        }
    }
}

/// Connection settings for the remote content store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// API root, without trailing slash (e.g. `http://localhost:3000/api`).
    pub api_url: String,
    pub email: String,
    pub password: String,
    pub auth_scheme: AuthScheme,
    /// Page size for collection listing.
    pub page_size: usize,
    /// Pause between successive delete calls.
    pub delete_delay: Duration,
    /// Timeout for calls to the store.
    pub request_timeout: Duration,
}

impl StoreConfig {
    pub fn new(
        api_url: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            email: email.into(),
            password: password.into(),
            auth_scheme: AuthScheme::Bearer,
            page_size: 100,
            delete_delay: Duration::from_millis(100),
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Load from `CATALOG_API_URL`, `CATALOG_ADMIN_EMAIL`, `CATALOG_ADMIN_PASSWORD`
    /// and `CATALOG_AUTH_SCHEME`.
    pub fn from_env() -> ConfigResult<Self> {
        let api_url = env::var("CATALOG_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let email = required("CATALOG_ADMIN_EMAIL")?;
        let password = required("CATALOG_ADMIN_PASSWORD")?;

        let mut config = Self::new(api_url, email, password);
        if let Ok(scheme) = env::var("CATALOG_AUTH_SCHEME") {
            config.auth_scheme = parse_auth_scheme(&scheme)?;
        }
        Ok(config)
    }

    pub fn with_auth_scheme(mut self, scheme: AuthScheme) -> Self {
        self.auth_scheme = scheme;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn required(var: &str) -> ConfigResult<String> {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing(var.to_string()))
}

fn parse_auth_scheme(raw: &str) -> ConfigResult<AuthScheme> {
    match raw.trim().to_lowercase().as_str() {
        "bearer" => Ok(AuthScheme::Bearer),
        "jwt" => Ok(AuthScheme::Jwt),
        other => Err(ConfigError::Invalid {
            var: "CATALOG_AUTH_SCHEME".to_string(),
            message: format!("expected 'Bearer' or 'JWT', got '{}'", other),
        }),
    }
}

// =============================================================================
// Assets
// =============================================================================

/// How an asset's dedupe key is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupeKey {
    /// Cleaned source URL. Checked before any download.
    #[default]
    SourceUrl,
    /// SHA-256 of the downloaded bytes. Catches the same image behind different URLs.
    ContentHash,
}

/// Settings for downloading and transcoding images.
#[derive(Debug, Clone)]
pub struct AssetConfig {
    pub fetch_timeout: Duration,
    /// Payloads smaller than this are treated as placeholders.
    pub min_bytes: usize,
    /// Bounding box edge, in pixels.
    pub max_dimension: u32,
    pub jpeg_quality: u8,
    pub user_agent: String,
    /// Images kept per record, in reference order.
    pub max_images_per_record: usize,
    /// Width of the per-record image pool.
    pub image_concurrency: usize,
    pub dedupe: DedupeKey,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(20),
            min_bytes: 1000,
            max_dimension: 800,
            jpeg_quality: 85,
            user_agent: BROWSER_USER_AGENT.to_string(),
            max_images_per_record: 3,
            image_concurrency: 3,
            dedupe: DedupeKey::SourceUrl,
        }
    }
}

// =============================================================================
// Import run
// =============================================================================

/// Options for one import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Only import the first N records.
    pub limit: Option<usize>,
    /// Width of the record worker pool.
    pub concurrency: usize,
    /// Seed for cosmetic fields (ratings, flags, slug suffixes).
    pub seed: Option<u64>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            limit: None,
            concurrency: 3,
            seed: None,
        }
    }
}
