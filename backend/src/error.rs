//! Error types for the catalog import pipeline.
//!
//! One enum per layer, mirroring how failures are scoped during a run:
//!
//! - [`SourceError`] - reading the tabular source file
//! - [`AssetError`] - fetching, checking, transcoding and uploading one image
//! - [`BuildError`] - turning a source row into a product document
//! - [`ClientError`] - talking to the remote content store
//! - [`ConfigError`] - environment configuration
//! - [`RecordError`] - why one record was counted as failed
//! - [`ImportError`] - fatal, run-aborting errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Source Reader Errors
// =============================================================================

/// Errors while reading the catalog export.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source path does not exist. Fatal for a run.
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Failed to read the file.
    #[error("Failed to read source: {0}")]
    Io(#[from] std::io::Error),

    /// A row could not be decoded. Recoverable: the row is skipped.
    #[error("Malformed record at row {row}: {message}")]
    MalformedRecord { row: usize, message: String },

    /// No header row found.
    #[error("No headers found in source file")]
    NoHeaders,
}

// =============================================================================
// Asset Pipeline Errors
// =============================================================================

/// Errors for a single image. Always recoverable: the asset is dropped.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Download exceeded the request timeout.
    #[error("Timed out fetching {0}")]
    FetchTimeout(String),

    /// Download answered with a non-2xx status.
    #[error("HTTP {status} fetching {url}")]
    FetchHttpError { url: String, status: u16 },

    /// Connection-level failure while downloading.
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Payload is not an image, or looks like a placeholder.
    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    /// Decoding or re-encoding failed.
    #[error("Transform failed: {0}")]
    TransformFailed(String),

    /// The store refused the upload.
    #[error("Upload rejected: {0}")]
    UploadRejected(String),
}

// =============================================================================
// Document Builder Errors
// =============================================================================

/// Errors while building a product from a row. Recoverable per record.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Price is present but not a number.
    #[error("Invalid price: '{0}'")]
    InvalidPrice(String),

    /// A required column is missing or blank.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

// =============================================================================
// API Session Client Errors
// =============================================================================

/// Errors from the remote content store client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Login refused or unusable. Fatal for a run.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer on a read or write.
    #[error("Store answered {status}: {body}")]
    Status { status: u16, body: String },

    /// The body did not have the expected shape.
    #[error("Invalid store response: {0}")]
    InvalidResponse(String),

    /// A call was made before `authenticate`.
    #[error("No credentials configured")]
    MissingCredentials,
}

impl ClientError {
    /// Whether this error means the session is no longer accepted.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ClientError::Status { status: 401 | 403, .. })
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required variable not set.
    #[error("Missing {0} environment variable")]
    Missing(String),

    /// Variable set but unparseable.
    #[error("Invalid value for {var}: {message}")]
    Invalid { var: String, message: String },
}

// =============================================================================
// Record Errors
// =============================================================================

/// Per-record failure. Counted in the summary, never propagated past the worker.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The row itself could not be read.
    #[error("{0}")]
    Source(#[from] SourceError),

    /// The row could not be mapped to a product.
    #[error("{0}")]
    Build(#[from] BuildError),

    /// The product could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The document does not match the product schema.
    #[error("Document rejected by schema: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// The store refused the write.
    #[error("Write rejected: {0}")]
    Write(#[from] ClientError),
}

// =============================================================================
// Import Errors (top-level)
// =============================================================================

/// Run-aborting errors.
///
/// This is the error type returned by [`crate::workflow::Importer::run`].
/// Anything narrower than this is absorbed into an outcome or a dropped asset.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Source could not be opened.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Store client error (authentication, listing).
    #[error("Store error: {0}")]
    Client(#[from] ClientError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

/// Result type for document building.
pub type BuildResult<T> = Result<T, BuildError>;

/// Result type for store client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for one record's import.
pub type RecordResult<T> = Result<T, RecordError>;

/// Result type for whole-run operations.
pub type ImportResult<T> = Result<T, ImportError>;
