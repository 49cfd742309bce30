//! # catalog-import - bulk catalog import into a content store
//!
//! Reads a tabular catalog export, fetches and normalizes every referenced
//! product image, uploads each distinct image once, and creates one product
//! document per row through a session-authenticated REST client.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│   Builder   │────▶│   Client    │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (+ assets)  │     │ (POST docs) │
//! └─────────────┘     └─────────────┘     └──────┬──────┘     └─────────────┘
//!                                                │
//!                                         ┌──────▼──────┐
//!                                         │ UploadCache │
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use catalog_import::{Importer, ImportOptions, StoreClient, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Arc::new(StoreClient::new(StoreConfig::from_env().unwrap()).unwrap());
//!     let summary = Importer::new(client, ImportOptions::default()).run("catalog.csv").await.unwrap();
//!     println!("Imported {} of {} products", summary.succeeded, summary.total);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (RawRecord, NormalizedProduct, MediaRef)
//! - [`config`] - Store, asset and run settings
//! - [`logs`] - Broadcast run log
//! - [`parser`] - Source Reader with encoding/delimiter detection
//! - [`cache`] - Upload dedupe cache
//! - [`assets`] - Image download, transcode and upload
//! - [`builder`] - Row to product mapping
//! - [`client`] - Content store REST client
//! - [`validation`] - Product schema validation
//! - [`workflow`] - Import orchestration and maintenance passes

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// Reading
pub mod parser;

// Images
pub mod assets;
pub mod cache;

// Documents
pub mod builder;
pub mod validation;

// Store
pub mod client;

// Orchestration
pub mod workflow;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AssetError, BuildError, ClientError, ConfigError, ImportError, RecordError, SourceError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    BatchSummary, BlockKind, BodyBlock, ContentKey, ImportOutcome, ImportSummary, MediaAsset,
    MediaId,
    MediaRef, NormalizedProduct, ProductStatus, RawRecord, Variant,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{AssetConfig, AuthScheme, DedupeKey, ImportOptions, StoreConfig};

// =============================================================================
// Re-exports - Source Reader
// =============================================================================

pub use parser::{detect_delimiter, detect_encoding, SourceEncoding, SourceReader};

// =============================================================================
// Re-exports - Assets
// =============================================================================

pub use assets::{split_references, AssetPipeline, AssetStage};
pub use cache::{CacheStatus, UploadCache};

// =============================================================================
// Re-exports - Builder & validation
// =============================================================================

pub use builder::{map_category, slugify, DocumentBuilder, ProductDraft};
pub use validation::{is_valid_product, validate_product};

// =============================================================================
// Re-exports - Client
// =============================================================================

pub use client::{Page, StoreClient};

// =============================================================================
// Re-exports - Workflows
// =============================================================================

pub use workflow::{delete_all_products, list_media, update_all_stocks, Importer};
