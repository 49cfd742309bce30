//! Domain models for the catalog import pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`RawRecord`] - One source row, column name to raw string
//! - [`NormalizedProduct`] - Typed product ready to be committed
//! - [`MediaAsset`] / [`MediaRef`] - An image in flight and its uploaded reference
//! - [`ImportOutcome`] / [`ImportSummary`] - Per-record results and their aggregate
//! - [`BatchSummary`] - Counters for delete and stock-update passes

pub mod document;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Source Rows
// =============================================================================

/// One row of the source file, keyed by header name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// 1-based data row index (header excluded).
    pub index: usize,
    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new(index: usize, fields: HashMap<String, String>) -> Self {
        Self { index, fields }
    }

    /// Build a record from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(index: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            index,
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Trimmed value of a column, `None` when absent or blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Trimmed value or an empty string.
    pub fn get_or_empty(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Column names of the catalog export.
pub mod columns {
    pub const TITLE: &str = "nom";
    pub const CATEGORY: &str = "categorie";
    pub const PRICE: &str = "prix";
    pub const REFERENCE: &str = "reference";
    pub const IMAGES: &str = "images";
    pub const COLOR: &str = "couleur_principale";
    pub const MATERIAL: &str = "matiere_exterieure";
    pub const SOLE: &str = "semelle";
    pub const ORIGIN: &str = "origine";
}

// =============================================================================
// Media
// =============================================================================

/// Identifier assigned by the store to an uploaded media document.
///
/// Depending on the store's database this is a string or an integer; it is
/// carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaId {
    Int(i64),
    Str(String),
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaId::Int(i) => write!(f, "{}", i),
            MediaId::Str(s) => f.write_str(s),
        }
    }
}

/// Stable dedupe key for an asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey(String);

impl ContentKey {
    /// Key derived from a source URL: the query string and fragment are dropped.
    pub fn from_url(url: &str) -> Self {
        Self(clean_url(url).to_string())
    }

    /// Key derived from a SHA-256 digest of the downloaded bytes.
    pub fn from_digest(hex_digest: String) -> Self {
        Self(format!("sha256:{}", hex_digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip query string and fragment from a URL.
pub fn clean_url(url: &str) -> &str {
    let url = url.trim();
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// An image being processed for one record. Worker-local.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    /// URL as referenced in the source row, query string removed.
    pub source_url: String,
    /// File name used for the multipart upload.
    pub file_name: String,
    pub content_key: ContentKey,
}

/// Durable result of a successful upload, embedded into products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    #[serde(rename = "image")]
    pub remote_media_id: MediaId,
    #[serde(rename = "alt")]
    pub alt_text: String,
}

impl MediaRef {
    /// Same media document under another alt text.
    pub fn relabelled(self, alt_text: impl Into<String>) -> Self {
        Self { alt_text: alt_text.into(), ..self }
    }
}

// =============================================================================
// Product
// =============================================================================

/// Kind of a body paragraph. Declaration order is emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Summary,
    Material,
    Sole,
    Origin,
}

/// One paragraph of the structured product body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyBlock {
    pub kind: BlockKind,
    pub text: String,
}

/// A purchasable variation of a product along one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub value: String,
    pub stock: u32,
    /// `None` inherits the product price.
    pub price: Option<f64>,
}

/// Publication status of a product document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Published,
}

/// Product built from a record, with its uploaded images.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedProduct {
    pub title: String,
    pub slug: String,
    pub category: String,
    pub price: f64,
    pub body_blocks: Vec<BodyBlock>,
    pub short_description: String,
    pub images: Vec<MediaRef>,
    pub variants: Vec<Variant>,
    pub is_featured: bool,
    pub is_new_arrival: bool,
    pub rating: f64,
    pub review_count: u32,
    pub status: ProductStatus,
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of importing one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub index: usize,
    pub success: bool,
    pub error: Option<String>,
}

impl ImportOutcome {
    pub fn succeeded(index: usize) -> Self {
        Self { index, success: true, error: None }
    }

    pub fn failed(index: usize, reason: impl Into<String>) -> Self {
        Self { index, success: false, error: Some(reason.into()) }
    }
}

/// Aggregate of a run's outcomes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failure_rate: f64,
}

impl ImportSummary {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        total: usize,
        succeeded: usize,
        failed: usize,
    ) -> Self {
        let failure_rate = if total == 0 { 0.0 } else { failed as f64 / total as f64 };
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            total,
            succeeded,
            failed,
            failure_rate,
        }
    }

    /// Percentage of records that succeeded, 0-100.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64 * 100.0
        }
    }
}

/// Counters for a maintenance pass over existing documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, ok: bool) {
        self.total += 1;
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_get_trims_and_skips_blank() {
        let record = RawRecord::from_pairs(1, [("nom", "  Air Runner "), ("semelle", "   ")]);
        assert_eq!(record.get("nom"), Some("Air Runner"));
        assert_eq!(record.get("semelle"), None);
        assert_eq!(record.get("origine"), None);
        assert_eq!(record.get_or_empty("origine"), "");
    }

    #[test]
    fn test_content_key_strips_query() {
        let a = ContentKey::from_url("http://x/a.jpg?w=100&h=100");
        let b = ContentKey::from_url("http://x/a.jpg");
        let c = ContentKey::from_url("http://x/a.jpg#zoom");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "http://x/a.jpg");
    }

    #[test]
    fn test_media_ref_wire_format() {
        let media = MediaRef { remote_media_id: MediaId::Int(12), alt_text: "Front".into() };
        let json = serde_json::to_value(&media).unwrap();
        assert_eq!(json, serde_json::json!({ "image": 12, "alt": "Front" }));

        let parsed: MediaId = serde_json::from_value(serde_json::json!("65f0a1")).unwrap();
        assert_eq!(parsed, MediaId::Str("65f0a1".into()));
    }

    #[test]
    fn test_relabelled_keeps_media_id() {
        let media = MediaRef {
            remote_media_id: MediaId::Int(4),
            alt_text: "Runner A - image 1".into(),
        };
        let reused = media.relabelled("Runner B - image 2");
        assert_eq!(reused.remote_media_id, MediaId::Int(4));
        assert_eq!(reused.alt_text, "Runner B - image 2");
    }

    #[test]
    fn test_summary_rates() {
        let summary = ImportSummary::new(Uuid::new_v4(), Utc::now(), 4, 3, 1);
        assert!((summary.failure_rate - 0.25).abs() < f64::EPSILON);
        assert!((summary.success_rate() - 75.0).abs() < f64::EPSILON);

        let empty = ImportSummary::new(Uuid::new_v4(), Utc::now(), 0, 0, 0);
        assert_eq!(empty.failure_rate, 0.0);
        assert_eq!(empty.success_rate(), 0.0);
    }

    #[test]
    fn test_batch_summary_counts() {
        let mut batch = BatchSummary::default();
        batch.record(true);
        batch.record(false);
        batch.record(true);
        assert_eq!(batch, BatchSummary { total: 3, succeeded: 2, failed: 1 });
    }

    #[test]
    fn test_block_kind_order() {
        let mut kinds =
            vec![BlockKind::Origin, BlockKind::Summary, BlockKind::Sole, BlockKind::Material];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![BlockKind::Summary, BlockKind::Material, BlockKind::Sole, BlockKind::Origin]
        );
    }
}
