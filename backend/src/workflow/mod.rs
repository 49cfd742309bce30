//! Import Orchestrator and maintenance workflows.
//!
//! An import run goes:
//!
//! ```text
//! authenticate ─▶ open source ─▶ records ─┬─▶ worker ─┐
//!                                         ├─▶ worker ─┼─▶ counters ─▶ ImportSummary
//!                                         └─▶ worker ─┘
//! ```
//!
//! Each worker runs one record through the builder, the asset pipeline and a
//! single create call. A record's failure is turned into an [`ImportOutcome`]
//! and never touches its siblings; only authentication and an unreadable
//! source abort the run.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use catalog_import::{Importer, ImportOptions, StoreClient, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(StoreClient::new(StoreConfig::from_env()?)?);
//!     let summary = Importer::new(client, ImportOptions::default()).run("catalog.csv").await?;
//!     println!("{}/{} imported", summary.succeeded, summary.total);
//!     Ok(())
//! }
//! ```

pub mod maintenance;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use crate::assets::AssetPipeline;
use crate::builder::DocumentBuilder;
use crate::cache::UploadCache;
use crate::client::{doc_id, StoreClient};
use crate::config::{AssetConfig, ImportOptions};
use crate::error::{ImportResult, RecordError, RecordResult, SourceError, SourceResult};
use crate::logs::{
    log_error, log_info, log_info_indent, log_success, log_warning, log_warning_indent,
};
use crate::models::{columns, ImportOutcome, ImportSummary, RawRecord};
use crate::parser::SourceReader;
use crate::validation::validate_product;

pub use maintenance::{delete_all_products, list_media, stock_for_title, update_all_stocks};

/// Runs imports against one store.
///
/// The upload cache is injected so several runs (or a test) can share it.
pub struct Importer {
    client: Arc<StoreClient>,
    cache: Arc<UploadCache>,
    assets: AssetConfig,
    options: ImportOptions,
}

/// Everything a record worker borrows.
struct RecordContext<'a> {
    client: &'a StoreClient,
    pipeline: &'a AssetPipeline,
    builder: &'a DocumentBuilder,
}

impl Importer {
    pub fn new(client: Arc<StoreClient>, options: ImportOptions) -> Self {
        Self {
            client,
            cache: Arc::new(UploadCache::new()),
            assets: AssetConfig::default(),
            options,
        }
    }

    pub fn with_cache(mut self, cache: Arc<UploadCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_asset_config(mut self, assets: AssetConfig) -> Self {
        self.assets = assets;
        self
    }

    pub fn cache(&self) -> &Arc<UploadCache> {
        &self.cache
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Import every record of `path` (or the first `limit`).
    pub async fn run(&self, path: impl AsRef<Path>) -> ImportResult<ImportSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let path = path.as_ref();

        log_info(format!("🚀 Import run {} from {}", run_id, path.display()));
        log_info(format!(
            "⚡ {} record workers, {} image workers per record",
            self.options.concurrency.max(1),
            self.assets.image_concurrency.max(1)
        ));

        // Step 1: Session
        if let Err(e) = self.client.authenticate().await {
            log_error(format!("Authentication failed, nothing was imported: {}", e));
            return Err(e.into());
        }
        log_success("Authenticated");

        // Step 2: Source
        let reader = SourceReader::open(path)?;
        log_success(format!(
            "Detected encoding {} and separator '{}'",
            reader.encoding().name(),
            format_delimiter(reader.delimiter())
        ));
        let records = reader.records()?;

        // Step 3: Fan out
        let pipeline =
            AssetPipeline::new(self.client.clone(), self.cache.clone(), self.assets.clone())?;
        let builder = DocumentBuilder::new(self.options.seed);
        let ctx = RecordContext { client: &self.client, pipeline: &pipeline, builder: &builder };
        let ctx = &ctx;

        let limit = self.options.limit.unwrap_or(usize::MAX);
        let (succeeded, failed) = stream::iter(records.take(limit))
            .map(|row| import_row(ctx, row))
            .buffer_unordered(self.options.concurrency.max(1))
            .fold((0usize, 0usize), |(succeeded, failed), outcome| async move {
                if outcome.success {
                    (succeeded + 1, failed)
                } else {
                    (succeeded, failed + 1)
                }
            })
            .await;

        // Step 4: Summary
        let summary = ImportSummary::new(run_id, started_at, succeeded + failed, succeeded, failed);
        log_success("🎉 Import finished");
        log_info_indent(format!("Succeeded: {}", summary.succeeded), 1);
        log_info_indent(format!("Failed: {}", summary.failed), 1);
        log_info_indent(format!("Success rate: {:.1}%", summary.success_rate()), 1);
        log_info_indent(format!("Images uploaded: {}", self.cache.len()), 1);
        Ok(summary)
    }
}

async fn import_row(ctx: &RecordContext<'_>, row: SourceResult<RawRecord>) -> ImportOutcome {
    let index = match &row {
        Ok(record) => record.index,
        Err(SourceError::MalformedRecord { row, .. }) => *row,
        Err(_) => 0,
    };

    match import_record(ctx, row).await {
        Ok(id) => {
            log_success(format!("Record {}: created {}", index, id));
            ImportOutcome::succeeded(index)
        }
        Err(e) => {
            log_warning(format!("Record {} skipped: {}", index, e));
            ImportOutcome::failed(index, e.to_string())
        }
    }
}

/// Build, enrich, check and post one record. Returns the created document id.
async fn import_record(
    ctx: &RecordContext<'_>,
    row: SourceResult<RawRecord>,
) -> RecordResult<String> {
    let record = row?;
    let draft = ctx.builder.prepare(&record)?;
    log_info(format!("🔄 Record {}: {}", record.index, draft.title()));

    let images = ctx
        .pipeline
        .process_record(record.index, draft.title(), record.get_or_empty(columns::IMAGES))
        .await;
    if images.is_empty() && record.get(columns::IMAGES).is_some() {
        log_warning_indent("No image could be attached", 1);
    }

    let product = draft.with_images(images);
    let document = product.to_document()?;
    validate_product(&document).map_err(RecordError::Invalid)?;

    let created = ctx.client.create_product(&document).await?;
    Ok(doc_id(&created).unwrap_or_else(|| product.slug.clone()))
}

fn format_delimiter(d: u8) -> &'static str {
    match d {
        b';' => ";",
        b',' => ",",
        b'\t' => "TAB",
        b'|' => "|",
        _ => "?",
    }
}
