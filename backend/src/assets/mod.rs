//! Asset Pipeline: turns a record's image references into uploaded media.
//!
//! Each reference walks the same stages:
//!
//! ```text
//! Pending ─▶ CheckCache ─┬─▶ Cached ─────────────────────────────────┐
//!                        └─▶ Downloading ─▶ Validating ─▶ Transforming ─┤
//!                                 │              │              │       ▼
//!                                 └──── Failed ◀─┴──────────────┴── Uploading ─▶ Done
//! ```
//!
//! A failed asset is logged and dropped; the record carries on with the rest.
//! Up to `image_concurrency` assets of a record run at once and the surviving
//! [`MediaRef`]s come back in reference order, whatever order they finished in.
//! A media document shared with an earlier record is re-labelled with this
//! record's alt text.

pub mod fetch;
pub mod transform;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};

use crate::cache::{CacheStatus, UploadCache};
use crate::client::StoreClient;
use crate::config::{AssetConfig, DedupeKey};
use crate::error::{AssetError, AssetResult, ClientResult};
use crate::logs::{log_info_indent, log_success_indent, log_warning_indent};
use crate::models::{clean_url, ContentKey, MediaAsset, MediaRef};

pub use fetch::Fetcher;
pub use transform::transcode;

/// Active stage of an asset, the one a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStage {
    Downloading,
    Validating,
    Transforming,
    Uploading,
}

impl AssetStage {
    /// Stage an error was raised from.
    pub fn of_error(err: &AssetError) -> Self {
        match err {
            AssetError::FetchTimeout(_)
            | AssetError::FetchHttpError { .. }
            | AssetError::Network { .. } => AssetStage::Downloading,
            AssetError::InvalidAsset(_) => AssetStage::Validating,
            AssetError::TransformFailed(_) => AssetStage::Transforming,
            AssetError::UploadRejected(_) => AssetStage::Uploading,
        }
    }
}

impl fmt::Display for AssetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetStage::Downloading => "downloading",
            AssetStage::Validating => "validating",
            AssetStage::Transforming => "transforming",
            AssetStage::Uploading => "uploading",
        };
        f.write_str(name)
    }
}

/// Split a `;`-joined reference list, keeping at most `max` non-blank entries.
pub fn split_references(images: &str, max: usize) -> Vec<String> {
    images
        .split(';')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .take(max)
        .map(str::to_string)
        .collect()
}

/// Per-run image processor, shared by all record workers.
pub struct AssetPipeline {
    fetcher: Fetcher,
    client: Arc<StoreClient>,
    cache: Arc<UploadCache>,
    config: AssetConfig,
}

impl AssetPipeline {
    pub fn new(
        client: Arc<StoreClient>,
        cache: Arc<UploadCache>,
        config: AssetConfig,
    ) -> ClientResult<Self> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self { fetcher, client, cache, config })
    }

    pub fn cache(&self) -> &UploadCache {
        &self.cache
    }

    /// Resolve every reference of a record; failed assets are omitted.
    pub async fn process_record(
        &self,
        record_index: usize,
        title: &str,
        images: &str,
    ) -> Vec<MediaRef> {
        let references = split_references(images, self.config.max_images_per_record);
        if references.is_empty() {
            return Vec::new();
        }

        let mut done: Vec<(usize, MediaRef)> = stream::iter(references.into_iter().enumerate())
            .map(|(position, url)| async move {
                let asset = asset_for(record_index, position + 1, &url);
                let alt = format!("{} - image {}", title, position + 1);
                let result = self
                    .process_asset(asset, &alt)
                    .await
                    .map(|(media, status)| (media.relabelled(alt), status));
                (position, url, result)
            })
            .buffer_unordered(self.config.image_concurrency.max(1))
            .filter_map(|(position, url, result)| async move {
                match result {
                    Ok((media, CacheStatus::Hit)) => {
                        log_info_indent(
                            format!("Image {}: cached as {}", position + 1, media.remote_media_id),
                            2,
                        );
                        Some((position, media))
                    }
                    Ok((media, CacheStatus::Uploaded)) => {
                        log_success_indent(
                            format!(
                                "Image {}: uploaded as {}",
                                position + 1,
                                media.remote_media_id
                            ),
                            2,
                        );
                        Some((position, media))
                    }
                    Err(err) => {
                        let stage = AssetStage::of_error(&err);
                        log_warning_indent(
                            format!("Image {} failed while {}: {}", position + 1, stage, err),
                            2,
                        );
                        log_info_indent(clean_url(&url).to_string(), 3);
                        None
                    }
                }
            })
            .collect()
            .await;

        done.sort_by_key(|(position, _)| *position);
        done.into_iter().map(|(_, media)| media).collect()
    }

    /// Run one asset through the stage machine.
    pub async fn process_asset(
        &self,
        asset: MediaAsset,
        alt: &str,
    ) -> AssetResult<(MediaRef, CacheStatus)> {
        match self.config.dedupe {
            DedupeKey::SourceUrl => {
                self.cache
                    .get_or_upload(&asset.content_key, || async {
                        let bytes = self.fetcher.download(&asset.source_url).await?;
                        self.transform_and_upload(bytes, &asset.file_name, alt).await
                    })
                    .await
            }
            DedupeKey::ContentHash => {
                // The URL entry aliases the digest entry, so a repeated URL skips the download.
                let reused = AtomicBool::new(false);
                let (media, status) = self
                    .cache
                    .get_or_upload(&asset.content_key, || async {
                        let bytes = self.fetcher.download(&asset.source_url).await?;
                        let digest = ContentKey::from_digest(sha256_hex(&bytes));
                        let (media, status) = self
                            .cache
                            .get_or_upload(&digest, || {
                                self.transform_and_upload(bytes, &asset.file_name, alt)
                            })
                            .await?;
                        reused.store(status == CacheStatus::Hit, Ordering::SeqCst);
                        Ok::<_, AssetError>(media)
                    })
                    .await?;
                let status = if reused.load(Ordering::SeqCst) { CacheStatus::Hit } else { status };
                Ok((media, status))
            }
        }
    }

    async fn transform_and_upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        alt: &str,
    ) -> AssetResult<MediaRef> {
        let max_dimension = self.config.max_dimension;
        let quality = self.config.jpeg_quality;
        let jpeg = tokio::task::spawn_blocking(move || transcode(&bytes, max_dimension, quality))
            .await
            .map_err(|e| AssetError::TransformFailed(format!("transcode task: {}", e)))??;

        self.client
            .upload_media(jpeg, file_name, alt)
            .await
            .map_err(|e| AssetError::UploadRejected(e.to_string()))
    }
}

/// Describe the `position`-th (1-based) image of a record.
fn asset_for(record_index: usize, position: usize, url: &str) -> MediaAsset {
    let source_url = clean_url(url).to_string();
    MediaAsset {
        content_key: ContentKey::from_url(&source_url),
        file_name: format!("product_{}_image_{}.jpg", record_index, position),
        source_url,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_references_caps_and_trims() {
        let refs =
            split_references(" http://x/1.jpg ;; http://x/2.jpg;http://x/3.jpg;http://x/4.jpg", 3);
        assert_eq!(refs, vec!["http://x/1.jpg", "http://x/2.jpg", "http://x/3.jpg"]);
        assert!(split_references("", 3).is_empty());
        assert!(split_references(" ; ", 3).is_empty());
    }

    #[test]
    fn test_asset_for_cleans_url() {
        let asset = asset_for(7, 2, "http://x/a.jpg?w=200");
        assert_eq!(asset.source_url, "http://x/a.jpg");
        assert_eq!(asset.file_name, "product_7_image_2.jpg");
        assert_eq!(asset.content_key, ContentKey::from_url("http://x/a.jpg"));
    }

    #[test]
    fn test_stage_of_error() {
        let stage = |err: AssetError| AssetStage::of_error(&err);
        assert_eq!(stage(AssetError::FetchTimeout("u".into())), AssetStage::Downloading);
        assert_eq!(stage(AssetError::InvalidAsset("small".into())), AssetStage::Validating);
        assert_eq!(stage(AssetError::TransformFailed("x".into())), AssetStage::Transforming);
        assert_eq!(stage(AssetError::UploadRejected("x".into())), AssetStage::Uploading);
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
