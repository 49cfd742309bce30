//! Upload Cache - remembers which images have already been uploaded
//!
//! Shared by every worker of a run. Keys are [`ContentKey`]s; values are the
//! [`MediaRef`] returned by the one upload that succeeded for that key.
//!
//! Each key owns an async once-cell. The map lookup that hands out the cell is
//! the only critical section; the upload itself runs inside the cell's
//! initializer, so concurrent requests for the same key wait for the first
//! uploader instead of uploading again. A failed upload leaves the cell empty
//! and the next request retries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::error::AssetResult;
use crate::models::{ContentKey, MediaRef};

/// Where a [`MediaRef`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache, no network call made for the upload.
    Hit,
    /// Produced by this call's upload.
    Uploaded,
}

/// Process-wide `ContentKey -> MediaRef` map with at-most-once uploads.
#[derive(Debug, Default)]
pub struct UploadCache {
    entries: Mutex<HashMap<ContentKey, Arc<OnceCell<MediaRef>>>>,
}

impl UploadCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, key: &ContentKey) -> Arc<OnceCell<MediaRef>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.entry(key.clone()).or_default().clone()
    }

    /// Completed entry for `key`, if any.
    pub fn get(&self, key: &ContentKey) -> Option<MediaRef> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Return the cached reference for `key`, or run `upload` to produce it.
    ///
    /// `upload` runs at most once per key across all concurrent callers, unless
    /// it fails, in which case a later caller may run its own.
    pub async fn get_or_upload<F, Fut>(
        &self,
        key: &ContentKey,
        upload: F,
    ) -> AssetResult<(MediaRef, CacheStatus)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AssetResult<MediaRef>>,
    {
        let cell = self.cell(key);
        if let Some(media) = cell.get() {
            return Ok((media.clone(), CacheStatus::Hit));
        }

        let mut status = CacheStatus::Hit;
        let status_ref = &mut status;
        let media = cell
            .get_or_try_init(|| async move {
                *status_ref = CacheStatus::Uploaded;
                upload().await
            })
            .await?
            .clone();
        Ok((media, status))
    }

    /// Number of completed uploads.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetError;
    use crate::models::MediaId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn media(id: i64) -> MediaRef {
        MediaRef { remote_media_id: MediaId::Int(id), alt_text: "Image 1".into() }
    }

    #[tokio::test]
    async fn test_second_lookup_hits_cache() {
        let cache = UploadCache::new();
        let key = ContentKey::from_url("http://x/a.jpg?v=2");
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let (first, s1) = cache
            .get_or_upload(&key, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(media(1))
            })
            .await
            .unwrap();
        let (second, s2) = cache
            .get_or_upload(&key, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(media(2))
            })
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(s1, CacheStatus::Uploaded);
        assert_eq!(s2, CacheStatus::Hit);
        assert_eq!(cache.get(&ContentKey::from_url("http://x/a.jpg")), Some(media(1)));
    }

    #[tokio::test]
    async fn test_concurrent_requests_upload_once() {
        let cache = Arc::new(UploadCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = ContentKey::from_url("http://x/shared.jpg");

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                let calls = calls.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_upload(&key, || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(media(i))
                        })
                        .await
                        .map(|(m, _)| m)
                })
            })
            .collect();

        let results: Vec<MediaRef> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_upload_is_not_cached() {
        let cache = UploadCache::new();
        let key = ContentKey::from_url("http://x/flaky.jpg");

        let err = cache
            .get_or_upload(&key, || async { Err(AssetError::UploadRejected("HTTP 500".into())) })
            .await;
        assert!(err.is_err());
        assert!(cache.is_empty());

        let (retry, status) = cache.get_or_upload(&key, || async { Ok(media(9)) }).await.unwrap();
        assert_eq!(retry, media(9));
        assert_eq!(status, CacheStatus::Uploaded);
    }
}
