//! Buffer cache and loader.
//!
//! `fetch_buffer` never fails: any transport or decode problem is logged and
//! reported as `None`, and every caller is expected to have a synthesized
//! fallback. Decoded buffers are cached for the loader's lifetime; failures are
//! not, so a later request for the same URL tries again.

use super::buffer::AudioBuffer;
use super::decode::{extension_of, AudioDecoder};
use super::fetch::AssetFetcher;
use crate::error::LoadError;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;

/// Outcome shared by everyone awaiting the same URL
type PendingLoad = Arc<OnceCell<Option<AudioBuffer>>>;

#[derive(Default)]
struct LoaderState {
    cache: HashMap<String, AudioBuffer>,
    pending: HashMap<String, PendingLoad>,
}

pub struct BufferLoader {
    fetcher: Arc<dyn AssetFetcher>,
    decoder: Arc<dyn AudioDecoder>,
    state: Mutex<LoaderState>,
}

impl BufferLoader {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, decoder: Arc<dyn AudioDecoder>) -> Self {
        Self {
            fetcher,
            decoder,
            state: Mutex::new(LoaderState::default()),
        }
    }

    /// Fetch and decode `url`, sharing one request between concurrent callers.
    pub async fn fetch_buffer(&self, url: &str) -> Option<AudioBuffer> {
        let pending = {
            let mut state = self.lock_state();

            // Pending first, then cache: a load that is settling right now is
            // still the one to join.
            if let Some(pending) = state.pending.get(url) {
                Arc::clone(pending)
            } else if let Some(buffer) = state.cache.get(url) {
                return Some(buffer.clone());
            } else {
                let pending: PendingLoad = Arc::new(OnceCell::new());
                state.pending.insert(url.to_string(), Arc::clone(&pending));
                pending
            }
        };

        pending
            .get_or_init(|| self.settle(url, &pending))
            .await
            .clone()
    }

    /// Warm the cache without waiting. Failures only show up in the log.
    pub fn preload<I>(self: &Arc<Self>, urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        for url in urls {
            if self.is_cached(&url) || self.is_pending(&url) {
                continue;
            }
            debug!("Preloading {}", url);
            let loader = Arc::clone(self);
            tokio::spawn(async move {
                loader.fetch_buffer(&url).await;
            });
        }
    }

    pub fn is_cached(&self, url: &str) -> bool {
        self.lock_state().cache.contains_key(url)
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.lock_state().pending.contains_key(url)
    }

    pub fn cache_len(&self) -> usize {
        self.lock_state().cache.len()
    }

    /// Run the actual load once, then publish the result: cache on success,
    /// and drop the pending entry either way.
    async fn settle(&self, url: &str, pending: &PendingLoad) -> Option<AudioBuffer> {
        let result = match self.load(url).await {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                warn!("Failed to load {}: {}", url, e);
                None
            }
        };

        let mut state = self.lock_state();
        if let Some(buffer) = &result {
            state.cache.insert(url.to_string(), buffer.clone());
        }
        if state
            .pending
            .get(url)
            .is_some_and(|current| Arc::ptr_eq(current, pending))
        {
            state.pending.remove(url);
        }

        result
    }

    async fn load(&self, url: &str) -> Result<AudioBuffer, LoadError> {
        let bytes = self.fetcher.fetch(url).await?;

        let decoder = Arc::clone(&self.decoder);
        let extension = extension_of(url).map(str::to_string);
        let decode_error = |reason: String| LoadError::Decode {
            url: url.to_string(),
            reason,
        };

        let buffer = tokio::task::spawn_blocking(move || decoder.decode(bytes, extension.as_deref()))
            .await
            .map_err(|e| decode_error(e.to_string()))?
            .map_err(decode_error)?;

        debug!(
            "Loaded {} ({} ch, {} Hz, {:.2}s)",
            url,
            buffer.channels(),
            buffer.sample_rate(),
            buffer.duration().as_secs_f32()
        );
        Ok(buffer)
    }

    fn lock_state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
