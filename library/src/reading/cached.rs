use std::sync::Arc;

use log::trace;

use crate::cache::ReadingsCache;
use crate::reading::{ReadingProvider, ReadingResponse};

/// Wraps a provider with the hybrid readings cache, keyed by submitted text.
pub struct CachedReadingProvider<P> {
    inner: P,
    cache: Arc<ReadingsCache>,
}

impl<P> CachedReadingProvider<P> {
    pub fn new(inner: P, cache: Arc<ReadingsCache>) -> Self {
        Self { inner, cache }
    }
}

impl<P: ReadingProvider + Sync> ReadingProvider for CachedReadingProvider<P> {
    async fn get_readings(&self, text: &str) -> anyhow::Result<ReadingResponse> {
        if let Some(cached) = self.cache.get(text).await? {
            trace!("Readings cache hit");
            return Ok(cached);
        }

        let response = self.inner.get_readings(text).await?;
        self.cache.set(text, &response);
        Ok(response)
    }
}
