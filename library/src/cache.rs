use std::path::Path;

use foyer::{
    BlockEngineBuilder, DeviceBuilder, FsDeviceBuilder, HybridCache, HybridCacheBuilder,
    HybridCachePolicy,
};

use crate::reading::ReadingResponse;

/// Hybrid memory+disk cache of reading-provider responses, keyed by the
/// submitted text. Responses are small, so the capacities stay modest.
pub struct ReadingsCache {
    cache: HybridCache<String, ReadingResponse>,
}

impl ReadingsCache {
    pub async fn create(cache_dir: &Path) -> anyhow::Result<Self> {
        let device = FsDeviceBuilder::new(cache_dir)
            .with_capacity(512 * 1024 * 1024)
            .build()?;
        let cache = HybridCacheBuilder::new()
            .with_policy(HybridCachePolicy::WriteOnInsertion)
            .memory(64 * 1024 * 1024)
            .storage()
            .with_engine_config(BlockEngineBuilder::new(device))
            .build()
            .await?;
        Ok(Self { cache })
    }

    pub fn set(&self, text: &str, response: &ReadingResponse) {
        self.cache.insert(text.to_owned(), response.clone());
    }

    pub async fn get(&self, text: &str) -> anyhow::Result<Option<ReadingResponse>> {
        Ok(self
            .cache
            .get(&text.to_owned())
            .await?
            .map(|r| r.value().clone()))
    }
}
