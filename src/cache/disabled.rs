use async_trait::async_trait;

use super::{Cache, CacheError, CacheResult};

/// Used when no backend is configured, nothing survives a restart.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

#[async_trait]
impl Cache for DisabledCache {
    async fn load(&self, _key: &str) -> CacheResult<Vec<u8>> {
        Err(CacheError::Disabled)
    }

    async fn save(&self, _key: &str, _value: &[u8]) -> CacheResult<()> {
        Err(CacheError::Disabled)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
