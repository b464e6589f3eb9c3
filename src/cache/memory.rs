use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Cache, CacheError, CacheResult};

/// Process local cache, handy for tests and one-shot commands.
#[derive(Debug, Default)]
pub struct MemoryCache {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> MemoryCache {
        MemoryCache::default()
    }

    pub fn insert_raw(&self, key: &str, value: Vec<u8>) {
        self.values.lock().insert(key.to_string(), value);
    }

    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.values.lock().get(key).cloned()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn load(&self, key: &str) -> CacheResult<Vec<u8>> {
        self.get_raw(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    async fn save(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        self.insert_raw(key, value.to_vec());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
