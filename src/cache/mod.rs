//! Key/value storage used to keep state across restarts.
//!
//! Every backend stores opaque bytes under a string key. A save always
//! replaces the whole value, there are no partial writes.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

mod disabled;
pub use disabled::DisabledCache;

mod file;
pub use file::FileCache;

mod memory;
pub use memory::MemoryCache;

mod sqlite;
pub use sqlite::SqliteCache;

/// Key of the most recent log list.
pub const LOGS_KEY: &str = "nuki-smartlock-logs";
/// Key of the pending reservation modifications.
pub const PENDING_MODIFICATIONS_KEY: &str = "reservation-pending-modification";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("key `{0}` not found")]
    NotFound(String),
    #[error("cache backend unreachable: {0}")]
    Unreachable(String),
    #[error("no cache backend configured")]
    Disabled,
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("couldn't (de)serialize cached value: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),
}
pub type CacheResult<T> = std::result::Result<T, CacheError>;

impl CacheError {
    /// Errors that mean "nothing stored (yet)" rather than something being broken.
    pub fn is_empty_result(&self) -> bool {
        matches!(
            self,
            CacheError::NotFound(_) | CacheError::Unreachable(_) | CacheError::Disabled
        )
    }
}

#[async_trait]
pub trait Cache: Send + Sync {
    /// Load the value stored under `key`, [`CacheError::NotFound`] if there is none.
    async fn load(&self, key: &str) -> CacheResult<Vec<u8>>;
    /// Replace the value stored under `key`.
    async fn save(&self, key: &str, value: &[u8]) -> CacheResult<()>;
    /// Name used in log messages
    fn name(&self) -> &'static str;
}

/// Load and decode a json value.
///
/// Missing values and unreachable backends are reported as `Ok(None)`.
pub async fn load_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> CacheResult<Option<T>> {
    match cache.load(key).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.is_empty_result() => {
            log::debug!("nothing loaded for `{}` from {} cache: {}", key, cache.name(), err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

pub async fn save_json<T: Serialize + ?Sized>(cache: &dyn Cache, key: &str, value: &T) -> CacheResult<()> {
    let bytes = serde_json::to_vec(value)?;
    cache.save(key, &bytes).await
}
