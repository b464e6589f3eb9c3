use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{Cache, CacheError, CacheResult};

/// Stores every key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Create the cache, the folder is created if it doesn't exist yet.
    pub async fn open(dir: impl AsRef<Path>) -> CacheResult<FileCache> {
        let dir = dir.as_ref().to_path_buf();
        match tokio::fs::metadata(&dir).await {
            Ok(metadata) if !metadata.is_dir() => {
                return Err(CacheError::Io(std::io::Error::new(
                    ErrorKind::Other,
                    format!("{} is not a folder", dir.to_string_lossy()),
                )));
            }
            Ok(_) => {}
            Err(_) => {
                tokio::fs::create_dir_all(&dir).await?;
                log::info!("created cache folder {}", dir.to_string_lossy());
            }
        }
        Ok(FileCache { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        // keys are constants of this crate but never allow leaving the folder
        let file_name = key.replace(['/', '\\'], "_");
        self.dir.join(format!("{}.json", file_name))
    }
}

#[async_trait]
impl Cache for FileCache {
    async fn load(&self, key: &str) -> CacheResult<Vec<u8>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(CacheError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");

        // atomic replace
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
