use crate::config::{CONFIG, StorageConfig, StorageDriver};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::OnceCell;

pub mod local;
pub mod s3;
pub mod types;

use local::LocalStorage;
use s3::S3Storage;
pub use types::{StorageError, StorageResult};

#[async_trait]
pub trait Storage: Send + Sync {
    async fn put_object(&self, key: &str, data: Bytes, mimetype: Option<&str>)
    -> StorageResult<()>;
    async fn get_object(&self, key: &str) -> StorageResult<Bytes>;
    async fn delete_object(&self, key: &str) -> StorageResult<()>;
}

static STORAGE: OnceCell<Box<dyn Storage>> = OnceCell::const_new();

pub async fn get_storage() -> &'static Box<dyn Storage> {
    STORAGE
        .get_or_init(|| async { new_storage(&CONFIG.storage).await })
        .await
}

pub async fn new_storage(config: &StorageConfig) -> Box<dyn Storage> {
    match config.driver {
        StorageDriver::Local => Box::new(LocalStorage::new(&config.local.root)),
        StorageDriver::S3 => {
            if let Some(s3_config) = config.s3.as_ref() {
                Box::new(S3Storage::new(s3_config).await)
            } else {
                Box::new(LocalStorage::new(&config.local.root))
            }
        }
    }
}
