use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub mod s3;

pub use s3::StorageService;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn unavailable(msg: impl std::fmt::Display) -> Self {
        Self::Unavailable(msg.to_string())
    }
}

/// Object storage addressed by opaque ids.
///
/// Implementations must tell a missing object ([`StorageError::NotFound`])
/// apart from an unreachable store ([`StorageError::Unavailable`]).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Streams object `id` into the file at `dest`, returning the byte count.
    async fn download(&self, id: &str, dest: &Path) -> StorageResult<u64>;

    /// Streams the file at `src` into a new object and returns its id.
    async fn upload(&self, name: &str, src: &Path) -> StorageResult<String>;

    async fn delete(&self, id: &str) -> StorageResult<()>;
}
