//! Sources of the signed authorization document.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::error::FetchError;

/// Metadata reported alongside fetched content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub name: String,
    /// Content hash as reported by the source
    pub sha: String,
    pub size: u64,
}

/// Raw signed document plus its metadata
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub content: Vec<u8>,
    pub meta: FileMeta,
}

/// Something that can produce the current signed document
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch(&self) -> Result<FetchedFile, FetchError>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Reads the signed document from a local file
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    async fn fetch(&self) -> Result<FetchedFile, FetchError> {
        debug!(path = %self.path.display(), "Reading authorization file");
        let content = tokio::fs::read(&self.path).await?;
        if content.is_empty() {
            return Err(FetchError::EmptyResponse);
        }

        let meta = FileMeta {
            name: self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            sha: hex::encode(Sha256::digest(&content)),
            size: content.len() as u64,
        };
        info!(
            name = %meta.name,
            sha = %meta.sha,
            size = meta.size,
            "Read authorization file"
        );
        Ok(FetchedFile { content, meta })
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
