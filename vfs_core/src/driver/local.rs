use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::PolicyType;
use super::{object_segments, ContentStream, StorageDriver};

/// Objects stored as plain files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalDriver {
    root: PathBuf,
}

impl LocalDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, source: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        path.extend(object_segments(source)?);
        Ok(path)
    }
}

#[async_trait]
impl StorageDriver for LocalDriver {
    fn policy_type(&self) -> PolicyType {
        PolicyType::Local
    }

    async fn open(&self, source: &str) -> Result<ContentStream> {
        let path = self.object_path(source)?;

        let file = async_fs::File::open(&path)
            .await
            .map_err(|e| io_failed("open", &path, e))?;

        let metadata = file
            .metadata()
            .await
            .map_err(|e| io_failed("inspect", &path, e))?;
        if !metadata.is_file() {
            return Err(AppError::IoFailed(format!("{} is not a regular file", path.display())));
        }

        debug!("Opened local object {}", path.display());
        Ok(Box::pin(file))
    }

    async fn save(&self, mut stream: ContentStream, destination: &str) -> Result<u64> {
        let path = self.object_path(destination)?;

        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| io_failed("create directory for", &path, e))?;
        }

        let mut file = async_fs::File::create(&path)
            .await
            .map_err(|e| io_failed("create", &path, e))?;
        let written = tokio::io::copy(&mut stream, &mut file)
            .await
            .map_err(|e| io_failed("write", &path, e))?;
        file.sync_all()
            .await
            .map_err(|e| io_failed("sync", &path, e))?;

        debug!("Stored {} bytes at {}", written, path.display());
        Ok(written)
    }

    async fn delete(&self, source: &str) -> Result<()> {
        let path = self.object_path(source)?;

        async_fs::remove_file(&path)
            .await
            .map_err(|e| io_failed("delete", &path, e))?;

        debug!("Deleted local object {}", path.display());
        Ok(())
    }
}

fn io_failed(action: &str, path: &Path, err: io::Error) -> AppError {
    AppError::IoFailed(format!("Failed to {} {}: {}", action, path.display(), err))
}
