//! Storage drivers: one implementation of open/save/delete per policy type.
//!
//! Identifiers passed to a driver are backend-relative source names, never
//! virtual paths.

pub mod local;
pub mod remote;
pub mod resolver;
pub mod unknown;

use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

use crate::error::{AppError, Result};
use crate::models::PolicyType;

pub use local::LocalDriver;
pub use remote::RemoteDriver;
pub use resolver::{DriverOptions, PolicyResolver};
pub use unknown::UnknownDriver;

/// Owned byte stream handed to and from drivers. Dropping it releases the
/// underlying file descriptor or connection.
pub type ContentStream = Pin<Box<dyn AsyncRead + Send>>;

#[async_trait]
pub trait StorageDriver: Send + Sync {
    fn policy_type(&self) -> PolicyType;

    /// `false` only for the fallback driver of unrecognized policy types.
    fn is_supported(&self) -> bool {
        true
    }

    async fn open(&self, source: &str) -> Result<ContentStream>;

    /// Returns the number of bytes stored.
    async fn save(&self, stream: ContentStream, destination: &str) -> Result<u64>;

    /// Removing an object that does not exist is an error.
    async fn delete(&self, source: &str) -> Result<()>;
}

/// Split a source name into path segments. Leading, doubled and `.` segments
/// are dropped; `..` is refused so an object can never escape its policy root.
pub(crate) fn object_segments(source: &str) -> Result<Vec<&str>> {
    let mut segments = Vec::new();

    for segment in source.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(AppError::IoFailed(format!(
                    "Invalid object name {:?}: parent references are not allowed",
                    source
                )))
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(AppError::IoFailed(format!("Invalid object name {:?}", source)));
    }

    Ok(segments)
}
