use std::fmt;
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::driver::ContentStream;
use crate::error::{AppError, Result};
use crate::models::{File, Folder, NewFile};
use super::validation::UploadValidator;
use super::FileSystem;

/// An upload in flight: the caller's byte source plus its declared name and size.
pub struct FileStream {
    pub name: String,
    pub size: u64,
    pub reader: ContentStream,
}

impl FileStream {
    pub fn new(name: impl Into<String>, size: u64, reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            name: name.into(),
            size,
            reader: Box::pin(reader),
        }
    }

    pub fn from_bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self::new(name, size, Cursor::new(data))
    }
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Everything `add_file` needs besides the destination folder.
#[derive(Debug, Default)]
pub struct UploadContext {
    pub stream: Option<FileStream>,
    /// Backend-relative name the object is stored under.
    pub save_path: Option<String>,
}

impl UploadContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, stream: FileStream) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_save_path(mut self, save_path: impl Into<String>) -> Self {
        self.save_path = Some(save_path.into());
        self
    }

    /// Unique object name under the user's prefix, `{user_id}/{uuid}_{name}`.
    pub fn generate_save_path(user_id: i64, name: &str) -> String {
        format!("{}/{}_{}", user_id, Uuid::new_v4(), name)
    }

    pub fn into_parts(self) -> Result<(FileStream, String)> {
        let stream = self
            .stream
            .ok_or_else(|| AppError::ContextInvalid("missing file stream".to_string()))?;

        let save_path = self
            .save_path
            .filter(|path| !path.trim().is_empty())
            .ok_or_else(|| AppError::ContextInvalid("missing save path".to_string()))?;

        Ok((stream, save_path))
    }
}

impl FileSystem {
    /// Store the upload with the user's policy and record it in `folder`.
    ///
    /// The policy size limit applies to the bytes actually received, not only
    /// to the declared size; an oversized object is removed again.
    ///
    /// If the record cannot be written after the object was stored, the
    /// object stays behind and the error is returned.
    pub async fn add_file(&self, folder: &Folder, context: UploadContext) -> Result<File> {
        let (stream, save_path) = context.into_parts()?;
        let policy = &self.user.policy;

        let validator = UploadValidator::for_policy(policy);
        validator.validate(&stream.name, stream.size)?;

        if self.store.get_file_in_folder(folder.id, &stream.name).await?.is_some() {
            return Err(AppError::ObjectExists(stream.name));
        }

        // One byte past the limit is enough to tell an oversized upload apart.
        let reader: ContentStream = match validator.max_size() {
            Some(max_size) => Box::pin(stream.reader.take(max_size.saturating_add(1))),
            None => stream.reader,
        };

        let driver = self.resolver.resolve(policy);
        let size = driver.save(reader, &save_path).await?;

        if let Err(e) = validator.validate_size(size) {
            if let Err(cleanup) = driver.delete(&save_path).await {
                warn!(policy_id = policy.id, source_name = %save_path, "Failed to remove oversized upload: {}", cleanup);
            }
            return Err(e.into());
        }

        let record = NewFile {
            name: stream.name,
            source_name: save_path,
            size,
            folder_id: folder.id,
            owner_id: self.user.id,
            policy_id: policy.id,
        };

        let file = match self.store.create_file(&record).await {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    policy_id = policy.id,
                    source_name = %record.source_name,
                    "Stored object has no file record: {}", e
                );
                return Err(e);
            }
        };

        info!(file_id = file.id, folder_id = folder.id, size, "Added file {}", file.name);
        Ok(file)
    }
}
