use tracing::debug;

use crate::error::{AppError, Result};
use crate::metadata::MetadataStore;
use crate::models::{File, Folder};

/// Split a virtual path into folder names. Empty and `.` segments are
/// dropped and `..` removes the previous segment, stopping at the root.
pub fn normalize_path(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }

    segments
}

/// Looks up virtual paths inside one user's folder tree.
pub struct PathResolver<'a> {
    store: &'a dyn MetadataStore,
    owner_id: i64,
}

impl<'a> PathResolver<'a> {
    pub fn new(store: &'a dyn MetadataStore, owner_id: i64) -> Self {
        Self { store, owner_id }
    }

    pub async fn resolve_folder(&self, path: &str) -> Result<Folder> {
        self.walk(&normalize_path(path)).await
    }

    /// The file at `path` together with the folder that contains it.
    pub async fn resolve_file(&self, path: &str) -> Result<(File, Folder)> {
        let segments = normalize_path(path);
        let (name, parents) = segments.split_last().ok_or(AppError::ObjectNotExist)?;

        let folder = self.walk(parents).await?;
        let file = self
            .store
            .get_file_in_folder(folder.id, name)
            .await?
            .ok_or(AppError::ObjectNotExist)?;

        debug!(owner_id = self.owner_id, file_id = file.id, "Resolved {}", path);
        Ok((file, folder))
    }

    pub(crate) async fn walk(&self, segments: &[&str]) -> Result<Folder> {
        let mut folder = self
            .store
            .get_root_folder(self.owner_id)
            .await?
            .ok_or(AppError::ObjectNotExist)?;

        for name in segments {
            folder = self
                .store
                .get_child_folder(folder.id, name)
                .await?
                .ok_or(AppError::ObjectNotExist)?;
        }

        Ok(folder)
    }
}
