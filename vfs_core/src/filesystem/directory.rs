use tracing::info;

use crate::error::{AppError, Result};
use crate::models::Folder;
use super::path::normalize_path;
use super::validation::UploadValidator;
use super::FileSystem;

impl FileSystem {
    /// Create the last folder of `path`. Its parent must already exist.
    pub async fn create_directory(&self, path: &str) -> Result<Folder> {
        let segments = normalize_path(path);
        let (name, parents) = segments
            .split_last()
            .ok_or_else(|| AppError::ObjectExists("/".to_string()))?;

        UploadValidator::validate_name(name)?;

        let parent = self.paths().walk(parents).await?;

        if self.store.get_child_folder(parent.id, name).await?.is_some() {
            return Err(AppError::ObjectExists(format!("/{}", segments.join("/"))));
        }

        let folder = self.store.create_folder(self.user.id, parent.id, name).await?;

        info!(folder_id = folder.id, parent_id = parent.id, "Created directory {}", path);
        Ok(folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::test_support::Fixture;

    #[tokio::test]
    async fn test_create_nested_directories() {
        let fixture = Fixture::new(0).await;
        let fs = fixture.filesystem();

        let docs = fs.create_directory("/docs").await.unwrap();
        let drafts = fs.create_directory("/docs/drafts/").await.unwrap();

        assert_eq!(drafts.parent_id, Some(docs.id));
        assert_eq!(drafts.owner_id, fixture.user.id);
        assert_eq!(fs.paths().resolve_folder("docs/drafts").await.unwrap().id, drafts.id);
    }

    #[tokio::test]
    async fn test_create_directory_conflicts() {
        let fixture = Fixture::new(0).await;
        let fs = fixture.filesystem();

        fs.create_directory("/docs").await.unwrap();

        assert!(matches!(fs.create_directory("/docs").await, Err(AppError::ObjectExists(_))));
        assert!(matches!(fs.create_directory("/").await, Err(AppError::ObjectExists(_))));
        assert!(matches!(fs.create_directory("/a/b").await, Err(AppError::ObjectNotExist)));
        assert!(matches!(fs.create_directory("/bad\\name").await, Err(AppError::ValidationFailed(_))));
    }
}
