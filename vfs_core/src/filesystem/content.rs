use tracing::debug;

use crate::driver::ContentStream;
use crate::error::Result;
use crate::models::File;
use crate::throttle::ThrottledReader;
use super::FileSystem;

impl FileSystem {
    /// Open the file at a virtual path for reading.
    pub async fn get_content(&self, path: &str) -> Result<ContentStream> {
        let (file, _) = self.paths().resolve_file(path).await?;
        self.open_file(&file).await
    }

    /// Like [`get_content`](Self::get_content), paced to the speed limit of
    /// the user's group.
    pub async fn get_download_content(&self, path: &str) -> Result<ContentStream> {
        let stream = self.get_content(path).await?;
        let limit = self.user.speed_limit();

        if limit == 0 {
            return Ok(stream);
        }

        debug!(user_id = self.user.id, limit, "Throttling download of {}", path);
        Ok(Box::pin(ThrottledReader::new(stream, limit)))
    }

    pub async fn open_file(&self, file: &File) -> Result<ContentStream> {
        let driver = self.driver_for(file.policy_id).await?;
        driver.open(&file.source_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::filesystem::test_support::Fixture;
    use crate::filesystem::{FileStream, UploadContext};
    use crate::metadata::MetadataStore;
    use crate::models::{NewFile, NewPolicy};
    use std::time::{Duration, Instant};
    use tokio::io::AsyncReadExt;

    async fn upload(fixture: &Fixture, name: &str, data: &[u8]) -> File {
        let root = fixture.root().await;
        let context = UploadContext::new()
            .with_stream(FileStream::from_bytes(name, data.to_vec()))
            .with_save_path(format!("{}/{}", fixture.user.id, name));

        fixture.filesystem().add_file(&root, context).await.unwrap()
    }

    async fn read_all(mut stream: ContentStream) -> Vec<u8> {
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_get_content() {
        let fixture = Fixture::new(0).await;
        upload(&fixture, "a.txt", b"content").await;

        let stream = fixture.filesystem().get_content("/a.txt").await.unwrap();
        assert_eq!(read_all(stream).await, b"content");
    }

    #[tokio::test]
    async fn test_get_content_missing_path() {
        let fixture = Fixture::new(0).await;
        let result = fixture.filesystem().get_content("/none.txt").await;
        assert!(matches!(result, Err(AppError::ObjectNotExist)));
    }

    #[tokio::test]
    async fn test_get_content_missing_object() {
        let fixture = Fixture::new(0).await;
        let file = upload(&fixture, "gone.txt", b"bye").await;
        tokio::fs::remove_file(fixture.storage.join(&file.source_name)).await.unwrap();

        let result = fixture.filesystem().get_content("/gone.txt").await;
        assert!(matches!(result, Err(AppError::IoFailed(_))));
    }

    #[tokio::test]
    async fn test_get_content_unsupported_policy() {
        let fixture = Fixture::new(0).await;
        let policy = fixture
            .store
            .create_policy(&NewPolicy::local("odd", "odd").with_type("ftp"))
            .await
            .unwrap();
        let root = fixture.root().await;
        fixture
            .store
            .create_file(&NewFile {
                name: "odd.txt".to_string(),
                source_name: "odd.txt".to_string(),
                size: 0,
                folder_id: root.id,
                owner_id: fixture.user.id,
                policy_id: policy.id,
            })
            .await
            .unwrap();

        let result = fixture.filesystem().get_content("/odd.txt").await;
        assert!(matches!(result, Err(AppError::UnsupportedPolicy(_))));
    }

    #[tokio::test]
    async fn test_download_without_limit() {
        let fixture = Fixture::new(0).await;
        let data = vec![3u8; 256 * 1024];
        upload(&fixture, "big.bin", &data).await;

        let start = Instant::now();
        let stream = fixture.filesystem().get_download_content("/big.bin").await.unwrap();
        assert_eq!(read_all(stream).await, data);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_download_with_limit() {
        let fixture = Fixture::new(1000).await;
        let data = vec![5u8; 2500];
        upload(&fixture, "slow.bin", &data).await;

        let start = Instant::now();
        let stream = fixture.filesystem().get_download_content("/slow.bin").await.unwrap();
        assert_eq!(read_all(stream).await, data);

        // One second of burst, then 1500 bytes at 1000 B/s.
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
