use futures_util::stream::{self, StreamExt};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{File, PolicyId};
use super::FileSystem;

/// Files partitioned by policy. Keys keep first-seen order and each group
/// keeps the input order of its files.
pub type PolicyGroups<'a> = IndexMap<PolicyId, Vec<&'a File>>;

/// Source names that could not be deleted, per policy. Policies without a
/// failure are absent.
pub type FailureReport = IndexMap<PolicyId, Vec<String>>;

pub fn group_files_by_policy(files: &[File]) -> PolicyGroups<'_> {
    let mut groups = PolicyGroups::new();

    for file in files {
        groups.entry(file.policy_id).or_default().push(file);
    }

    groups
}

impl FileSystem {
    /// Delete the physical objects of every group. Each object is attempted
    /// regardless of earlier failures; metadata is left untouched.
    pub async fn delete_grouped_files(&self, groups: &PolicyGroups<'_>) -> FailureReport {
        let results: Vec<(PolicyId, Vec<String>)> = stream::iter(groups)
            .map(|(policy_id, files)| self.delete_policy_group(*policy_id, files))
            .buffered(self.max_concurrent_deletes)
            .collect()
            .await;

        results
            .into_iter()
            .filter(|(_, failed)| !failed.is_empty())
            .collect()
    }

    async fn delete_policy_group(&self, policy_id: PolicyId, files: &[&File]) -> (PolicyId, Vec<String>) {
        let all_failed = || -> Vec<String> { files.iter().map(|file| file.source_name.clone()).collect() };

        let driver = match self.driver_for(policy_id).await {
            Ok(driver) if driver.is_supported() => driver,
            Ok(_) => {
                warn!(policy_id, count = files.len(), "No driver for policy, skipping its files");
                return (policy_id, all_failed());
            }
            Err(e) => {
                warn!(policy_id, count = files.len(), "Cannot load policy: {}", e);
                return (policy_id, all_failed());
            }
        };

        let mut failed = Vec::new();
        for file in files {
            if let Err(e) = driver.delete(&file.source_name).await {
                warn!(policy_id, source_name = %file.source_name, "Delete failed: {}", e);
                failed.push(file.source_name.clone());
            }
        }

        info!(
            policy_id,
            deleted = files.len() - failed.len(),
            failed = failed.len(),
            "Processed policy group"
        );

        (policy_id, failed)
    }

    /// Delete objects, then drop the records of the files whose object is gone.
    pub async fn delete_files(&self, files: &[File]) -> Result<FailureReport> {
        let groups = group_files_by_policy(files);
        let report = self.delete_grouped_files(&groups).await;

        let failed: HashSet<(PolicyId, &str)> = report
            .iter()
            .flat_map(|(policy_id, names)| names.iter().map(move |name| (*policy_id, name.as_str())))
            .collect();

        let deleted: Vec<i64> = files
            .iter()
            .filter(|file| !failed.contains(&(file.policy_id, file.source_name.as_str())))
            .map(|file| file.id)
            .collect();

        if !deleted.is_empty() {
            self.store.delete_files(&deleted).await?;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::filesystem::test_support::Fixture;
    use crate::filesystem::{FileStream, UploadContext};
    use crate::metadata::MetadataStore;
    use crate::models::NewPolicy;

    fn file(id: i64, policy_id: PolicyId) -> File {
        File {
            id,
            name: format!("f{}", id),
            source_name: format!("src/f{}", id),
            size: 0,
            folder_id: 1,
            owner_id: 1,
            policy_id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_grouping_keeps_order() {
        let files: Vec<File> = [1, 2, 3, 2, 1]
            .iter()
            .enumerate()
            .map(|(i, policy_id)| file(i as i64, *policy_id))
            .collect();

        let groups = group_files_by_policy(&files);

        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        let ids = |policy_id: PolicyId| groups[&policy_id].iter().map(|f| f.id).collect::<Vec<_>>();
        assert_eq!(ids(1), vec![0, 4]);
        assert_eq!(ids(2), vec![1, 3]);
        assert_eq!(ids(3), vec![2]);
        assert_eq!(groups.values().map(Vec::len).sum::<usize>(), files.len());
    }

    #[test]
    fn test_grouping_empty_input() {
        assert!(group_files_by_policy(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_delete_reports_missing_objects() {
        let fixture = Fixture::new(0).await;
        let fs = fixture.filesystem();
        let root = fixture.root().await;

        let mut files = Vec::new();
        for name in ["keep.txt", "gone.txt"] {
            let context = UploadContext::new()
                .with_stream(FileStream::from_bytes(name, "data"))
                .with_save_path(format!("1/{}", name));
            files.push(fs.add_file(&root, context).await.unwrap());
        }
        tokio::fs::remove_file(fixture.storage.join("1/gone.txt")).await.unwrap();

        let report = fs.delete_grouped_files(&group_files_by_policy(&files)).await;

        assert_eq!(report.len(), 1);
        assert_eq!(report[&fixture.user.policy.id], vec!["1/gone.txt".to_string()]);
        assert!(!fixture.storage.join("1/keep.txt").exists());
    }

    #[tokio::test]
    async fn test_unsupported_policy_fails_whole_group() {
        let fixture = Fixture::new(0).await;
        let unknown = fixture
            .store
            .create_policy(&NewPolicy::local("legacy", "legacy").with_type("cos"))
            .await
            .unwrap();

        let files = vec![file(1, unknown.id), file(2, unknown.id), file(3, 999)];
        let report = fixture.filesystem().delete_grouped_files(&group_files_by_policy(&files)).await;

        assert_eq!(report.keys().copied().collect::<Vec<_>>(), vec![unknown.id, 999]);
        assert_eq!(report[&unknown.id], vec!["src/f1", "src/f2"]);
        assert_eq!(report[&999], vec!["src/f3"]);
    }

    #[tokio::test]
    async fn test_delete_files_removes_records_of_deleted_objects() {
        let fixture = Fixture::new(0).await;
        let fs = fixture.filesystem().with_max_concurrent_deletes(1);
        let root = fixture.root().await;

        let mut files = Vec::new();
        for name in ["a.txt", "b.txt"] {
            let context = UploadContext::new()
                .with_stream(FileStream::from_bytes(name, "data"))
                .with_save_path(format!("1/{}", name));
            files.push(fs.add_file(&root, context).await.unwrap());
        }
        tokio::fs::remove_file(fixture.storage.join("1/b.txt")).await.unwrap();

        let report = fs.delete_files(&files).await.unwrap();
        assert_eq!(report[&fixture.user.policy.id], vec!["1/b.txt".to_string()]);

        let ids: Vec<i64> = files.iter().map(|f| f.id).collect();
        let remaining = fixture.store.get_files_by_ids(&ids).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "b.txt");
    }
}
