use async_trait::async_trait;

use crate::error::Result;
use crate::models::{File, Folder, NewFile, Policy, PolicyId, User};

/// Persistence of users, policies, folders and files.
///
/// `create_file` must be all-or-nothing: either the record exists afterwards
/// or the call returned an error.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    async fn get_policy(&self, id: PolicyId) -> Result<Option<Policy>>;
    async fn get_root_folder(&self, owner_id: i64) -> Result<Option<Folder>>;
    async fn get_child_folder(&self, parent_id: i64, name: &str) -> Result<Option<Folder>>;
    async fn get_file_in_folder(&self, folder_id: i64, name: &str) -> Result<Option<File>>;
    /// Files in the order of `ids`; unknown ids are skipped.
    async fn get_files_by_ids(&self, ids: &[i64]) -> Result<Vec<File>>;
    async fn create_folder(&self, owner_id: i64, parent_id: i64, name: &str) -> Result<Folder>;
    async fn create_file(&self, file: &NewFile) -> Result<File>;
    async fn delete_files(&self, ids: &[i64]) -> Result<u64>;
}
