//! Request-scoped filesystem bound to one user.

pub mod content;
pub mod delete;
pub mod directory;
pub mod path;
pub mod upload;
pub mod validation;

use std::sync::Arc;
use tracing::warn;

use crate::config::{AppConfig, TransferConfig};
use crate::driver::{DriverOptions, PolicyResolver, StorageDriver};
use crate::error::{AppError, Result};
use crate::metadata::MetadataStore;
use crate::models::{PolicyId, User};

pub use delete::{group_files_by_policy, FailureReport, PolicyGroups};
pub use path::{normalize_path, PathResolver};
pub use upload::{FileStream, UploadContext};
pub use validation::{UploadValidator, ValidationError};

/// Orchestrates uploads, reads and deletes for the acting user. Build one per
/// request: the driver cache lives as long as the instance.
pub struct FileSystem {
    user: User,
    store: Arc<dyn MetadataStore>,
    resolver: PolicyResolver,
    max_concurrent_deletes: usize,
}

impl FileSystem {
    pub fn new(user: User, store: Arc<dyn MetadataStore>, options: DriverOptions) -> Self {
        Self {
            user,
            store,
            resolver: PolicyResolver::new(options),
            max_concurrent_deletes: TransferConfig::default().max_concurrent_deletes,
        }
    }

    pub fn from_config(user: User, store: Arc<dyn MetadataStore>, config: &AppConfig) -> Self {
        Self::new(user, store, DriverOptions::from(&config.storage))
            .with_max_concurrent_deletes(config.transfer.max_concurrent_deletes)
    }

    /// Load the user from the store and bind a filesystem to it.
    pub async fn for_user(store: Arc<dyn MetadataStore>, user_id: i64, options: DriverOptions) -> Result<Self> {
        let user = store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

        Ok(Self::new(user, store, options))
    }

    pub fn with_max_concurrent_deletes(mut self, limit: usize) -> Self {
        self.max_concurrent_deletes = limit.max(1);
        self
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn paths(&self) -> PathResolver<'_> {
        PathResolver::new(self.store.as_ref(), self.user.id)
    }

    /// Driver for a stored policy id. A policy row that no longer exists is
    /// reported the same way as a policy type without a driver.
    pub(crate) async fn driver_for(&self, policy_id: PolicyId) -> Result<Arc<dyn StorageDriver>> {
        if policy_id == self.user.policy.id {
            return Ok(self.resolver.resolve(&self.user.policy));
        }

        match self.store.get_policy(policy_id).await? {
            Some(policy) => Ok(self.resolver.resolve(&policy)),
            None => {
                warn!(policy_id, "Policy record is missing");
                Err(AppError::UnsupportedPolicy(format!("policy {} does not exist", policy_id)))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    use super::FileSystem;
    use crate::config::DatabaseConfig;
    use crate::driver::DriverOptions;
    use crate::metadata::{MetadataStore, SqliteMetadataStore};
    use crate::models::{Folder, NewPolicy, User};

    pub struct Fixture {
        pub store: Arc<SqliteMetadataStore>,
        pub user: User,
        pub storage: PathBuf,
        _dir: TempDir,
    }

    impl Fixture {
        pub async fn new(speed_limit: u64) -> Self {
            Self::with_policy(speed_limit, |base| NewPolicy::local("disk", base)).await
        }

        pub async fn with_policy(speed_limit: u64, policy: impl FnOnce(String) -> NewPolicy) -> Self {
            let dir = TempDir::new().unwrap();
            let config = DatabaseConfig {
                url: format!("sqlite:{}", dir.path().join("vfs.db").display()),
                ..DatabaseConfig::default()
            };
            let store = SqliteMetadataStore::connect(&config).await.unwrap();

            let storage = dir.path().join("storage");
            let group = store.create_group("members", speed_limit).await.unwrap();
            let policy = store
                .create_policy(&policy(storage.display().to_string()))
                .await
                .unwrap();
            let user = store.create_user("alice", group.id, policy.id).await.unwrap();

            Self {
                store: Arc::new(store),
                user,
                storage,
                _dir: dir,
            }
        }

        pub fn filesystem(&self) -> FileSystem {
            FileSystem::new(self.user.clone(), self.store.clone(), DriverOptions::default())
        }

        pub async fn root(&self) -> Folder {
            self.store.get_root_folder(self.user.id).await.unwrap().unwrap()
        }
    }
}
