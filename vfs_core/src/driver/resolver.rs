use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::models::{Policy, PolicyId, PolicyType};
use super::{LocalDriver, RemoteDriver, StorageDriver, UnknownDriver};

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Base for `local` policies whose base path is relative.
    pub local_root: PathBuf,
    pub remote_timeout: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

impl From<&StorageConfig> for DriverOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            local_root: config.local_root.clone(),
            remote_timeout: Duration::from_secs(config.remote_timeout_seconds),
        }
    }
}

/// Maps policies to drivers. Resolution never fails: policies nothing can
/// serve get an [`UnknownDriver`]. Drivers are cached per policy id, so one
/// resolver must not outlive a change to a policy's configuration.
pub struct PolicyResolver {
    options: DriverOptions,
    cache: Mutex<HashMap<PolicyId, Arc<dyn StorageDriver>>>,
}

impl PolicyResolver {
    pub fn new(options: DriverOptions) -> Self {
        Self {
            options,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolve(&self, policy: &Policy) -> Arc<dyn StorageDriver> {
        if let Some(driver) = self.cache.lock().get(&policy.id) {
            return driver.clone();
        }

        let driver = Self::build(policy, &self.options);
        self.cache
            .lock()
            .entry(policy.id)
            .or_insert(driver)
            .clone()
    }

    /// Uncached resolution.
    pub fn build(policy: &Policy, options: &DriverOptions) -> Arc<dyn StorageDriver> {
        debug!(policy_id = policy.id, policy_type = %policy.policy_type, "Resolving storage driver");

        match &policy.policy_type {
            PolicyType::Local => {
                let base = Path::new(&policy.base_path);
                let root = if base.is_absolute() {
                    base.to_path_buf()
                } else {
                    options.local_root.join(base)
                };
                Arc::new(LocalDriver::new(root))
            }
            PolicyType::Remote => {
                let Some(server) = policy.server.as_deref() else {
                    warn!(policy_id = policy.id, "Remote policy has no server configured");
                    return Arc::new(UnknownDriver::with_reason(policy, "remote policy has no server"));
                };

                match RemoteDriver::new(server, &policy.base_path, policy.access_key.clone(), options.remote_timeout) {
                    Ok(driver) => Arc::new(driver),
                    Err(e) => {
                        warn!(policy_id = policy.id, "Remote policy is misconfigured: {}", e);
                        Arc::new(UnknownDriver::with_reason(policy, e.to_string()))
                    }
                }
            }
            PolicyType::Unknown(_) => Arc::new(UnknownDriver::new(policy)),
        }
    }
}

impl Default for PolicyResolver {
    fn default() -> Self {
        Self::new(DriverOptions::default())
    }
}
