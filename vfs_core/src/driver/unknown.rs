use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Policy, PolicyId, PolicyType};
use super::{ContentStream, StorageDriver};

/// Stand-in for policies no driver can serve. Every operation fails with
/// `UnsupportedPolicy` and nothing is touched.
#[derive(Debug, Clone)]
pub struct UnknownDriver {
    policy_id: PolicyId,
    policy_type: PolicyType,
    reason: String,
}

impl UnknownDriver {
    pub fn new(policy: &Policy) -> Self {
        Self::with_reason(policy, format!("no driver for policy type {:?}", policy.policy_type.as_str()))
    }

    pub fn with_reason(policy: &Policy, reason: impl Into<String>) -> Self {
        Self {
            policy_id: policy.id,
            policy_type: policy.policy_type.clone(),
            reason: reason.into(),
        }
    }

    fn unsupported(&self) -> AppError {
        AppError::UnsupportedPolicy(format!("policy {}: {}", self.policy_id, self.reason))
    }
}

#[async_trait]
impl StorageDriver for UnknownDriver {
    fn policy_type(&self) -> PolicyType {
        self.policy_type.clone()
    }

    fn is_supported(&self) -> bool {
        false
    }

    async fn open(&self, _source: &str) -> Result<ContentStream> {
        Err(self.unsupported())
    }

    async fn save(&self, _stream: ContentStream, _destination: &str) -> Result<u64> {
        Err(self.unsupported())
    }

    async fn delete(&self, _source: &str) -> Result<()> {
        Err(self.unsupported())
    }
}
