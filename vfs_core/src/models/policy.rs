use std::fmt;

use serde::{Deserialize, Serialize};

pub type PolicyId = i64;

/// Backend kind of a storage policy. Values that no driver understands are kept
/// verbatim in `Unknown` so the record round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PolicyType {
    Local,
    Remote,
    Unknown(String),
}

impl PolicyType {
    pub fn as_str(&self) -> &str {
        match self {
            PolicyType::Local => "local",
            PolicyType::Remote => "remote",
            PolicyType::Unknown(other) => other,
        }
    }
}

impl From<&str> for PolicyType {
    fn from(value: &str) -> Self {
        match value {
            "local" => PolicyType::Local,
            "remote" => PolicyType::Remote,
            other => PolicyType::Unknown(other.to_string()),
        }
    }
}

impl From<String> for PolicyType {
    fn from(value: String) -> Self {
        PolicyType::from(value.as_str())
    }
}

impl From<PolicyType> for String {
    fn from(value: PolicyType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub name: String,
    pub policy_type: PolicyType,
    /// Root directory for `local`, key prefix for `remote`.
    pub base_path: String,
    pub server: Option<String>,
    pub access_key: Option<String>,
    /// Upload size cap in bytes, 0 means unlimited.
    pub max_size: u64,
    /// Lowercase extensions without the dot; empty allows everything.
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewPolicy {
    pub name: String,
    pub policy_type: PolicyType,
    pub base_path: String,
    pub server: Option<String>,
    pub access_key: Option<String>,
    pub max_size: u64,
    pub allowed_extensions: Vec<String>,
}

impl NewPolicy {
    pub fn local(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy_type: PolicyType::Local,
            base_path: base_path.into(),
            server: None,
            access_key: None,
            max_size: 0,
            allowed_extensions: Vec::new(),
        }
    }

    pub fn remote(name: impl Into<String>, server: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy_type: PolicyType::Remote,
            base_path: base_path.into(),
            server: Some(server.into()),
            access_key: None,
            max_size: 0,
            allowed_extensions: Vec::new(),
        }
    }

    pub fn with_type(mut self, policy_type: impl Into<PolicyType>) -> Self {
        self.policy_type = policy_type.into();
        self
    }

    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_allowed_extensions(mut self, extensions: &[&str]) -> Self {
        self.allowed_extensions = extensions.iter().map(|ext| ext.to_lowercase()).collect();
        self
    }

    pub fn into_policy(self, id: PolicyId) -> Policy {
        Policy {
            id,
            name: self.name,
            policy_type: self.policy_type,
            base_path: self.base_path,
            server: self.server,
            access_key: self.access_key,
            max_size: self.max_size,
            allowed_extensions: self.allowed_extensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_type_parsing() {
        assert_eq!(PolicyType::from("local"), PolicyType::Local);
        assert_eq!(PolicyType::from("remote"), PolicyType::Remote);
        assert_eq!(PolicyType::from("qiniu"), PolicyType::Unknown("qiniu".to_string()));
        assert_eq!(PolicyType::from("qiniu").to_string(), "qiniu");
    }

    #[test]
    fn test_policy_type_serde() {
        let json = serde_json::to_string(&PolicyType::Remote).unwrap();
        assert_eq!(json, "\"remote\"");

        let parsed: PolicyType = serde_json::from_str("\"oss\"").unwrap();
        assert_eq!(parsed, PolicyType::Unknown("oss".to_string()));
    }

    #[test]
    fn test_new_policy_builder() {
        let policy = NewPolicy::local("disk", "uploads")
            .with_max_size(1024)
            .with_allowed_extensions(&["TXT", "png"])
            .into_policy(7);

        assert_eq!(policy.id, 7);
        assert_eq!(policy.policy_type, PolicyType::Local);
        assert_eq!(policy.allowed_extensions, vec!["txt", "png"]);
    }
}
