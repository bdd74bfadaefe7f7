use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::policy::PolicyId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub owner_id: i64,
}

impl Folder {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A logical file. `source_name` is only meaningful to the driver of `policy_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: i64,
    pub name: String,
    pub source_name: String,
    pub size: u64,
    pub folder_id: i64,
    pub owner_id: i64,
    pub policy_id: PolicyId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub source_name: String,
    pub size: u64,
    pub folder_id: i64,
    pub owner_id: i64,
    pub policy_id: PolicyId,
}
