use serde::{Deserialize, Serialize};

use super::policy::Policy;

/// User group; carries the download speed limit shared by its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    /// Bytes per second, 0 means unlimited.
    pub speed_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub group: Group,
    /// Default storage target for new uploads.
    pub policy: Policy,
}

impl User {
    pub fn speed_limit(&self) -> u64 {
        self.group.speed_limit
    }
}
