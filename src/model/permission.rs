use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Fine-grained permissions carried in the session claims. Independent of
/// role: a manager without the matching permission is still denied.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    AcceptRejectRequests,
    DeleteRequests,
    AssignRequests,
    EditRequests,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet(HashSet<Permission>);

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self(HashSet::from([
            Permission::AcceptRejectRequests,
            Permission::DeleteRequests,
            Permission::AssignRequests,
            Permission::EditRequests,
        ]))
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn grant(mut self, permission: Permission) -> Self {
        self.0.insert(permission);
        self
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
