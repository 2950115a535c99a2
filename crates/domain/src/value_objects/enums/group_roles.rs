use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Membership role reported by the group control plane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GroupRole {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl GroupRole {
    pub fn from_str(value: &str) -> Option<GroupRole> {
        match value {
            "creator" => Some(GroupRole::Creator),
            "administrator" => Some(GroupRole::Administrator),
            "member" => Some(GroupRole::Member),
            "restricted" => Some(GroupRole::Restricted),
            "left" => Some(GroupRole::Left),
            "kicked" => Some(GroupRole::Kicked),
            _ => None,
        }
    }

    /// Group owners are exempt from eviction regardless of expiry.
    pub fn is_owner(&self) -> bool {
        matches!(self, GroupRole::Creator)
    }

    /// Whether the user currently holds membership that can be revoked.
    pub fn is_present(&self) -> bool {
        matches!(
            self,
            GroupRole::Creator | GroupRole::Administrator | GroupRole::Member | GroupRole::Restricted
        )
    }
}

impl Display for GroupRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match self {
            GroupRole::Creator => "creator",
            GroupRole::Administrator => "administrator",
            GroupRole::Member => "member",
            GroupRole::Restricted => "restricted",
            GroupRole::Left => "left",
            GroupRole::Kicked => "kicked",
        };
        write!(f, "{}", role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles() {
        assert_eq!(GroupRole::from_str("creator"), Some(GroupRole::Creator));
        assert_eq!(GroupRole::from_str("member"), Some(GroupRole::Member));
        assert_eq!(GroupRole::from_str("moderator"), None);
    }

    #[test]
    fn only_the_creator_is_exempt() {
        assert!(GroupRole::Creator.is_owner());
        assert!(!GroupRole::Administrator.is_owner());
        assert!(!GroupRole::Member.is_owner());
    }

    #[test]
    fn departed_roles_are_not_present() {
        assert!(GroupRole::Member.is_present());
        assert!(GroupRole::Restricted.is_present());
        assert!(!GroupRole::Left.is_present());
        assert!(!GroupRole::Kicked.is_present());
    }
}
