use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::value_objects::enums::group_roles::GroupRole;

/// Control plane for the gated group: invites in, revocations out.
#[automock]
#[async_trait]
pub trait GroupAdmission {
    /// Creates a single-use, single-member invite link labeled for the user.
    async fn create_single_use_invite(&self, tg_user_id: i64, display_name: &str)
    -> Result<String>;

    /// Current role of the user in the gated group. Users the group has
    /// never seen report as `Left`.
    async fn membership_role(&self, tg_user_id: i64) -> Result<GroupRole>;

    /// Removes the user from the group. Does not touch stored subscription
    /// records; a lapsed user can pay again and rejoin with a fresh invite.
    async fn revoke_membership(&self, tg_user_id: i64) -> Result<()>;
}
