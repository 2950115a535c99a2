use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::entities::{
    members::{MemberEntity, UpsertMemberEntity},
    payments::NewPaymentEntity,
};

/// Outcome of reconciling a confirmed payment against storage.
#[derive(Debug, Clone)]
pub enum PaymentApplication {
    /// The payment was recorded and the member row upserted; `member` is the
    /// row as committed.
    Applied { member: MemberEntity },
    /// The provider payment id was seen before; nothing was changed.
    AlreadyProcessed,
}

#[automock]
#[async_trait]
pub trait MemberRepository {
    async fn find_by_tg_user_id(&self, tg_user_id: i64) -> Result<Option<MemberEntity>>;

    /// Records the payment and upserts the member row in a single
    /// transaction. The unique `provider_payment_id` guards replays: a
    /// duplicate confirmation returns `AlreadyProcessed` and leaves the
    /// member untouched. The member upsert never moves an existing expiry
    /// backward.
    async fn apply_confirmed_payment(
        &self,
        payment: NewPaymentEntity,
        member: UpsertMemberEntity,
    ) -> Result<PaymentApplication>;

    /// Keyset page over members that have subscribed at least once, ordered
    /// by `tg_user_id`. Pass the last id of the previous page to continue.
    async fn list_subscribed_page(
        &self,
        after_tg_user_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<MemberEntity>>;
}
