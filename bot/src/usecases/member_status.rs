use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use domain::{
    repositories::members::MemberRepository, value_objects::entitlements::EntitlementState,
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct MemberStatusView {
    pub tg_user_id: i64,
    pub display_name: Option<String>,
    pub state: EntitlementState,
    pub expires_on: Option<NaiveDate>,
}

/// Resolves what a user is entitled to right now; the chat layer turns the
/// view into message text.
pub struct MemberStatusUseCase {
    member_repo: Arc<dyn MemberRepository + Send + Sync>,
}

impl MemberStatusUseCase {
    pub fn new(member_repo: Arc<dyn MemberRepository + Send + Sync>) -> Self {
        Self { member_repo }
    }

    pub async fn status_for(&self, tg_user_id: i64, today: NaiveDate) -> Result<MemberStatusView> {
        let member = self.member_repo.find_by_tg_user_id(tg_user_id).await?;

        let (display_name, expires_on) = match &member {
            Some(member) => (Some(member.display_name.clone()), member.sub_expires_on),
            None => (None, None),
        };

        let state = EntitlementState::classify(expires_on, today);
        debug!(tg_user_id, state = %state, "status: member state resolved");

        Ok(MemberStatusView {
            tg_user_id,
            display_name,
            state,
            expires_on,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{entities::members::MemberEntity, repositories::members::MockMemberRepository};
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_member(tg_user_id: i64, sub_expires_on: Option<NaiveDate>) -> MemberEntity {
        let now = Utc::now();
        MemberEntity {
            id: Uuid::new_v4(),
            tg_user_id,
            display_name: "payer".to_string(),
            sub_expires_on,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn reports_active_with_expiry() {
        let mut member_repo = MockMemberRepository::new();
        member_repo
            .expect_find_by_tg_user_id()
            .with(eq(42))
            .returning(|_| Ok(Some(sample_member(42, NaiveDate::from_ymd_opt(2024, 1, 10)))));

        let view = MemberStatusUseCase::new(Arc::new(member_repo))
            .status_for(42, date(2024, 1, 5))
            .await
            .unwrap();

        assert_eq!(view.state, EntitlementState::Active);
        assert_eq!(view.expires_on, Some(date(2024, 1, 10)));
    }

    #[tokio::test]
    async fn reports_expired_after_lapse() {
        let mut member_repo = MockMemberRepository::new();
        member_repo
            .expect_find_by_tg_user_id()
            .returning(|_| Ok(Some(sample_member(42, NaiveDate::from_ymd_opt(2024, 1, 4)))));

        let view = MemberStatusUseCase::new(Arc::new(member_repo))
            .status_for(42, date(2024, 1, 5))
            .await
            .unwrap();

        assert_eq!(view.state, EntitlementState::Expired);
    }

    #[tokio::test]
    async fn reports_never_subscribed_without_a_record() {
        let mut member_repo = MockMemberRepository::new();
        member_repo
            .expect_find_by_tg_user_id()
            .returning(|_| Ok(None));

        let view = MemberStatusUseCase::new(Arc::new(member_repo))
            .status_for(42, date(2024, 1, 5))
            .await
            .unwrap();

        assert_eq!(view.state, EntitlementState::NeverSubscribed);
        assert_eq!(view.display_name, None);
        assert_eq!(view.expires_on, None);
    }
}
