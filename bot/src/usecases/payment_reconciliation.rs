use std::sync::Arc;

use chrono::NaiveDate;
use domain::{
    entities::{members::UpsertMemberEntity, payments::NewPaymentEntity},
    repositories::{
        group_admission::GroupAdmission,
        members::{MemberRepository, PaymentApplication},
        notifier::ChatNotifier,
    },
    value_objects::{entitlements::SubscriptionTerms, payments::PaymentConfirmation},
};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment amount mismatch: expected {expected} {currency}, got {received}")]
    AmountMismatch {
        expected: i64,
        received: i64,
        currency: String,
    },
    #[error("payment currency mismatch: expected {expected}, got {received}")]
    CurrencyMismatch { expected: String, received: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type UseCaseResult<T> = std::result::Result<T, PaymentError>;

#[derive(Debug, Clone)]
pub struct ReconciliationResult {
    pub tg_user_id: i64,
    /// Expiry as committed; `None` when the confirmation was a replay.
    pub new_expires_on: Option<NaiveDate>,
    pub invite_url: Option<String>,
    pub already_processed: bool,
}

pub struct PaymentReconciliationUseCase {
    member_repo: Arc<dyn MemberRepository + Send + Sync>,
    notifier: Arc<dyn ChatNotifier + Send + Sync>,
    group: Arc<dyn GroupAdmission + Send + Sync>,
    terms: SubscriptionTerms,
    price_minor: i64,
    currency: String,
    group_name: String,
}

impl PaymentReconciliationUseCase {
    pub fn new(
        member_repo: Arc<dyn MemberRepository + Send + Sync>,
        notifier: Arc<dyn ChatNotifier + Send + Sync>,
        group: Arc<dyn GroupAdmission + Send + Sync>,
        terms: SubscriptionTerms,
        price_minor: i64,
        currency: String,
        group_name: String,
    ) -> Self {
        Self {
            member_repo,
            notifier,
            group,
            terms,
            price_minor,
            currency,
            group_name,
        }
    }

    pub async fn handle_payment(
        &self,
        confirmation: PaymentConfirmation,
        today: NaiveDate,
    ) -> UseCaseResult<ReconciliationResult> {
        info!(
            tg_user_id = confirmation.tg_user_id,
            amount_minor = confirmation.amount_minor,
            currency = %confirmation.currency,
            provider_payment_id = %confirmation.provider_payment_id,
            "payments: confirmation received"
        );

        if confirmation.currency != self.currency {
            warn!(
                tg_user_id = confirmation.tg_user_id,
                received = %confirmation.currency,
                expected = %self.currency,
                "payments: currency mismatch rejected before storage"
            );
            return Err(PaymentError::CurrencyMismatch {
                expected: self.currency.clone(),
                received: confirmation.currency.clone(),
            });
        }

        if confirmation.amount_minor != self.price_minor {
            warn!(
                tg_user_id = confirmation.tg_user_id,
                received = confirmation.amount_minor,
                expected = self.price_minor,
                "payments: amount mismatch rejected before storage"
            );
            return Err(PaymentError::AmountMismatch {
                expected: self.price_minor,
                received: confirmation.amount_minor,
                currency: self.currency.clone(),
            });
        }

        let prior = self
            .member_repo
            .find_by_tg_user_id(confirmation.tg_user_id)
            .await
            .map_err(|err| {
                error!(
                    tg_user_id = confirmation.tg_user_id,
                    db_error = ?err,
                    "payments: failed to load member before reconciliation"
                );
                PaymentError::Internal(err)
            })?;

        let new_expires_on = self
            .terms
            .renewal_expiry(prior.as_ref().and_then(|m| m.sub_expires_on), today);

        let application = self
            .member_repo
            .apply_confirmed_payment(
                NewPaymentEntity {
                    tg_user_id: confirmation.tg_user_id,
                    amount_minor: confirmation.amount_minor,
                    currency: confirmation.currency.clone(),
                    provider_payment_id: confirmation.provider_payment_id.clone(),
                },
                UpsertMemberEntity {
                    tg_user_id: confirmation.tg_user_id,
                    display_name: confirmation.display_name.clone(),
                    sub_expires_on: new_expires_on,
                },
            )
            .await
            .map_err(|err| {
                error!(
                    tg_user_id = confirmation.tg_user_id,
                    provider_payment_id = %confirmation.provider_payment_id,
                    db_error = ?err,
                    "payments: failed to persist confirmed payment"
                );
                PaymentError::Internal(err)
            })?;

        let member = match application {
            PaymentApplication::AlreadyProcessed => {
                info!(
                    tg_user_id = confirmation.tg_user_id,
                    provider_payment_id = %confirmation.provider_payment_id,
                    "payments: replayed confirmation ignored"
                );
                return Ok(ReconciliationResult {
                    tg_user_id: confirmation.tg_user_id,
                    new_expires_on: None,
                    invite_url: None,
                    already_processed: true,
                });
            }
            PaymentApplication::Applied { member } => member,
        };

        // The record is committed; everything below is best-effort delivery
        // and must never fail the payment.
        let expires_on = member.sub_expires_on.unwrap_or(new_expires_on);

        let invite_url = match self
            .group
            .create_single_use_invite(confirmation.tg_user_id, &confirmation.display_name)
            .await
        {
            Ok(invite_url) => {
                if let Err(err) = self
                    .notifier
                    .send_message(
                        confirmation.tg_user_id,
                        &format!(
                            "Your personal one-time invite link to {}:\n{}",
                            self.group_name, invite_url
                        ),
                    )
                    .await
                {
                    warn!(
                        tg_user_id = confirmation.tg_user_id,
                        error = ?err,
                        "payments: failed to deliver invite link"
                    );
                }
                Some(invite_url)
            }
            Err(err) => {
                warn!(
                    tg_user_id = confirmation.tg_user_id,
                    error = ?err,
                    "payments: invite link creation failed after commit"
                );
                if let Err(send_err) = self
                    .notifier
                    .send_message(
                        confirmation.tg_user_id,
                        "Your payment was recorded, but the invite link could not be \
                         created. Please try /status later or contact support.",
                    )
                    .await
                {
                    warn!(
                        tg_user_id = confirmation.tg_user_id,
                        error = ?send_err,
                        "payments: failed to deliver invite failure notice"
                    );
                }
                None
            }
        };

        if let Err(err) = self
            .notifier
            .send_message(
                confirmation.tg_user_id,
                &format!(
                    "✅ Subscription to {} active until {}.",
                    self.group_name, expires_on
                ),
            )
            .await
        {
            warn!(
                tg_user_id = confirmation.tg_user_id,
                error = ?err,
                "payments: failed to deliver payment confirmation"
            );
        }

        info!(
            tg_user_id = confirmation.tg_user_id,
            expires_on = %expires_on,
            invite_created = invite_url.is_some(),
            "payments: confirmation reconciled"
        );

        Ok(ReconciliationResult {
            tg_user_id: confirmation.tg_user_id,
            new_expires_on: Some(expires_on),
            invite_url,
            already_processed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Utc;
    use domain::{
        entities::members::MemberEntity,
        repositories::{
            group_admission::MockGroupAdmission, members::MockMemberRepository,
            notifier::MockChatNotifier,
        },
    };
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

    fn sample_confirmation(tg_user_id: i64) -> PaymentConfirmation {
        PaymentConfirmation {
            tg_user_id,
            display_name: "payer".to_string(),
            amount_minor: 10000,
            currency: "USD".to_string(),
            provider_payment_id: "ch_1".to_string(),
        }
    }

    fn usecase(
        member_repo: MockMemberRepository,
        notifier: MockChatNotifier,
        group: MockGroupAdmission,
    ) -> PaymentReconciliationUseCase {
        PaymentReconciliationUseCase::new(
            Arc::new(member_repo),
            Arc::new(notifier),
            Arc::new(group),
            SubscriptionTerms {
                extension_days: 30,
                fresh_days: 30,
            },
            10000,
            "USD".to_string(),
            "Rust Club".to_string(),
        )
    }

    #[tokio::test]
    async fn first_payment_creates_record_and_requests_invite() {
        let mut member_repo = MockMemberRepository::new();
        let mut notifier = MockChatNotifier::new();
        let mut group = MockGroupAdmission::new();

        member_repo
            .expect_find_by_tg_user_id()
            .with(eq(7))
            .returning(|_| Ok(None));

        member_repo
            .expect_apply_confirmed_payment()
            .withf(|payment, member| {
                payment.provider_payment_id == "ch_1"
                    && member.tg_user_id == 7
                    && member.sub_expires_on
                        == NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
            })
            .returning(|_, _| {
                Ok(PaymentApplication::Applied {
                    member: sample_member(7, NaiveDate::from_ymd_opt(2024, 3, 2)),
                })
            });

        group
            .expect_create_single_use_invite()
            .times(1)
            .returning(|_, _| Ok("https://t.me/+invite".to_string()));

        notifier
            .expect_send_message()
            .withf(|chat_id, text| *chat_id == 7 && text.contains("https://t.me/+invite"))
            .times(1)
            .returning(|_, _| Ok(()));
        notifier
            .expect_send_message()
            .withf(|chat_id, text| *chat_id == 7 && text.contains("active until 2024-03-02"))
            .times(1)
            .returning(|_, _| Ok(()));

        let result = usecase(member_repo, notifier, group)
            .handle_payment(sample_confirmation(7), date(2024, 2, 1))
            .await
            .unwrap();

        assert_eq!(result.new_expires_on, Some(date(2024, 3, 2)));
        assert_eq!(result.invite_url.as_deref(), Some("https://t.me/+invite"));
        assert!(!result.already_processed);
    }

    #[tokio::test]
    async fn renewal_while_active_stacks_on_prior_expiry() {
        let mut member_repo = MockMemberRepository::new();
        let mut notifier = MockChatNotifier::new();
        let mut group = MockGroupAdmission::new();

        member_repo
            .expect_find_by_tg_user_id()
            .with(eq(7))
            .returning(|_| Ok(Some(sample_member(7, NaiveDate::from_ymd_opt(2024, 3, 2)))));

        member_repo
            .expect_apply_confirmed_payment()
            .withf(|_, member| {
                member.sub_expires_on == NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
            })
            .returning(|_, _| {
                Ok(PaymentApplication::Applied {
                    member: sample_member(7, NaiveDate::from_ymd_opt(2024, 4, 1)),
                })
            });

        group
            .expect_create_single_use_invite()
            .returning(|_, _| Ok("https://t.me/+invite".to_string()));
        notifier.expect_send_message().returning(|_, _| Ok(()));

        let result = usecase(member_repo, notifier, group)
            .handle_payment(sample_confirmation(7), date(2024, 2, 15))
            .await
            .unwrap();

        assert_eq!(result.new_expires_on, Some(date(2024, 4, 1)));
    }

    #[tokio::test]
    async fn amount_mismatch_is_rejected_before_storage() {
        let member_repo = MockMemberRepository::new();
        let notifier = MockChatNotifier::new();
        let group = MockGroupAdmission::new();

        let mut confirmation = sample_confirmation(7);
        confirmation.amount_minor = 500;

        let result = usecase(member_repo, notifier, group)
            .handle_payment(confirmation, date(2024, 2, 1))
            .await;

        assert!(matches!(
            result,
            Err(PaymentError::AmountMismatch {
                expected: 10000,
                received: 500,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn replayed_confirmation_has_no_effect() {
        let mut member_repo = MockMemberRepository::new();
        let mut notifier = MockChatNotifier::new();
        let mut group = MockGroupAdmission::new();

        member_repo
            .expect_find_by_tg_user_id()
            .returning(|_| Ok(Some(sample_member(7, NaiveDate::from_ymd_opt(2024, 3, 2)))));
        member_repo
            .expect_apply_confirmed_payment()
            .returning(|_, _| Ok(PaymentApplication::AlreadyProcessed));

        group.expect_create_single_use_invite().never();
        notifier.expect_send_message().never();

        let result = usecase(member_repo, notifier, group)
            .handle_payment(sample_confirmation(7), date(2024, 2, 15))
            .await
            .unwrap();

        assert!(result.already_processed);
        assert_eq!(result.new_expires_on, None);
        assert_eq!(result.invite_url, None);
    }

    #[tokio::test]
    async fn invite_failure_does_not_lose_the_payment() {
        let mut member_repo = MockMemberRepository::new();
        let mut notifier = MockChatNotifier::new();
        let mut group = MockGroupAdmission::new();

        member_repo
            .expect_find_by_tg_user_id()
            .returning(|_| Ok(None));
        member_repo
            .expect_apply_confirmed_payment()
            .returning(|_, _| {
                Ok(PaymentApplication::Applied {
                    member: sample_member(7, NaiveDate::from_ymd_opt(2024, 3, 2)),
                })
            });

        group
            .expect_create_single_use_invite()
            .returning(|_, _| Err(anyhow!("invite api down")));

        notifier
            .expect_send_message()
            .withf(|_, text| text.contains("could not be"))
            .times(1)
            .returning(|_, _| Ok(()));
        notifier
            .expect_send_message()
            .withf(|_, text| text.contains("active until"))
            .times(1)
            .returning(|_, _| Ok(()));

        let result = usecase(member_repo, notifier, group)
            .handle_payment(sample_confirmation(7), date(2024, 2, 1))
            .await
            .unwrap();

        assert_eq!(result.new_expires_on, Some(date(2024, 3, 2)));
        assert_eq!(result.invite_url, None);
        assert!(!result.already_processed);
    }
}
