use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use domain::{
    entities::members::MemberEntity,
    repositories::{
        group_admission::GroupAdmission, members::MemberRepository, notifier::ChatNotifier,
    },
    value_objects::entitlements::{EntitlementState, days_remaining},
};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct MembershipSweepParams {
    pub today: NaiveDate,
    pub batch_size: i64,
    pub dry_run: bool,
}

/// Per-run tally. Candidate id lists are capped at 20 entries to keep
/// reports and trigger-route responses small.
#[derive(Debug, Clone, Default)]
pub struct MembershipSweepReport {
    pub scanned: usize,
    pub reminders_sent: usize,
    pub reminder_failures: usize,
    pub evictions: usize,
    pub revoke_failures: usize,
    pub notice_failures: usize,
    pub exempt_owners: usize,
    pub already_absent: usize,
    pub role_check_failures: usize,
    pub reminder_candidate_ids: Vec<i64>,
    pub eviction_candidate_ids: Vec<i64>,
}

/// Daily reconciliation of group membership against subscription records:
/// remind soon-to-expire members, evict lapsed ones. Safe to re-run; a
/// second pass on the same day finds evicted users already absent.
pub struct MembershipSweepUseCase {
    member_repo: Arc<dyn MemberRepository + Send + Sync>,
    notifier: Arc<dyn ChatNotifier + Send + Sync>,
    group: Arc<dyn GroupAdmission + Send + Sync>,
    reminder_days: Vec<i64>,
    group_name: String,
}

impl MembershipSweepUseCase {
    pub fn new(
        member_repo: Arc<dyn MemberRepository + Send + Sync>,
        notifier: Arc<dyn ChatNotifier + Send + Sync>,
        group: Arc<dyn GroupAdmission + Send + Sync>,
        reminder_days: Vec<i64>,
        group_name: String,
    ) -> Self {
        Self {
            member_repo,
            notifier,
            group,
            reminder_days,
            group_name,
        }
    }

    pub async fn run(&self, params: MembershipSweepParams) -> Result<MembershipSweepReport> {
        let batch_size = params.batch_size.max(1);
        let mut report = MembershipSweepReport::default();
        let mut after: Option<i64> = None;

        loop {
            let page = self
                .member_repo
                .list_subscribed_page(after, batch_size)
                .await
                .map_err(|err| {
                    error!(
                        after_tg_user_id = ?after,
                        db_error = ?err,
                        "sweep: failed to load member page"
                    );
                    err
                })?;

            if page.is_empty() {
                break;
            }

            after = page.last().map(|member| member.tg_user_id);
            let page_len = page.len();

            for member in page {
                self.process_member(&member, &params, &mut report).await;
            }
            report.scanned += page_len;

            if (page_len as i64) < batch_size {
                break;
            }
        }

        info!(
            today = %params.today,
            scanned = report.scanned,
            reminders_sent = report.reminders_sent,
            evictions = report.evictions,
            exempt_owners = report.exempt_owners,
            already_absent = report.already_absent,
            reminder_failures = report.reminder_failures,
            revoke_failures = report.revoke_failures,
            notice_failures = report.notice_failures,
            role_check_failures = report.role_check_failures,
            dry_run = params.dry_run,
            "sweep: membership sweep completed"
        );

        Ok(report)
    }

    async fn process_member(
        &self,
        member: &MemberEntity,
        params: &MembershipSweepParams,
        report: &mut MembershipSweepReport,
    ) {
        // The page query only returns members with an expiry on record.
        let Some(expires_on) = member.sub_expires_on else {
            return;
        };

        match EntitlementState::classify(Some(expires_on), params.today) {
            EntitlementState::Active => {
                let days_left = days_remaining(expires_on, params.today);
                if !self.reminder_days.contains(&days_left) {
                    return;
                }

                if report.reminder_candidate_ids.len() < 20 {
                    report.reminder_candidate_ids.push(member.tg_user_id);
                }
                if params.dry_run {
                    return;
                }

                let text = format!(
                    "⏳ Your {} subscription expires on {} ({} day(s) left). \
                     Use /subscribe to extend it.",
                    self.group_name, expires_on, days_left
                );
                match self.notifier.send_message(member.tg_user_id, &text).await {
                    Ok(()) => report.reminders_sent += 1,
                    Err(err) => {
                        warn!(
                            tg_user_id = member.tg_user_id,
                            error = ?err,
                            "sweep: failed to deliver expiry reminder"
                        );
                        report.reminder_failures += 1;
                    }
                }
            }
            EntitlementState::Expired => {
                self.evict_if_present(member, expires_on, params, report)
                    .await;
            }
            EntitlementState::NeverSubscribed => {}
        }
    }

    async fn evict_if_present(
        &self,
        member: &MemberEntity,
        expires_on: NaiveDate,
        params: &MembershipSweepParams,
        report: &mut MembershipSweepReport,
    ) {
        let role = match self.group.membership_role(member.tg_user_id).await {
            Ok(role) => role,
            Err(err) => {
                warn!(
                    tg_user_id = member.tg_user_id,
                    error = ?err,
                    "sweep: membership role lookup failed; skipping user"
                );
                report.role_check_failures += 1;
                return;
            }
        };

        if role.is_owner() {
            info!(
                tg_user_id = member.tg_user_id,
                "sweep: expired owner left untouched"
            );
            report.exempt_owners += 1;
            return;
        }

        if !role.is_present() {
            // Already gone; a repeated run naturally no-ops here.
            report.already_absent += 1;
            return;
        }

        if report.eviction_candidate_ids.len() < 20 {
            report.eviction_candidate_ids.push(member.tg_user_id);
        }
        if params.dry_run {
            return;
        }

        // Revocation and the removal notice are independent side effects;
        // one failing must not stop the other.
        match self.group.revoke_membership(member.tg_user_id).await {
            Ok(()) => report.evictions += 1,
            Err(err) => {
                error!(
                    tg_user_id = member.tg_user_id,
                    role = %role,
                    error = ?err,
                    "sweep: failed to revoke membership"
                );
                report.revoke_failures += 1;
            }
        }

        let text = format!(
            "Your {} subscription expired on {} and access has been revoked. \
             You can rejoin any time with /subscribe.",
            self.group_name, expires_on
        );
        if let Err(err) = self.notifier.send_message(member.tg_user_id, &text).await {
            warn!(
                tg_user_id = member.tg_user_id,
                error = ?err,
                "sweep: failed to deliver removal notice"
            );
            report.notice_failures += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Utc;
    use domain::{
        repositories::{
            group_admission::MockGroupAdmission, members::MockMemberRepository,
            notifier::MockChatNotifier,
        },
        value_objects::enums::group_roles::GroupRole,
    };
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_member(tg_user_id: i64, sub_expires_on: NaiveDate) -> MemberEntity {
        let now = Utc::now();
        MemberEntity {
            id: Uuid::new_v4(),
            tg_user_id,
            display_name: "member".to_string(),
            sub_expires_on: Some(sub_expires_on),
            created_at: now,
            updated_at: now,
        }
    }

    fn usecase(
        member_repo: MockMemberRepository,
        notifier: MockChatNotifier,
        group: MockGroupAdmission,
    ) -> MembershipSweepUseCase {
        MembershipSweepUseCase::new(
            Arc::new(member_repo),
            Arc::new(notifier),
            Arc::new(group),
            vec![5, 1],
            "Rust Club".to_string(),
        )
    }

    fn params(today: NaiveDate) -> MembershipSweepParams {
        MembershipSweepParams {
            today,
            batch_size: 500,
            dry_run: false,
        }
    }

    fn single_page(member: MemberEntity) -> MockMemberRepository {
        let mut member_repo = MockMemberRepository::new();
        member_repo
            .expect_list_subscribed_page()
            .returning(move |after, _| {
                if after.is_none() {
                    Ok(vec![member.clone()])
                } else {
                    Ok(Vec::new())
                }
            });
        member_repo
    }

    #[tokio::test]
    async fn reminds_at_five_days_remaining() {
        let member_repo = single_page(sample_member(42, date(2024, 1, 10)));
        let mut notifier = MockChatNotifier::new();
        let group = MockGroupAdmission::new();

        notifier
            .expect_send_message()
            .withf(|chat_id, text| *chat_id == 42 && text.contains("2024-01-10"))
            .times(1)
            .returning(|_, _| Ok(()));

        let report = usecase(member_repo, notifier, group)
            .run(params(date(2024, 1, 5)))
            .await
            .unwrap();

        assert_eq!(report.scanned, 1);
        assert_eq!(report.reminders_sent, 1);
        assert_eq!(report.reminder_candidate_ids, vec![42]);
        assert_eq!(report.evictions, 0);
    }

    #[tokio::test]
    async fn reminds_at_one_day_remaining() {
        let member_repo = single_page(sample_member(42, date(2024, 1, 6)));
        let mut notifier = MockChatNotifier::new();
        let group = MockGroupAdmission::new();

        notifier
            .expect_send_message()
            .times(1)
            .returning(|_, _| Ok(()));

        let report = usecase(member_repo, notifier, group)
            .run(params(date(2024, 1, 5)))
            .await
            .unwrap();

        assert_eq!(report.reminders_sent, 1);
    }

    #[tokio::test]
    async fn stays_quiet_at_three_days_remaining() {
        let member_repo = single_page(sample_member(42, date(2024, 1, 8)));
        let mut notifier = MockChatNotifier::new();
        let group = MockGroupAdmission::new();

        notifier.expect_send_message().never();

        let report = usecase(member_repo, notifier, group)
            .run(params(date(2024, 1, 5)))
            .await
            .unwrap();

        assert_eq!(report.reminders_sent, 0);
        assert!(report.reminder_candidate_ids.is_empty());
    }

    #[tokio::test]
    async fn evicts_expired_member_and_sends_notice() {
        let member_repo = single_page(sample_member(42, date(2024, 1, 4)));
        let mut notifier = MockChatNotifier::new();
        let mut group = MockGroupAdmission::new();

        group
            .expect_membership_role()
            .with(eq(42))
            .returning(|_| Ok(GroupRole::Member));
        group
            .expect_revoke_membership()
            .with(eq(42))
            .times(1)
            .returning(|_| Ok(()));
        notifier
            .expect_send_message()
            .withf(|chat_id, text| *chat_id == 42 && text.contains("expired on 2024-01-04"))
            .times(1)
            .returning(|_, _| Ok(()));

        let report = usecase(member_repo, notifier, group)
            .run(params(date(2024, 1, 5)))
            .await
            .unwrap();

        assert_eq!(report.evictions, 1);
        assert_eq!(report.eviction_candidate_ids, vec![42]);
    }

    #[tokio::test]
    async fn never_evicts_the_group_owner() {
        let member_repo = single_page(sample_member(42, date(2024, 1, 4)));
        let notifier = MockChatNotifier::new();
        let mut group = MockGroupAdmission::new();

        group
            .expect_membership_role()
            .returning(|_| Ok(GroupRole::Creator));
        group.expect_revoke_membership().never();

        let report = usecase(member_repo, notifier, group)
            .run(params(date(2024, 1, 5)))
            .await
            .unwrap();

        assert_eq!(report.exempt_owners, 1);
        assert_eq!(report.evictions, 0);
        assert!(report.eviction_candidate_ids.is_empty());
    }

    #[tokio::test]
    async fn departed_members_are_a_noop_on_rerun() {
        let member_repo = single_page(sample_member(42, date(2024, 1, 4)));
        let notifier = MockChatNotifier::new();
        let mut group = MockGroupAdmission::new();

        group
            .expect_membership_role()
            .returning(|_| Ok(GroupRole::Left));
        group.expect_revoke_membership().never();

        let report = usecase(member_repo, notifier, group)
            .run(params(date(2024, 1, 5)))
            .await
            .unwrap();

        assert_eq!(report.already_absent, 1);
        assert_eq!(report.evictions, 0);
    }

    #[tokio::test]
    async fn revoke_failure_does_not_block_the_notice() {
        let member_repo = single_page(sample_member(42, date(2024, 1, 4)));
        let mut notifier = MockChatNotifier::new();
        let mut group = MockGroupAdmission::new();

        group
            .expect_membership_role()
            .returning(|_| Ok(GroupRole::Member));
        group
            .expect_revoke_membership()
            .returning(|_| Err(anyhow!("admission api down")));
        notifier
            .expect_send_message()
            .times(1)
            .returning(|_, _| Ok(()));

        let report = usecase(member_repo, notifier, group)
            .run(params(date(2024, 1, 5)))
            .await
            .unwrap();

        assert_eq!(report.revoke_failures, 1);
        assert_eq!(report.evictions, 0);
        assert_eq!(report.notice_failures, 0);
    }

    #[tokio::test]
    async fn role_check_failure_skips_only_that_user() {
        let mut member_repo = MockMemberRepository::new();
        let first = sample_member(10, date(2024, 1, 4));
        let second = sample_member(20, date(2024, 1, 4));
        member_repo
            .expect_list_subscribed_page()
            .returning(move |after, _| {
                if after.is_none() {
                    Ok(vec![first.clone(), second.clone()])
                } else {
                    Ok(Vec::new())
                }
            });

        let mut notifier = MockChatNotifier::new();
        let mut group = MockGroupAdmission::new();

        group
            .expect_membership_role()
            .with(eq(10))
            .returning(|_| Err(anyhow!("timeout")));
        group
            .expect_membership_role()
            .with(eq(20))
            .returning(|_| Ok(GroupRole::Member));
        group
            .expect_revoke_membership()
            .with(eq(20))
            .times(1)
            .returning(|_| Ok(()));
        notifier
            .expect_send_message()
            .times(1)
            .returning(|_, _| Ok(()));

        let report = usecase(member_repo, notifier, group)
            .run(params(date(2024, 1, 5)))
            .await
            .unwrap();

        assert_eq!(report.role_check_failures, 1);
        assert_eq!(report.evictions, 1);
    }

    #[tokio::test]
    async fn dry_run_lists_candidates_without_side_effects() {
        let mut member_repo = MockMemberRepository::new();
        let due_reminder = sample_member(10, date(2024, 1, 10));
        let expired = sample_member(20, date(2024, 1, 4));
        member_repo
            .expect_list_subscribed_page()
            .returning(move |after, _| {
                if after.is_none() {
                    Ok(vec![due_reminder.clone(), expired.clone()])
                } else {
                    Ok(Vec::new())
                }
            });

        let mut notifier = MockChatNotifier::new();
        let mut group = MockGroupAdmission::new();

        group
            .expect_membership_role()
            .with(eq(20))
            .returning(|_| Ok(GroupRole::Member));
        group.expect_revoke_membership().never();
        notifier.expect_send_message().never();

        let report = usecase(member_repo, notifier, group)
            .run(MembershipSweepParams {
                today: date(2024, 1, 5),
                batch_size: 500,
                dry_run: true,
            })
            .await
            .unwrap();

        assert_eq!(report.reminder_candidate_ids, vec![10]);
        assert_eq!(report.eviction_candidate_ids, vec![20]);
        assert_eq!(report.reminders_sent, 0);
        assert_eq!(report.evictions, 0);
    }

    #[tokio::test]
    async fn tolerates_an_empty_population() {
        let mut member_repo = MockMemberRepository::new();
        member_repo
            .expect_list_subscribed_page()
            .returning(|_, _| Ok(Vec::new()));

        let report = usecase(member_repo, MockChatNotifier::new(), MockGroupAdmission::new())
            .run(params(date(2024, 1, 5)))
            .await
            .unwrap();

        assert_eq!(report.scanned, 0);
    }

    #[tokio::test]
    async fn paginates_with_the_last_id_as_cursor() {
        let mut member_repo = MockMemberRepository::new();
        let first = sample_member(1, date(2024, 2, 1));
        let second = sample_member(2, date(2024, 2, 1));
        let third = sample_member(3, date(2024, 2, 1));

        member_repo
            .expect_list_subscribed_page()
            .with(eq(None), eq(2))
            .times(1)
            .returning(move |_, _| Ok(vec![first.clone(), second.clone()]));
        member_repo
            .expect_list_subscribed_page()
            .with(eq(Some(2)), eq(2))
            .times(1)
            .returning(move |_, _| Ok(vec![third.clone()]));

        let report = usecase(member_repo, MockChatNotifier::new(), MockGroupAdmission::new())
            .run(MembershipSweepParams {
                today: date(2024, 1, 5),
                batch_size: 2,
                dry_run: false,
            })
            .await
            .unwrap();

        assert_eq!(report.scanned, 3);
    }
}
