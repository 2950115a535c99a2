use std::{sync::Arc, time::Duration as StdDuration};

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use tracing::{error, info};

use crate::usecases::{
    history_retention::{HistoryRetentionParams, HistoryRetentionUseCase},
    membership_sweep::{MembershipSweepParams, MembershipSweepUseCase},
};

#[derive(Debug, Clone, Copy)]
pub struct SweepSchedule {
    pub at: NaiveTime,
    pub offset: FixedOffset,
}

/// Time left until the next daily fire of `schedule`, seen from `now`.
fn until_next_fire(schedule: &SweepSchedule, now: DateTime<Utc>) -> StdDuration {
    let local_now = now.with_timezone(&schedule.offset).naive_local();

    let mut fire = local_now.date().and_time(schedule.at);
    if fire <= local_now {
        fire = fire + Duration::days(1);
    }

    (fire - local_now)
        .to_std()
        .unwrap_or(StdDuration::from_secs(60))
}

/// Fires the membership sweep once a day at the configured local time,
/// optionally once at startup to catch up on missed runs.
pub async fn run_membership_sweep_loop(
    usecase: Arc<MembershipSweepUseCase>,
    schedule: SweepSchedule,
    batch_size: i64,
    run_on_startup: bool,
) -> Result<()> {
    if run_on_startup {
        run_sweep_once(&usecase, &schedule, batch_size).await;
    }

    loop {
        let wait = until_next_fire(&schedule, Utc::now());
        info!(
            wait_secs = wait.as_secs(),
            "sweep scheduler: sleeping until next daily run"
        );
        tokio::time::sleep(wait).await;

        run_sweep_once(&usecase, &schedule, batch_size).await;
    }
}

async fn run_sweep_once(
    usecase: &MembershipSweepUseCase,
    schedule: &SweepSchedule,
    batch_size: i64,
) {
    let today = Utc::now().with_timezone(&schedule.offset).date_naive();
    let params = MembershipSweepParams {
        today,
        batch_size,
        dry_run: false,
    };

    if let Err(err) = usecase.run(params).await {
        error!(error = ?err, "sweep scheduler: daily membership sweep failed");
    }
}

pub async fn run_history_retention_loop(
    usecase: Arc<HistoryRetentionUseCase>,
    max_entries: i64,
    interval_secs: u64,
) -> Result<()> {
    loop {
        let params = HistoryRetentionParams {
            max_entries,
            dry_run: false,
        };

        if let Err(err) = usecase.run(params).await {
            error!(error = ?err, "history scheduler: retention pass failed");
        }

        tokio::time::sleep(StdDuration::from_secs(interval_secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule(hour: u32, minute: u32, offset_hours: i32) -> SweepSchedule {
        SweepSchedule {
            at: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            offset: FixedOffset::east_opt(offset_hours * 3600).unwrap(),
        }
    }

    #[test]
    fn fires_later_today_when_the_time_is_still_ahead() {
        // 01:00 UTC is 08:00 at +07:00; the 09:30 run is 90 minutes away.
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 1, 0, 0).unwrap();
        let wait = until_next_fire(&schedule(9, 30, 7), now);
        assert_eq!(wait.as_secs(), 90 * 60);
    }

    #[test]
    fn rolls_over_to_tomorrow_once_the_time_has_passed() {
        // 03:00 UTC is 10:00 at +07:00; next 09:30 run is 23.5 hours away.
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 3, 0, 0).unwrap();
        let wait = until_next_fire(&schedule(9, 30, 7), now);
        assert_eq!(wait.as_secs(), 23 * 3600 + 30 * 60);
    }

    #[test]
    fn exactly_at_fire_time_waits_a_full_day() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 2, 30, 0).unwrap();
        let wait = until_next_fire(&schedule(9, 30, 7), now);
        assert_eq!(wait.as_secs(), 24 * 3600);
    }
}
