use std::fmt::Display;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Membership state derived from a subscription record and the current date.
/// Never persisted; recomputed on demand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EntitlementState {
    Active,
    Expired,
    NeverSubscribed,
}

impl EntitlementState {
    /// A subscription lapses from the start of its expiry date, so `Active`
    /// requires `expires_on` strictly after `today`.
    pub fn classify(expires_on: Option<NaiveDate>, today: NaiveDate) -> Self {
        match expires_on {
            None => EntitlementState::NeverSubscribed,
            Some(expires_on) if expires_on > today => EntitlementState::Active,
            Some(_) => EntitlementState::Expired,
        }
    }
}

impl Display for EntitlementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            EntitlementState::Active => "active",
            EntitlementState::Expired => "expired",
            EntitlementState::NeverSubscribed => "never_subscribed",
        };
        write!(f, "{}", state)
    }
}

/// Term lengths applied when a confirmed payment is reconciled.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionTerms {
    pub extension_days: i64,
    pub fresh_days: i64,
}

impl SubscriptionTerms {
    /// Expiry after a confirmed payment. Paying while still active stacks
    /// the extension on top of the remaining paid time; paying after a lapse
    /// (or for the first time) starts a fresh term from `today`.
    pub fn renewal_expiry(&self, prior_expires_on: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
        match prior_expires_on {
            Some(prior) if prior > today => prior + Duration::days(self.extension_days),
            _ => today + Duration::days(self.fresh_days),
        }
    }
}

/// Whole days between `today` and `expires_on`; negative once lapsed.
pub fn days_remaining(expires_on: NaiveDate, today: NaiveDate) -> i64 {
    (expires_on - today).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn classify_is_active_only_strictly_before_expiry() {
        let today = date(2024, 1, 5);

        assert_eq!(
            EntitlementState::classify(Some(date(2024, 1, 6)), today),
            EntitlementState::Active
        );
        // The record lapses from the start of its expiry date.
        assert_eq!(
            EntitlementState::classify(Some(date(2024, 1, 5)), today),
            EntitlementState::Expired
        );
        assert_eq!(
            EntitlementState::classify(Some(date(2024, 1, 4)), today),
            EntitlementState::Expired
        );
        assert_eq!(
            EntitlementState::classify(None, today),
            EntitlementState::NeverSubscribed
        );
    }

    #[test]
    fn renewal_while_active_stacks_on_prior_expiry() {
        let terms = SubscriptionTerms {
            extension_days: 30,
            fresh_days: 30,
        };
        let prior = Some(date(2024, 3, 2));

        let renewed = terms.renewal_expiry(prior, date(2024, 2, 15));
        assert_eq!(renewed, date(2024, 4, 1));

        // Stacking is independent of the renewal date while still active.
        let renewed_earlier = terms.renewal_expiry(prior, date(2024, 2, 3));
        assert_eq!(renewed_earlier, renewed);
    }

    #[test]
    fn renewal_after_lapse_starts_fresh_from_today() {
        let terms = SubscriptionTerms {
            extension_days: 30,
            fresh_days: 30,
        };

        let from_expired = terms.renewal_expiry(Some(date(2023, 12, 1)), date(2024, 2, 1));
        assert_eq!(from_expired, date(2024, 3, 2));

        let first_payment = terms.renewal_expiry(None, date(2024, 2, 1));
        assert_eq!(first_payment, date(2024, 3, 2));
    }

    #[test]
    fn renewal_on_expiry_day_is_a_fresh_start() {
        let terms = SubscriptionTerms {
            extension_days: 10,
            fresh_days: 40,
        };

        let renewed = terms.renewal_expiry(Some(date(2024, 2, 1)), date(2024, 2, 1));
        assert_eq!(renewed, date(2024, 3, 12));
    }

    #[test]
    fn days_remaining_counts_whole_days() {
        assert_eq!(days_remaining(date(2024, 1, 10), date(2024, 1, 5)), 5);
        assert_eq!(days_remaining(date(2024, 1, 6), date(2024, 1, 5)), 1);
        assert_eq!(days_remaining(date(2024, 1, 5), date(2024, 1, 5)), 0);
        assert_eq!(days_remaining(date(2024, 1, 4), date(2024, 1, 5)), -1);
    }
}
