use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::members;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = members)]
pub struct MemberEntity {
    pub id: Uuid,
    pub tg_user_id: i64,
    pub display_name: String,
    pub sub_expires_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for the payment-driven upsert. `display_name` is last-seen and
/// overwritten on every payment; `sub_expires_on` is the freshly computed
/// expiry and is never allowed to move an existing expiry backward.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = members)]
pub struct UpsertMemberEntity {
    pub tg_user_id: i64,
    pub display_name: String,
    pub sub_expires_on: NaiveDate,
}
