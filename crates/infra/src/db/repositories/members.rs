use anyhow::Result;
use async_trait::async_trait;
use diesel::{Connection, RunQueryDsl, insert_into, prelude::*, upsert::excluded};
use std::sync::Arc;

use crate::db::postgres_connection::PgPoolSquad;
use domain::{
    entities::{
        members::{MemberEntity, UpsertMemberEntity},
        payments::NewPaymentEntity,
    },
    repositories::members::{MemberRepository, PaymentApplication},
    schema::{members, payments},
};

diesel::define_sql_function! {
    /// Postgres GREATEST; keeps `sub_expires_on` from ever moving backward.
    fn greatest(
        a: diesel::sql_types::Nullable<diesel::sql_types::Date>,
        b: diesel::sql_types::Nullable<diesel::sql_types::Date>,
    ) -> diesel::sql_types::Nullable<diesel::sql_types::Date>;
}

pub struct MemberPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl MemberPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl MemberRepository for MemberPostgres {
    async fn find_by_tg_user_id(&self, tg_user_id: i64) -> Result<Option<MemberEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let member = members::table
            .filter(members::tg_user_id.eq(tg_user_id))
            .select(MemberEntity::as_select())
            .first::<MemberEntity>(&mut conn)
            .optional()?;

        Ok(member)
    }

    async fn apply_confirmed_payment(
        &self,
        payment: NewPaymentEntity,
        member: UpsertMemberEntity,
    ) -> Result<PaymentApplication> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<PaymentApplication, anyhow::Error, _>(|conn| {
            // The unique provider_payment_id makes the whole transaction a
            // no-op when a confirmation is replayed.
            let recorded = insert_into(payments::table)
                .values(&payment)
                .on_conflict(payments::provider_payment_id)
                .do_nothing()
                .execute(conn)?;

            if recorded == 0 {
                return Ok(PaymentApplication::AlreadyProcessed);
            }

            let member = insert_into(members::table)
                .values(&member)
                .on_conflict(members::tg_user_id)
                .do_update()
                .set((
                    members::display_name.eq(excluded(members::display_name)),
                    members::sub_expires_on.eq(greatest(
                        members::sub_expires_on,
                        excluded(members::sub_expires_on),
                    )),
                    members::updated_at.eq(diesel::dsl::now),
                ))
                .returning(MemberEntity::as_returning())
                .get_result::<MemberEntity>(conn)?;

            Ok(PaymentApplication::Applied { member })
        })
    }

    async fn list_subscribed_page(
        &self,
        after_tg_user_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<MemberEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = members::table
            .filter(members::sub_expires_on.is_not_null())
            .select(MemberEntity::as_select())
            .into_boxed();

        if let Some(after) = after_tg_user_id {
            query = query.filter(members::tg_user_id.gt(after));
        }

        let page = query
            .order(members::tg_user_id.asc())
            .limit(limit)
            .load::<MemberEntity>(&mut conn)?;

        Ok(page)
    }
}
