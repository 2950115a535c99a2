use diesel::prelude::*;

use crate::schema::payments;

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPaymentEntity {
    pub tg_user_id: i64,
    pub amount_minor: i64,
    pub currency: String,
    /// Charge id assigned by the payment provider; unique in storage and
    /// used to reject replayed confirmations.
    pub provider_payment_id: String,
}
