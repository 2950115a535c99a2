use serde::{Deserialize, Serialize};

/// Confirmed-payment event as reported by the payment provider. Ephemeral
/// input to reconciliation; only its effects are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentConfirmation {
    pub tg_user_id: i64,
    pub display_name: String,
    pub amount_minor: i64,
    pub currency: String,
    /// Provider-assigned charge id; doubles as the idempotency key.
    pub provider_payment_id: String,
}
