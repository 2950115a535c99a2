pub mod member_status;
pub mod payment_reconciliation;
