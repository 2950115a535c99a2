pub mod chat_history;
pub mod entitlements;
pub mod enums;
pub mod payments;
