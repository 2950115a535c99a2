pub mod chat_history;
pub mod group_admission;
pub mod members;
pub mod notifier;
