pub mod chat_history;
pub mod members;
