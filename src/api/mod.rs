pub mod chat_completions;
pub mod cors;
pub mod health;
pub mod models;
