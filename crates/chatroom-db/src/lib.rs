pub mod config;
pub mod conversations;
pub mod error;
pub mod friends;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;

mod database;
#[cfg(test)]
mod test_support;

pub use config::{DbConfig, DirectConversationPolicy};
pub use database::Database;
pub use error::{DbError, Result};
