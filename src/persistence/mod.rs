//! Persistence layer modules.

pub mod agent_repo;
pub mod api_key_repo;
pub mod chat_repo;
pub mod contact_repo;
pub mod db;
pub mod mail_repo;
pub mod project_repo;
pub mod reservation_repo;
pub mod schema;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;
