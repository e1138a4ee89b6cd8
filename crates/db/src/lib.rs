pub mod connection;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::SqlSimilarityStore;
