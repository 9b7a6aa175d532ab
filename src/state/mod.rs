pub mod migration;
pub mod models;
pub mod query;
pub mod repository;
pub mod schema;
pub mod sqlite;

pub use repository::StateRepository;
pub use sqlite::SqliteRepository;
