pub mod connection;
pub mod migrations;

pub use connection::get_database_pool;
pub use migrations::{MigrationManager, run_migrations};
