pub mod sqlite;
pub mod store;

pub use sqlite::SqliteMetadataStore;
pub use store::MetadataStore;
