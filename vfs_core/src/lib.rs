//! Virtual filesystem core: maps user-owned files and folders onto storage
//! policies and performs uploads, reads and grouped deletes through
//! per-policy drivers.

pub mod config;
pub mod database;
pub mod driver;
pub mod error;
pub mod filesystem;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod throttle;

pub use config::AppConfig;
pub use database::{get_database_pool, run_migrations, MigrationManager};
pub use driver::{ContentStream, DriverOptions, LocalDriver, PolicyResolver, RemoteDriver, StorageDriver, UnknownDriver};
pub use error::{AppError, Result};
pub use filesystem::{
    group_files_by_policy, FailureReport, FileStream, FileSystem, PathResolver, PolicyGroups, UploadContext,
    UploadValidator,
};
pub use logging::init_tracing;
pub use metadata::{MetadataStore, SqliteMetadataStore};
pub use models::{File, Folder, Group, NewFile, NewPolicy, Policy, PolicyId, PolicyType, User};
pub use throttle::ThrottledReader;
