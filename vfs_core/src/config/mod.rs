pub mod settings;

pub use settings::{AppConfig, DatabaseConfig, LogFormat, LoggingConfig, StorageConfig, TransferConfig};
