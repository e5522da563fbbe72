pub mod config;
pub mod types;

pub use config::{CollectionNames, Config, ConfigError};
pub use types::*;
