pub mod config;
pub mod messages;
pub mod types;

pub use config::{ConfigError, RegistrationFailurePolicy, ShutdownConfig, WorldConfig};
pub use messages::MessageCatalog;
pub use types::*;
