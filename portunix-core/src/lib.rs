//! Ambient stack shared by every Portunix Core service: configuration error
//! taxonomy, structured logging setup, and the lifecycle contract services
//! expose to the command layer (spec §6.1).

pub mod error;
pub mod lifecycle;
pub mod logging;

pub use error::ConfigError;
pub use lifecycle::CoreService;
