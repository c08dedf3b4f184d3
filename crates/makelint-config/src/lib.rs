//! Parse and validate `.makelint.toml`.

pub mod configuration;

pub use configuration::{Configuration, ConfigError, ToolSpec};
