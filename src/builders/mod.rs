//! Builders
//!
//! Fluent builder for credentials configuration.

pub mod config;

pub use config::{credentials_config, CredentialsConfigBuilder};
