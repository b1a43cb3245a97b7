//! Types
//!
//! Integration records, provider responses and configuration.

pub mod config;
pub mod integration;
pub mod token;

pub use config::*;
pub use integration::*;
pub use token::*;
