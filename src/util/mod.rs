//! Shared utilities

pub mod config;
pub mod errors;

pub use config::{Config, GnmConfig};
pub use errors::{GambitError, Result};
