//! Shardmeta Common - Shared types and utilities
//!
//! This crate provides the index identity type, the error definitions and
//! the configuration structures used by every Shardmeta component.

pub mod config;
pub mod error;
pub mod types;

pub use config::{GatewayConfig, StateFormatConfig};
pub use error::{Error, Result};
pub use types::*;
