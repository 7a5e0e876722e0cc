//! Shared types for the mkit voucher intake tools
//!
//! Provides the common error type, TOML configuration loading, and the
//! event bus used for SSE broadcasting by the intake service.

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
