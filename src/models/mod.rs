//! Data models for database access.
//!
//! This module re-exports all model types used throughout the crate.

pub mod column;
pub mod connection;

// Re-export commonly used types
pub use column::{LogicalColumn, TableDefinition};
pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType};
