//! Database access layer.
//!
//! This module provides:
//! - Connection pools per engine
//! - Statement execution with typed arguments and generated keys
//! - Forward-only row cursors
//! - The SQL type registry and per-engine dialects
//! - Database dispatch macros for reducing code duplication

#[macro_use]
pub mod macros;
pub mod cursor;
pub mod dialect;
pub mod executor;
pub mod keys;
pub mod params;
pub mod pool;
pub mod types;

pub use cursor::{CursorState, DbRow, RowCursor};
pub use dialect::{Dialect, KeyRetrieval, RenderedColumn, dialect_for};
pub use executor::{DatabaseAccess, QueryOne};
pub use keys::GeneratedKeyHolder;
pub use params::SqlArg;
pub use pool::DbPool;
pub use types::{ColumnType, TypeTag};
