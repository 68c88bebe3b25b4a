//! db-access library.
//!
//! Executes SQL statements with positional, typed arguments against SQLite,
//! PostgreSQL and MySQL, hands back generated keys, and renders table DDL
//! per engine through the `Dialect` abstraction.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::{DatabaseAccess, Dialect, QueryOne};
pub use error::{DbError, DbResult};
