//! Error types for database access.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Every failed operation surfaces exactly one `DbError`; the variants follow the
//! stages a statement goes through (binding, execution, key extraction, cursor use).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Bind error: {message}")]
    Bind { message: String },

    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        /// e.g., "23505" for a unique violation
        sql_state: Option<String>,
        statement: String,
        suggestion: String,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("No generated key results returned from insert: {statement}")]
    NoGeneratedKeys { statement: String },

    #[error(
        "Generated column '{column}' has type {column_type} (SQL type {sql_type_id}) which is not an integer key"
    )]
    InvalidKeyType {
        column: String,
        column_type: String,
        sql_type_id: i32,
    },

    #[error("Unknown SQL type id: {sql_type_id}")]
    UnknownType { sql_type_id: i32 },

    #[error("No results returned in single-result query: {statement}")]
    NoResult { statement: String },

    #[error("More than one result returned in single-result query: {statement}")]
    AmbiguousResult { statement: String },

    #[error("Type mismatch at column {index}: expected {expected}, found {actual}")]
    TypeMismatch {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("Cursor is closed: {reason}")]
    CursorClosed { reason: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl DbError {
    /// Create a bind error.
    pub fn bind(message: impl Into<String>) -> Self {
        Self::Bind {
            message: message.into(),
        }
    }

    /// Wrap an engine error raised while running `statement`.
    pub fn execution(statement: impl Into<String>, err: sqlx::Error) -> Self {
        let statement = statement.into();
        match err {
            sqlx::Error::Database(db_err) => Self::Execution {
                message: db_err.message().to_string(),
                sql_state: db_err.code().map(|c| c.to_string()),
                statement,
                suggestion: "Check the SQL syntax, referenced objects and constraints".to_string(),
            },
            sqlx::Error::Io(io_err) => Self::Execution {
                message: format!("I/O error: {}", io_err),
                sql_state: None,
                statement,
                suggestion: "Check network connectivity and database server status".to_string(),
            },
            other => Self::Execution {
                message: other.to_string(),
                sql_state: None,
                statement,
                suggestion: "Inspect the underlying driver error".to_string(),
            },
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a missing generated keys error.
    pub fn no_generated_keys(statement: impl Into<String>) -> Self {
        Self::NoGeneratedKeys {
            statement: statement.into(),
        }
    }

    /// Create an invalid key type error.
    pub fn invalid_key_type(
        column: impl Into<String>,
        column_type: impl Into<String>,
        sql_type_id: i32,
    ) -> Self {
        Self::InvalidKeyType {
            column: column.into(),
            column_type: column_type.into(),
            sql_type_id,
        }
    }

    /// Create an unknown type error.
    pub fn unknown_type(sql_type_id: i32) -> Self {
        Self::UnknownType { sql_type_id }
    }

    /// Create a no result error.
    pub fn no_result(statement: impl Into<String>) -> Self {
        Self::NoResult {
            statement: statement.into(),
        }
    }

    /// Create an ambiguous result error.
    pub fn ambiguous_result(statement: impl Into<String>) -> Self {
        Self::AmbiguousResult {
            statement: statement.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(index: usize, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            index,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a cursor closed error.
    pub fn cursor_closed(reason: impl Into<String>) -> Self {
        Self::CursorClosed {
            reason: reason.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Execution { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    ///
    /// Nothing here retries on its own; only the caller knows whether a failed
    /// statement is safe to resubmit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Convert sqlx errors raised outside of a specific statement (pool acquire,
/// transaction begin/commit).
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out acquiring a connection from the pool",
                "Increase acquire_timeout or max_connections",
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::type_mismatch(
                index,
                format!("a column index below {}", len),
                "out of bounds",
            ),
            other => DbError::execution("", other),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
