//! Error types for the dashboard.

use thiserror::Error;

/// Errors that can occur while loading, rendering, or serving the dashboard.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// An error originating from the PostgreSQL data source.
    #[cfg(feature = "web")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A CSV file could not be parsed into ranking rows.
    #[error("CSV error on line {line}: {message}")]
    Csv { line: usize, message: String },

    /// Reading a data file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration does not describe a usable data source.
    #[error("configuration error: {0}")]
    Config(String),

    /// The shared password could not be hashed or the stored hash is invalid.
    #[error("password hashing error: {0}")]
    PasswordHash(String),

    /// Chart or export rendering failed.
    #[error("render error: {0}")]
    Render(String),
}
