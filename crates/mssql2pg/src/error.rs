//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] tiberius::error::Error),

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// A source column type with no mapping and no allow-listed fallback
    #[error("unknown data type: '{0}'")]
    UnknownType(String),

    /// Two source columns normalized to the same destination identifier
    #[error("Column name collision in table {table}: '{column}' after normalization")]
    DuplicateColumn { table: String, column: String },

    /// CREATE TABLE hit an existing table, meaning the preceding drop did
    /// not take effect. Masking this risks loading into stale data.
    #[error("Table {table} already exists on the destination - drop before create did not take effect")]
    DuplicateTable { table: String },

    /// CREATE TABLE failed for some other reason; carries the generated SQL
    /// so the operator can diagnose the statement directly.
    #[error("Failed to create table {table}: {source}\n  Generated SQL:\n{sql}")]
    TableCreate {
        table: String,
        sql: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// Data copy failed for a specific table
    #[error("Copy failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Source(_) => 3,
            MigrateError::Target(_)
            | MigrateError::DuplicateTable { .. }
            | MigrateError::TableCreate { .. } => 4,
            _ => 1,
        }
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
