//! # mssql2pg
//!
//! SQL Server to PostgreSQL schema-translation and batched-copy library.
//!
//! The library migrates a named selection of tables from a SQL Server
//! source into a PostgreSQL destination, one job at a time:
//!
//! - **Identifier normalization** into destination-safe names
//! - **Type mapping** from SQL Server types to PostgreSQL types
//! - **Drop-then-create DDL** generated from the source catalog
//! - **Batched row copy** with NUL sanitization and per-table exclusion
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql2pg::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> mssql2pg::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let summary = Orchestrator::new(config).run().await?;
//!     println!("Migrated {} rows", summary.total_rows);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod copy;
pub mod ddl;
pub mod error;
pub mod ident;
pub mod orchestrator;
pub mod source;
pub mod target;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, JobConfig, MigrationSettings, ServerConfig, TargetServerConfig};
pub use copy::{copy_table, CopySettings, CopyStats};
pub use ddl::{create_table_ddl, map_columns, MappedColumn};
pub use error::{MigrateError, Result};
pub use ident::normalize_ident;
pub use orchestrator::{migrate_tables, JobStats, MigrationSummary, Orchestrator};
pub use source::{SourceColumn, SourceDb, SqlServerSource};
pub use target::{PgTarget, SqlNullType, SqlValue, TargetDb};
pub use typemap::map_type;
