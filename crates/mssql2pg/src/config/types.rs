//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Named SQL Server instances, keyed by the name jobs refer to.
    pub source_servers: std::collections::HashMap<String, ServerConfig>,

    /// PostgreSQL destination server.
    pub target: TargetServerConfig,

    /// Migration behavior settings.
    #[serde(default)]
    pub migration: MigrationSettings,

    /// Migration jobs, executed sequentially in order.
    pub jobs: Vec<JobConfig>,
}

/// A SQL Server source instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host.
    pub host: String,

    /// Server port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Encrypt connection (default: "true").
    #[serde(default = "default_true_string")]
    pub encrypt: String,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,
}

/// The PostgreSQL destination server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetServerConfig {
    /// Server host (hostname or unix socket directory).
    pub host: String,

    /// Server port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,
}

impl TargetServerConfig {
    /// Build a connection string for tokio-postgres against one database.
    pub fn connection_string(&self, database: &str) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, database, self.user, self.password
        )
    }
}

/// Migration behavior settings shared by all jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSettings {
    /// Source schema to introspect (default: "dbo").
    #[serde(default = "default_dbo_schema")]
    pub source_schema: String,

    /// Maximum table-name length for the selection policy (default: 7).
    #[serde(default = "default_max_name_len")]
    pub max_table_name_len: i32,

    /// Optional table-name prefix filter (e.g. "SF").
    #[serde(default)]
    pub table_prefix: Option<String>,

    /// Rows per copy page (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Source table names whose data must never be copied. Their
    /// destination tables are still created, just left empty.
    #[serde(default)]
    pub exclude_tables: Vec<String>,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            source_schema: default_dbo_schema(),
            max_table_name_len: default_max_name_len(),
            table_prefix: None,
            batch_size: default_batch_size(),
            exclude_tables: Vec::new(),
        }
    }
}

/// One migration job: a (source database, destination database) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Source database name on the SQL Server instance.
    pub source_database: String,

    /// Destination database name on the PostgreSQL server.
    pub target_database: String,

    /// Destination schema the tables are created in.
    pub target_schema: String,

    /// Which entry of `source_servers` to connect to.
    pub source_instance: String,

    /// Copy row data after creating the schema (default: true).
    /// When false the tables are still dropped and recreated, empty.
    #[serde(default = "default_true")]
    pub copy_data: bool,
}

// Default value functions for serde

fn default_mssql_port() -> u16 {
    1433
}

fn default_pg_port() -> u16 {
    5432
}

fn default_dbo_schema() -> String {
    "dbo".to_string()
}

fn default_max_name_len() -> i32 {
    7
}

fn default_batch_size() -> usize {
    1000
}

fn default_true_string() -> String {
    "true".to_string()
}

fn default_true() -> bool {
    true
}
