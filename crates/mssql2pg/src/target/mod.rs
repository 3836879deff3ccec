//! PostgreSQL destination operations: table lifecycle and bulk inserts.

use crate::config::TargetServerConfig;
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use tokio_postgres::error::SqlState;
use tokio_postgres::{types::ToSql, Client, NoTls};
use tracing::{debug, info, warn};

/// Destination execution interface consumed by the orchestrator and the
/// batch copier. Methods take `&mut self`: one connection, sequential use.
#[async_trait]
pub trait TargetDb: Send {
    /// Create the destination schema if it does not exist. Idempotent,
    /// safe to call at job start.
    async fn ensure_schema(&mut self, schema: &str) -> Result<()>;

    /// Drop a destination table if it exists, cascading. Idempotent and
    /// committed immediately so a failed subsequent create cannot undo it.
    async fn drop_table(&mut self, schema: &str, table: &str) -> Result<()>;

    /// Execute generated CREATE TABLE text. A duplicate-table failure is
    /// fatal: it means the preceding drop did not take effect.
    async fn create_table(&mut self, table: &str, ddl: &str) -> Result<()>;

    /// Insert one page of rows with a multi-row parameterized INSERT,
    /// committed once per page. Returns the number of rows inserted.
    async fn insert_rows(
        &mut self,
        schema: &str,
        table: &str,
        cols: &[String],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<u64>;
}

/// SQL value enum for type-safe row handling between the two drivers.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(SqlNullType),
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Decimal(rust_decimal::Decimal),
    DateTime(chrono::NaiveDateTime),
    DateTimeOffset(chrono::DateTime<chrono::FixedOffset>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
}

/// Type hint for NULL values so every placeholder gets a concrete cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlNullType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Decimal,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
}

/// PostgreSQL destination over a single tokio-postgres connection.
pub struct PgTarget {
    client: Client,
    conn_task: tokio::task::JoinHandle<()>,
}

impl PgTarget {
    /// Connect to one destination database.
    pub async fn connect(config: &TargetServerConfig, database: &str) -> Result<Self> {
        let conn_string = config.connection_string(database);
        let (client, connection) = tokio_postgres::connect(&conn_string, NoTls).await?;

        let db = database.to_string();
        let conn_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("PostgreSQL connection to {} closed with error: {}", db, e);
            }
        });

        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, database
        );

        Ok(Self { client, conn_task })
    }

    /// Close the connection. Called on every job exit path.
    pub async fn close(self) {
        drop(self.client);
        let _ = self.conn_task.await;
    }
}

#[async_trait]
impl TargetDb for PgTarget {
    async fn ensure_schema(&mut self, schema: &str) -> Result<()> {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema));
        self.client.execute(&sql, &[]).await?;

        debug!("Ensured schema '{}'", schema);
        Ok(())
    }

    async fn drop_table(&mut self, schema: &str, table: &str) -> Result<()> {
        // Runs outside any transaction, so the drop commits immediately.
        let sql = format!(
            "DROP TABLE IF EXISTS {} CASCADE",
            qualify_table(schema, table)
        );
        self.client.execute(&sql, &[]).await?;

        info!("Dropped table {}.{}", schema, table);
        Ok(())
    }

    async fn create_table(&mut self, table: &str, ddl: &str) -> Result<()> {
        if let Err(e) = self.client.batch_execute(ddl).await {
            if e.code() == Some(&SqlState::DUPLICATE_TABLE) {
                return Err(MigrateError::DuplicateTable {
                    table: table.to_string(),
                });
            }
            return Err(MigrateError::TableCreate {
                table: table.to_string(),
                sql: ddl.to_string(),
                source: e,
            });
        }

        debug!("Created table {}", table);
        Ok(())
    }

    async fn insert_rows(
        &mut self,
        schema: &str,
        table: &str,
        cols: &[String],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        // Stay under the wire protocol's 65535 bind-parameter limit.
        let max_rows_per_stmt = (60_000 / cols.len().max(1)).max(1);

        let tx = self.client.transaction().await?;
        let mut total = 0u64;

        for chunk in rows.chunks(max_rows_per_stmt) {
            let (sql, params) = build_insert_sql(schema, table, cols, chunk);
            let param_refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();
            total += tx.execute(&sql, &param_refs).await?;
        }

        tx.commit().await?;
        Ok(total)
    }
}

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Fully qualify a table name.
pub fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Get the SQL cast suffix for a value so string-encoded parameters land
/// in the right destination type.
fn sql_cast_for_value(value: &SqlValue) -> &'static str {
    let null_type = match value {
        SqlValue::Bool(_) => SqlNullType::Bool,
        SqlValue::I16(_) => SqlNullType::I16,
        SqlValue::I32(_) => SqlNullType::I32,
        SqlValue::I64(_) => SqlNullType::I64,
        SqlValue::F32(_) => SqlNullType::F32,
        SqlValue::F64(_) => SqlNullType::F64,
        SqlValue::String(_) => SqlNullType::String,
        SqlValue::Bytes(_) => SqlNullType::Bytes,
        SqlValue::Uuid(_) => SqlNullType::Uuid,
        SqlValue::Decimal(_) => SqlNullType::Decimal,
        SqlValue::DateTime(_) => SqlNullType::DateTime,
        SqlValue::DateTimeOffset(_) => SqlNullType::DateTimeOffset,
        SqlValue::Date(_) => SqlNullType::Date,
        SqlValue::Time(_) => SqlNullType::Time,
        SqlValue::Null(t) => *t,
    };

    match null_type {
        SqlNullType::Bool => "::boolean",
        SqlNullType::I16 => "::smallint",
        SqlNullType::I32 => "::integer",
        SqlNullType::I64 => "::bigint",
        SqlNullType::F32 => "::real",
        SqlNullType::F64 => "::double precision",
        SqlNullType::String => "::text",
        SqlNullType::Bytes => "::bytea",
        SqlNullType::Uuid => "::uuid",
        SqlNullType::Decimal => "::numeric",
        SqlNullType::DateTime => "::timestamp",
        SqlNullType::DateTimeOffset => "::timestamptz",
        SqlNullType::Date => "::date",
        SqlNullType::Time => "::time",
    }
}

/// Convert a SqlValue to a boxed parameter. All values are encoded as
/// strings and cast server-side via the suffix from [`sql_cast_for_value`].
fn sql_value_to_param(value: &SqlValue) -> Box<dyn ToSql + Sync + Send> {
    match value {
        SqlValue::Null(_) => Box::new(None::<String>),
        SqlValue::Bool(b) => Box::new(if *b { "t" } else { "f" }.to_string()),
        SqlValue::I16(n) => Box::new(n.to_string()),
        SqlValue::I32(n) => Box::new(n.to_string()),
        SqlValue::I64(n) => Box::new(n.to_string()),
        SqlValue::F32(n) => Box::new(n.to_string()),
        SqlValue::F64(n) => Box::new(n.to_string()),
        SqlValue::String(s) => Box::new(s.clone()),
        SqlValue::Bytes(b) => Box::new(format!("\\x{}", hex::encode(b))),
        SqlValue::Uuid(u) => Box::new(u.to_string()),
        SqlValue::Decimal(d) => Box::new(d.to_string()),
        SqlValue::DateTime(dt) => Box::new(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        SqlValue::DateTimeOffset(dt) => Box::new(dt.to_rfc3339()),
        SqlValue::Date(d) => Box::new(d.to_string()),
        SqlValue::Time(t) => Box::new(t.to_string()),
    }
}

/// Build a multi-row parameterized INSERT (psycopg2 `execute_values`
/// equivalent): values are bind parameters, identifiers go through the
/// quoting helper.
fn build_insert_sql(
    schema: &str,
    table: &str,
    cols: &[String],
    rows: &[Vec<SqlValue>],
) -> (String, Vec<Box<dyn ToSql + Sync + Send>>) {
    let col_list: String = cols
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    // Column casts come from the first row; all rows share one shape.
    let col_casts: Vec<&'static str> = rows
        .first()
        .map(|row| row.iter().map(sql_cast_for_value).collect())
        .unwrap_or_default();

    let mut placeholders = Vec::with_capacity(rows.len());
    let mut params: Vec<Box<dyn ToSql + Sync + Send>> =
        Vec::with_capacity(rows.len() * cols.len());
    let mut idx = 1;

    for row in rows {
        let row_placeholders: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(col_idx, value)| {
                let p = format!("${}", idx);
                idx += 1;
                let cast = col_casts
                    .get(col_idx)
                    .copied()
                    .unwrap_or_else(|| sql_cast_for_value(value));
                format!("{}{}", p, cast)
            })
            .collect();
        placeholders.push(format!("({})", row_placeholders.join(", ")));

        for value in row {
            params.push(sql_value_to_param(value));
        }
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualify_table(schema, table),
        col_list,
        placeholders.join(", ")
    );

    (sql, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_qualify_table() {
        assert_eq!(qualify_table("br", "sfnh135"), "\"br\".\"sfnh135\"");
    }

    #[test]
    fn test_build_insert_sql_shape() {
        let cols = vec!["id".to_string(), "name".to_string()];
        let rows = vec![
            vec![SqlValue::I32(1), SqlValue::String("a".into())],
            vec![SqlValue::I32(2), SqlValue::Null(SqlNullType::String)],
        ];
        let (sql, params) = build_insert_sql("br", "t1", &cols, &rows);
        assert_eq!(
            sql,
            "INSERT INTO \"br\".\"t1\" (\"id\", \"name\") VALUES \
             ($1::integer, $2::text), ($3::integer, $4::text)"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_insert_params_cross_await_points() {
        // The parameter vector lives across the execute await, so the
        // boxed values must be Send for the insert future to be Send.
        fn require_send<T: Send>(_: &T) {}
        let cols = vec!["id".to_string()];
        let rows = vec![vec![SqlValue::I32(1)]];
        let (_, params) = build_insert_sql("s", "t", &cols, &rows);
        require_send(&params);
    }

    #[test]
    fn test_cast_follows_first_row_on_null() {
        // A NULL in the first row still gets the typed cast from its hint.
        let cols = vec!["amt".to_string()];
        let rows = vec![
            vec![SqlValue::Null(SqlNullType::Decimal)],
            vec![SqlValue::Decimal(rust_decimal::Decimal::new(1234, 2))],
        ];
        let (sql, _) = build_insert_sql("s", "t", &cols, &rows);
        assert!(sql.contains("$1::numeric"));
        assert!(sql.contains("$2::numeric"));
    }
}
