//! SQL Server source operations: table listing, column introspection and
//! paged row reads.

use crate::config::ServerConfig;
use crate::error::Result;
use crate::target::{SqlNullType, SqlValue};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};
use uuid::Uuid;

/// One source column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumn {
    /// Column name, exactly as stored in the source catalog.
    pub name: String,

    /// Lowercased catalog data type name.
    pub data_type: String,

    /// `CHARACTER_MAXIMUM_LENGTH`; `Some(-1)` for max-typed columns,
    /// `None` for non-character types.
    pub max_length: Option<i32>,
}

/// Source read interface consumed by the orchestrator and the batch
/// copier. Methods take `&mut self`: one connection, sequential use.
#[async_trait]
pub trait SourceDb: Send {
    /// List base tables in `schema` matching the selection policy:
    /// name no longer than `max_name_len`, optionally starting with
    /// `prefix`. Ordered by name.
    async fn list_tables(
        &mut self,
        schema: &str,
        max_name_len: i32,
        prefix: Option<&str>,
    ) -> Result<Vec<String>>;

    /// Columns of one table in ordinal order.
    async fn table_columns(&mut self, schema: &str, table: &str) -> Result<Vec<SourceColumn>>;

    /// Read one page of rows in arbitrary but stable-enough order for a
    /// full single-pass scan. Returns fewer than `limit` rows (possibly
    /// zero) at the end of the table.
    async fn fetch_page(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[SourceColumn],
        offset: u64,
        limit: usize,
    ) -> Result<Vec<Vec<SqlValue>>>;
}

/// SQL Server source over a single tiberius connection.
pub struct SqlServerSource {
    client: Client<Compat<TcpStream>>,
}

impl SqlServerSource {
    /// Connect to one source database.
    pub async fn connect(config: &ServerConfig, database: &str) -> Result<Self> {
        let tds_config = build_config(config, database);

        let tcp = TcpStream::connect(tds_config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;
        tcp.set_nodelay(true).ok();

        let mut client = Client::connect(tds_config, tcp.compat_write()).await?;
        client.simple_query("SELECT 1").await?.into_row().await?;

        info!(
            "Connected to MSSQL: {}:{}/{}",
            config.host, config.port, database
        );

        Ok(Self { client })
    }

    /// Close the connection. Called on every job exit path.
    pub async fn close(self) {
        let _ = self.client.close().await;
    }
}

fn build_config(server: &ServerConfig, database: &str) -> Config {
    let mut config = Config::new();
    config.host(&server.host);
    config.port(server.port);
    config.database(database);
    config.authentication(AuthMethod::sql_server(&server.user, &server.password));

    match server.encrypt.to_lowercase().as_str() {
        "false" | "no" | "0" | "disable" => {
            config.encryption(EncryptionLevel::NotSupported);
        }
        _ => {
            if server.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        }
    }

    config
}

#[async_trait]
impl SourceDb for SqlServerSource {
    async fn list_tables(
        &mut self,
        schema: &str,
        max_name_len: i32,
        prefix: Option<&str>,
    ) -> Result<Vec<String>> {
        let sql = if prefix.is_some() {
            r#"
            SELECT TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_TYPE = 'BASE TABLE'
              AND TABLE_SCHEMA = @P1
              AND LEN(TABLE_NAME) <= @P2
              AND TABLE_NAME LIKE @P3
            ORDER BY TABLE_NAME
            "#
        } else {
            r#"
            SELECT TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_TYPE = 'BASE TABLE'
              AND TABLE_SCHEMA = @P1
              AND LEN(TABLE_NAME) <= @P2
            ORDER BY TABLE_NAME
            "#
        };

        let mut query = Query::new(sql);
        query.bind(schema);
        query.bind(max_name_len);
        if let Some(p) = prefix {
            query.bind(format!("{}%", escape_like(p)));
        }

        let stream = query.query(&mut self.client).await?;
        let rows = stream.into_first_result().await?;

        let tables: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get::<&str, _>(0).map(String::from))
            .collect();

        info!("Found {} tables in schema '{}'", tables.len(), schema);
        Ok(tables)
    }

    async fn table_columns(&mut self, schema: &str, table: &str) -> Result<Vec<SourceColumn>> {
        let sql = r#"
            SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2
            ORDER BY ORDINAL_POSITION
        "#;

        let mut query = Query::new(sql);
        query.bind(schema);
        query.bind(table);

        let stream = query.query(&mut self.client).await?;
        let rows = stream.into_first_result().await?;

        let columns: Vec<SourceColumn> = rows
            .iter()
            .map(|row| SourceColumn {
                name: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                data_type: row
                    .get::<&str, _>(1)
                    .unwrap_or_default()
                    .to_lowercase(),
                max_length: row.get::<i32, _>(2),
            })
            .collect();

        debug!("Loaded {} columns for {}.{}", columns.len(), schema, table);
        Ok(columns)
    }

    async fn fetch_page(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[SourceColumn],
        offset: u64,
        limit: usize,
    ) -> Result<Vec<Vec<SqlValue>>> {
        let col_list: String = columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");

        // ORDER BY (SELECT NULL) satisfies OFFSET/FETCH without imposing a
        // sort; a single pass reads every row exactly once.
        let sql = format!(
            "SELECT {} FROM {}.{} ORDER BY (SELECT NULL) \
             OFFSET @P1 ROWS FETCH NEXT @P2 ROWS ONLY",
            col_list,
            quote_ident(schema),
            quote_ident(table)
        );

        let mut query = Query::new(sql);
        query.bind(offset as i64);
        query.bind(limit as i64);

        let stream = query.query(&mut self.client).await?;
        let rows = stream.into_first_result().await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(columns.len());
            for (idx, col) in columns.iter().enumerate() {
                values.push(convert_row_value(row, idx, &col.data_type));
            }
            result.push(values);
        }

        debug!(
            "Fetched {} rows from {}.{} at offset {}",
            result.len(),
            schema,
            table,
            offset
        );
        Ok(result)
    }
}

/// Quote a SQL Server identifier with brackets.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Escape LIKE wildcards in a literal prefix.
fn escape_like(s: &str) -> String {
    s.replace('[', "[[]").replace('%', "[%]").replace('_', "[_]")
}

/// Convert one cell to a SqlValue based on the catalog column type.
fn convert_row_value(row: &Row, idx: usize, data_type: &str) -> SqlValue {
    match data_type {
        "bit" => row
            .get::<bool, _>(idx)
            .map(SqlValue::Bool)
            .unwrap_or(SqlValue::Null(SqlNullType::Bool)),
        "tinyint" => row
            .get::<u8, _>(idx)
            .map(|v| SqlValue::I16(v as i16))
            .unwrap_or(SqlValue::Null(SqlNullType::I16)),
        "smallint" => row
            .get::<i16, _>(idx)
            .map(SqlValue::I16)
            .unwrap_or(SqlValue::Null(SqlNullType::I16)),
        "int" => row
            .get::<i32, _>(idx)
            .map(SqlValue::I32)
            .unwrap_or(SqlValue::Null(SqlNullType::I32)),
        "bigint" => row
            .get::<i64, _>(idx)
            .map(SqlValue::I64)
            .unwrap_or(SqlValue::Null(SqlNullType::I64)),
        "real" => row
            .get::<f32, _>(idx)
            .map(SqlValue::F32)
            .unwrap_or(SqlValue::Null(SqlNullType::F32)),
        "float" => row
            .get::<f64, _>(idx)
            .map(SqlValue::F64)
            .unwrap_or(SqlValue::Null(SqlNullType::F64)),
        "uniqueidentifier" => row
            .get::<Uuid, _>(idx)
            .map(SqlValue::Uuid)
            .unwrap_or(SqlValue::Null(SqlNullType::Uuid)),
        "datetime" | "datetime2" | "smalldatetime" => row
            .get::<NaiveDateTime, _>(idx)
            .map(SqlValue::DateTime)
            .unwrap_or(SqlValue::Null(SqlNullType::DateTime)),
        "datetimeoffset" => row
            .get::<chrono::DateTime<chrono::FixedOffset>, _>(idx)
            .map(SqlValue::DateTimeOffset)
            .unwrap_or(SqlValue::Null(SqlNullType::DateTimeOffset)),
        // Tiberius returns date and time as NaiveDateTime; keep the part
        // the column actually holds.
        "date" => row
            .get::<NaiveDateTime, _>(idx)
            .map(|dt| SqlValue::Date(dt.date()))
            .unwrap_or(SqlValue::Null(SqlNullType::Date)),
        "time" => row
            .get::<NaiveDateTime, _>(idx)
            .map(|dt| SqlValue::Time(dt.time()))
            .unwrap_or(SqlValue::Null(SqlNullType::Time)),
        "binary" | "varbinary" | "image" | "timestamp" => row
            .get::<&[u8], _>(idx)
            .map(|v| SqlValue::Bytes(v.to_vec()))
            .unwrap_or(SqlValue::Null(SqlNullType::Bytes)),
        "decimal" | "numeric" | "money" | "smallmoney" => row
            .get::<&str, _>(idx)
            .and_then(|s| s.parse::<rust_decimal::Decimal>().ok())
            .map(SqlValue::Decimal)
            .or_else(|| {
                // Fallback for drivers that surface the value as float
                row.get::<f64, _>(idx).map(|f| {
                    rust_decimal::Decimal::try_from(f)
                        .map(SqlValue::Decimal)
                        .unwrap_or(SqlValue::F64(f))
                })
            })
            .unwrap_or(SqlValue::Null(SqlNullType::Decimal)),
        // varchar, nvarchar, char, nchar, text, ntext, xml and anything
        // else come across as strings.
        _ => row
            .get::<&str, _>(idx)
            .map(|s| SqlValue::String(s.to_string()))
            .unwrap_or(SqlValue::Null(SqlNullType::String)),
    }
}
