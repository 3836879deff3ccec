//! End-to-end migration flow tests over mock databases.

use async_trait::async_trait;
use mssql2pg::{
    copy_table, migrate_tables, CopySettings, JobConfig, MigrationSettings, Result, SourceColumn,
    SourceDb, SqlNullType, SqlValue, TargetDb,
};
use std::collections::HashMap;

fn col(name: &str, data_type: &str, max_length: Option<i32>) -> SourceColumn {
    SourceColumn {
        name: name.to_string(),
        data_type: data_type.to_string(),
        max_length,
    }
}

/// In-memory source: fixed tables, columns and rows, with paging over
/// the row vectors and a record of every fetch offset.
#[derive(Default)]
struct MockSource {
    tables: Vec<String>,
    columns: HashMap<String, Vec<SourceColumn>>,
    rows: HashMap<String, Vec<Vec<SqlValue>>>,
    fetch_offsets: Vec<u64>,
}

#[async_trait]
impl SourceDb for MockSource {
    async fn list_tables(
        &mut self,
        _schema: &str,
        max_name_len: i32,
        prefix: Option<&str>,
    ) -> Result<Vec<String>> {
        Ok(self
            .tables
            .iter()
            .filter(|t| t.len() as i32 <= max_name_len)
            .filter(|t| prefix.map_or(true, |p| t.starts_with(p)))
            .cloned()
            .collect())
    }

    async fn table_columns(&mut self, _schema: &str, table: &str) -> Result<Vec<SourceColumn>> {
        Ok(self.columns.get(table).cloned().unwrap_or_default())
    }

    async fn fetch_page(
        &mut self,
        _schema: &str,
        table: &str,
        _columns: &[SourceColumn],
        offset: u64,
        limit: usize,
    ) -> Result<Vec<Vec<SqlValue>>> {
        self.fetch_offsets.push(offset);
        let rows = self.rows.get(table).cloned().unwrap_or_default();
        let start = (offset as usize).min(rows.len());
        let end = (start + limit).min(rows.len());
        Ok(rows[start..end].to_vec())
    }
}

/// In-memory target recording the order of operations and the rows it
/// received.
#[derive(Default)]
struct MockTarget {
    ops: Vec<String>,
    ddls: Vec<String>,
    inserted: HashMap<String, Vec<Vec<SqlValue>>>,
}

#[async_trait]
impl TargetDb for MockTarget {
    async fn ensure_schema(&mut self, schema: &str) -> Result<()> {
        self.ops.push(format!("ensure_schema {}", schema));
        Ok(())
    }

    async fn drop_table(&mut self, _schema: &str, table: &str) -> Result<()> {
        self.ops.push(format!("drop {}", table));
        Ok(())
    }

    async fn create_table(&mut self, table: &str, ddl: &str) -> Result<()> {
        self.ops.push(format!("create {}", table));
        self.ddls.push(ddl.to_string());
        Ok(())
    }

    async fn insert_rows(
        &mut self,
        _schema: &str,
        table: &str,
        _cols: &[String],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<u64> {
        let n = rows.len() as u64;
        self.ops.push(format!("insert {} {}", table, n));
        self.inserted
            .entry(table.to_string())
            .or_default()
            .extend(rows);
        Ok(n)
    }
}

fn job() -> JobConfig {
    JobConfig {
        source_database: "CONFEF_SOP".to_string(),
        target_database: "efcontrol_contratos".to_string(),
        target_schema: "br".to_string(),
        source_instance: "BD02".to_string(),
        copy_data: true,
    }
}

fn settings() -> MigrationSettings {
    MigrationSettings {
        source_schema: "dbo".to_string(),
        max_table_name_len: 7,
        table_prefix: Some("SF".to_string()),
        batch_size: 1000,
        exclude_tables: Vec::new(),
    }
}

fn int_rows(n: usize) -> Vec<Vec<SqlValue>> {
    (0..n).map(|i| vec![SqlValue::I32(i as i32)]).collect()
}

#[tokio::test]
async fn copies_every_row_across_pages() {
    let mut source = MockSource {
        tables: vec!["SFNH001".to_string()],
        columns: HashMap::from([("SFNH001".to_string(), vec![col("ID", "int", None)])]),
        rows: HashMap::from([("SFNH001".to_string(), int_rows(12_500))]),
        ..MockSource::default()
    };
    let mut target = MockTarget::default();

    let columns = vec![col("ID", "int", None)];
    let mapped = mssql2pg::map_columns("SFNH001", &columns).unwrap();
    let stats = copy_table(
        &mut source,
        &mut target,
        "dbo",
        "br",
        "SFNH001",
        "sfnh001",
        &columns,
        &mapped,
        &CopySettings {
            batch_size: 5_000,
            exclude_tables: Vec::new(),
        },
    )
    .await
    .unwrap();

    assert_eq!(stats.rows, 12_500);
    assert_eq!(stats.pages, 3);
    assert!(!stats.skipped);
    // Three full/partial pages plus the empty read that ends the scan.
    assert_eq!(source.fetch_offsets, vec![0, 5_000, 10_000, 12_500]);
    assert_eq!(target.inserted["sfnh001"].len(), 12_500);
}

#[tokio::test]
async fn strips_nul_bytes_before_insert() {
    let mut source = MockSource {
        rows: HashMap::from([(
            "SFNH002".to_string(),
            vec![
                vec![SqlValue::String("ok".to_string())],
                vec![SqlValue::String("bro\0ken\0".to_string())],
                vec![SqlValue::Null(SqlNullType::String)],
            ],
        )]),
        ..MockSource::default()
    };
    let mut target = MockTarget::default();

    let columns = vec![col("NOME", "nvarchar", Some(50))];
    let mapped = mssql2pg::map_columns("SFNH002", &columns).unwrap();
    copy_table(
        &mut source,
        &mut target,
        "dbo",
        "br",
        "SFNH002",
        "sfnh002",
        &columns,
        &mapped,
        &CopySettings {
            batch_size: 1000,
            exclude_tables: Vec::new(),
        },
    )
    .await
    .unwrap();

    let inserted = &target.inserted["sfnh002"];
    assert_eq!(inserted[0][0], SqlValue::String("ok".to_string()));
    assert_eq!(inserted[1][0], SqlValue::String("broken".to_string()));
    assert_eq!(inserted[2][0], SqlValue::Null(SqlNullType::String));
}

#[tokio::test]
async fn excluded_table_is_created_but_never_read() {
    let mut source = MockSource {
        tables: vec!["SFNH135".to_string()],
        columns: HashMap::from([("SFNH135".to_string(), vec![col("ID", "int", None)])]),
        rows: HashMap::from([("SFNH135".to_string(), int_rows(10))]),
        ..MockSource::default()
    };
    let mut target = MockTarget::default();

    let mut settings = settings();
    settings.exclude_tables = vec!["SFNH135".to_string()];

    let stats = migrate_tables(&mut source, &mut target, &job(), &settings)
        .await
        .unwrap();

    assert_eq!(stats.tables_created, 1);
    assert_eq!(stats.tables_excluded, 1);
    assert_eq!(stats.rows_copied, 0);
    // The table was still dropped and recreated.
    assert!(target.ops.contains(&"drop sfnh135".to_string()));
    assert!(target.ops.contains(&"create sfnh135".to_string()));
    // But its data was never touched.
    assert!(source.fetch_offsets.is_empty());
    assert!(!target.inserted.contains_key("sfnh135"));
}

#[tokio::test]
async fn drops_strictly_before_creating() {
    let mut source = MockSource {
        tables: vec!["SFNH003".to_string(), "SFNH004".to_string()],
        columns: HashMap::from([
            ("SFNH003".to_string(), vec![col("ID", "int", None)]),
            ("SFNH004".to_string(), vec![col("ID", "int", None)]),
        ]),
        ..MockSource::default()
    };
    let mut target = MockTarget::default();

    migrate_tables(&mut source, &mut target, &job(), &settings())
        .await
        .unwrap();

    assert_eq!(target.ops[0], "ensure_schema br");
    for table in ["sfnh003", "sfnh004"] {
        let drop_pos = target.ops.iter().position(|o| o == &format!("drop {}", table));
        let create_pos = target
            .ops
            .iter()
            .position(|o| o == &format!("create {}", table));
        assert!(drop_pos.unwrap() < create_pos.unwrap());
    }
}

#[tokio::test]
async fn copy_data_false_recreates_tables_empty() {
    let mut source = MockSource {
        tables: vec!["SFNH005".to_string()],
        columns: HashMap::from([("SFNH005".to_string(), vec![col("ID", "int", None)])]),
        rows: HashMap::from([("SFNH005".to_string(), int_rows(42))]),
        ..MockSource::default()
    };
    let mut target = MockTarget::default();

    let mut job = job();
    job.copy_data = false;

    let stats = migrate_tables(&mut source, &mut target, &job, &settings())
        .await
        .unwrap();

    assert_eq!(stats.tables_created, 1);
    assert_eq!(stats.rows_copied, 0);
    assert!(source.fetch_offsets.is_empty());
    assert!(target.ops.contains(&"create sfnh005".to_string()));
}

#[tokio::test]
async fn selection_policy_filters_by_length_and_prefix() {
    let mut source = MockSource {
        tables: vec![
            "SFNH001".to_string(),
            "SFNH00123".to_string(), // too long
            "ZZNH001".to_string(),   // wrong prefix
        ],
        columns: HashMap::from([("SFNH001".to_string(), vec![col("ID", "int", None)])]),
        ..MockSource::default()
    };
    let mut target = MockTarget::default();

    let stats = migrate_tables(&mut source, &mut target, &job(), &settings())
        .await
        .unwrap();

    assert_eq!(stats.tables_created, 1);
    assert_eq!(target.ddls.len(), 1);
    assert!(target.ddls[0].contains("\"sfnh001\""));
}

#[tokio::test]
async fn generates_translated_ddl_and_copies_values() {
    let mut source = MockSource {
        tables: vec!["SFNH135".to_string()],
        columns: HashMap::from([(
            "SFNH135".to_string(),
            vec![
                col("Num Registro", "int", None),
                col("NOME", "nvarchar", Some(50)),
                col("Valor Pago", "money", None),
            ],
        )]),
        rows: HashMap::from([(
            "SFNH135".to_string(),
            vec![vec![
                SqlValue::I32(1),
                SqlValue::String("Maria".to_string()),
                SqlValue::Decimal(rust_decimal::Decimal::new(123_450, 4)),
            ]],
        )]),
        ..MockSource::default()
    };
    let mut target = MockTarget::default();

    let stats = migrate_tables(&mut source, &mut target, &job(), &settings())
        .await
        .unwrap();

    assert_eq!(stats.tables_created, 1);
    assert_eq!(stats.rows_copied, 1);
    assert_eq!(
        target.ddls[0],
        "CREATE TABLE \"br\".\"sfnh135\" (\n\
         \x20   \"num_registro\" int,\n\
         \x20   \"nome\" varchar(50),\n\
         \x20   \"valor_pago\" numeric(19,4)\n)"
    );
    assert_eq!(
        target.inserted["sfnh135"][0],
        vec![
            SqlValue::I32(1),
            SqlValue::String("Maria".to_string()),
            SqlValue::Decimal(rust_decimal::Decimal::new(123_450, 4)),
        ]
    );
}

#[tokio::test]
async fn column_collision_aborts_before_ddl() {
    let mut source = MockSource {
        tables: vec!["SFNH006".to_string()],
        columns: HashMap::from([(
            "SFNH006".to_string(),
            vec![col("Data Base", "date", None), col("Data-Base", "date", None)],
        )]),
        ..MockSource::default()
    };
    let mut target = MockTarget::default();

    let err = migrate_tables(&mut source, &mut target, &job(), &settings())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        mssql2pg::MigrateError::DuplicateColumn { ref column, .. } if column == "data_base"
    ));
    // Nothing was dropped or created for the bad table.
    assert!(!target.ops.iter().any(|o| o.starts_with("drop")));
    assert!(target.ddls.is_empty());
}
