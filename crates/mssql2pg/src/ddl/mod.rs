//! CREATE TABLE generation for the destination.

use crate::error::{MigrateError, Result};
use crate::ident::normalize_ident;
use crate::source::SourceColumn;
use crate::target::{qualify_table, quote_ident};
use crate::typemap::map_type;
use std::collections::HashSet;

/// A source column resolved to its destination name and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedColumn {
    /// Source column name, as the catalog reports it.
    pub source_name: String,

    /// Normalized destination column name.
    pub dest_name: String,

    /// Destination type expression, length included where applicable.
    pub pg_type: String,
}

/// Map a table's columns to their destination names and types.
///
/// Fails on the first unmappable type and on destination-name collisions
/// (two source names normalizing to the same identifier would silently
/// merge columns).
pub fn map_columns(table: &str, columns: &[SourceColumn]) -> Result<Vec<MappedColumn>> {
    let mut seen = HashSet::new();
    let mut mapped = Vec::with_capacity(columns.len());

    for col in columns {
        let dest_name = normalize_ident(&col.name);
        if !seen.insert(dest_name.clone()) {
            return Err(MigrateError::DuplicateColumn {
                table: table.to_string(),
                column: dest_name,
            });
        }

        let pg_type = map_type(&col.data_type, col.max_length)?;
        mapped.push(MappedColumn {
            source_name: col.name.clone(),
            dest_name,
            pg_type,
        });
    }

    Ok(mapped)
}

/// Generate CREATE TABLE text for the destination. All columns are
/// nullable: the copy engine owns correctness, not the destination schema.
pub fn create_table_ddl(schema: &str, table: &str, columns: &[MappedColumn]) -> String {
    let col_defs: Vec<String> = columns
        .iter()
        .map(|c| format!("    {} {}", quote_ident(&c.dest_name), c.pg_type))
        .collect();

    format!(
        "CREATE TABLE {} (\n{}\n)",
        qualify_table(schema, table),
        col_defs.join(",\n")
    )
}

/// Destination column names, in source ordinal order.
pub fn dest_column_names(columns: &[MappedColumn]) -> Vec<String> {
    columns.iter().map(|c| c.dest_name.clone()).collect()
}
