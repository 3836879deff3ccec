//! Batched row copy from source to destination.
//!
//! Tables are scanned once with offset pagination and written one page
//! per transaction, so an interrupted copy leaves whole pages, never
//! partial ones.

use crate::ddl::{dest_column_names, MappedColumn};
use crate::error::Result;
use crate::source::{SourceColumn, SourceDb};
use crate::target::{SqlValue, TargetDb};
use tracing::{debug, info};

/// Copy behavior settings.
#[derive(Debug, Clone)]
pub struct CopySettings {
    /// Rows per page.
    pub batch_size: usize,

    /// Source table names whose data is never copied.
    pub exclude_tables: Vec<String>,
}

/// Outcome of one table copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Rows written to the destination.
    pub rows: u64,

    /// Pages read from the source.
    pub pages: u64,

    /// True when the table was on the exclusion list and left empty.
    pub skipped: bool,
}

/// Copy all rows of one table. The destination table must already exist
/// and be empty; excluded tables are skipped without touching the source.
pub async fn copy_table(
    source: &mut dyn SourceDb,
    target: &mut dyn TargetDb,
    source_schema: &str,
    target_schema: &str,
    table: &str,
    dest_table: &str,
    columns: &[SourceColumn],
    mapped: &[MappedColumn],
    settings: &CopySettings,
) -> Result<CopyStats> {
    if settings.exclude_tables.iter().any(|t| t == table) {
        info!("Skipping data copy for excluded table {}", table);
        return Ok(CopyStats {
            skipped: true,
            ..CopyStats::default()
        });
    }

    let dest_cols = dest_column_names(mapped);
    let mut stats = CopyStats::default();
    let mut offset: u64 = 0;

    loop {
        let mut rows = source
            .fetch_page(source_schema, table, columns, offset, settings.batch_size)
            .await?;
        if rows.is_empty() {
            break;
        }

        let fetched = rows.len();
        for row in &mut rows {
            sanitize_row(row);
        }

        stats.rows += target
            .insert_rows(target_schema, dest_table, &dest_cols, rows)
            .await?;
        stats.pages += 1;

        // Advance by rows actually read; a short page under the limit
        // still means the scan is not necessarily done on all servers.
        offset += fetched as u64;

        debug!(
            "Copied page {} of {} ({} rows so far)",
            stats.pages, table, stats.rows
        );
    }

    info!(
        "Copied {} rows in {} pages from {} to {}.{}",
        stats.rows, stats.pages, table, target_schema, dest_table
    );
    Ok(stats)
}

/// Strip NUL bytes from string values; PostgreSQL text types reject them.
fn sanitize_row(row: &mut [SqlValue]) {
    for value in row {
        if let SqlValue::String(s) = value {
            if s.contains('\0') {
                *s = s.replace('\0', "");
            }
        }
    }
}
