//! Job orchestration: runs each configured job end to end.

use crate::config::{Config, JobConfig, MigrationSettings};
use crate::copy::{copy_table, CopySettings};
use crate::ddl::{create_table_ddl, map_columns};
use crate::error::Result;
use crate::ident::normalize_ident;
use crate::source::{SourceDb, SqlServerSource};
use crate::target::{PgTarget, TargetDb};
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, warn};

/// Outcome of one migration job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    /// Source database the job read from.
    pub source_database: String,

    /// Destination database the job wrote to.
    pub target_database: String,

    /// Tables dropped and recreated.
    pub tables_created: usize,

    /// Rows copied across all tables.
    pub rows_copied: u64,

    /// Tables whose data was skipped via the exclusion list.
    pub tables_excluded: usize,
}

/// Outcome of a full run across all jobs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationSummary {
    pub jobs: Vec<JobStats>,
    pub total_tables: usize,
    pub total_rows: u64,
    pub duration_secs: f64,
}

impl MigrationSummary {
    /// Render the summary as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Migrate every selected table of one job: drop, recreate, then copy.
///
/// Takes the databases as trait objects so the flow is testable without
/// live servers. Table failures abort the job; earlier tables stay
/// migrated since each page commits independently.
pub async fn migrate_tables(
    source: &mut dyn SourceDb,
    target: &mut dyn TargetDb,
    job: &JobConfig,
    settings: &MigrationSettings,
) -> Result<JobStats> {
    let mut stats = JobStats {
        source_database: job.source_database.clone(),
        target_database: job.target_database.clone(),
        ..JobStats::default()
    };

    target.ensure_schema(&job.target_schema).await?;

    let tables = source
        .list_tables(
            &settings.source_schema,
            settings.max_table_name_len,
            settings.table_prefix.as_deref(),
        )
        .await?;

    let copy_settings = CopySettings {
        batch_size: settings.batch_size,
        exclude_tables: settings.exclude_tables.clone(),
    };

    for table in &tables {
        let dest_table = normalize_ident(table);
        info!(
            "Migrating {}.{} -> {}.{}",
            settings.source_schema, table, job.target_schema, dest_table
        );

        let columns = source.table_columns(&settings.source_schema, table).await?;
        let mapped = map_columns(table, &columns).map_err(|e| {
            error!("Schema mapping failed for table {}: {}", table, e);
            e
        })?;
        let ddl = create_table_ddl(&job.target_schema, &dest_table, &mapped);

        // Drop strictly before create; both commit on their own.
        target.drop_table(&job.target_schema, &dest_table).await?;
        target.create_table(&dest_table, &ddl).await?;
        stats.tables_created += 1;

        if !job.copy_data {
            continue;
        }

        let copy_stats = copy_table(
            source,
            target,
            &settings.source_schema,
            &job.target_schema,
            table,
            &dest_table,
            &columns,
            &mapped,
            &copy_settings,
        )
        .await?;

        stats.rows_copied += copy_stats.rows;
        if copy_stats.skipped {
            stats.tables_excluded += 1;
        }
    }

    info!(
        "Job {} -> {} done: {} tables, {} rows",
        job.source_database, job.target_database, stats.tables_created, stats.rows_copied
    );
    Ok(stats)
}

/// Runs all configured jobs sequentially.
pub struct Orchestrator {
    config: Config,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run every job in order. Stops at the first failing job.
    pub async fn run(&self) -> Result<MigrationSummary> {
        let started = Instant::now();
        let mut summary = MigrationSummary::default();

        for job in &self.config.jobs {
            let stats = self.run_job(job).await?;
            summary.total_tables += stats.tables_created;
            summary.total_rows += stats.rows_copied;
            summary.jobs.push(stats);
        }

        summary.duration_secs = started.elapsed().as_secs_f64();
        info!(
            "Migration finished: {} jobs, {} tables, {} rows in {:.1}s",
            summary.jobs.len(),
            summary.total_tables,
            summary.total_rows,
            summary.duration_secs
        );
        Ok(summary)
    }

    /// Run one job, closing both connections on every exit path.
    async fn run_job(&self, job: &JobConfig) -> Result<JobStats> {
        let server = self.config.source_server(&job.source_instance)?;

        let mut source = SqlServerSource::connect(server, &job.source_database).await?;

        let mut target = match PgTarget::connect(&self.config.target, &job.target_database).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        let result = migrate_tables(&mut source, &mut target, job, &self.config.migration).await;

        source.close().await;
        target.close().await;

        if let Err(ref e) = result {
            warn!(
                "Job {} -> {} failed: {}",
                job.source_database, job.target_database, e
            );
        }
        result
    }
}
