//! mssql2pg CLI - MSSQL to PostgreSQL schema translation and data copy.

use clap::{Parser, Subcommand};
use mssql2pg::{
    api, create_table_ddl, map_columns, normalize_ident, Config, MigrateError, Orchestrator,
    SourceDb, SqlServerSource,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "mssql2pg")]
#[command(about = "MSSQL to PostgreSQL schema translation and data copy")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all configured migration jobs
    Run,

    /// List the source tables the first job would migrate
    ListTables,

    /// Print the generated CREATE TABLE statements for the first job
    Ddl,

    /// Serve the diagnostic HTTP API against the first job's source
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run => {
            let orchestrator = Orchestrator::new(config);
            let summary = orchestrator.run().await?;

            if cli.output_json {
                println!("{}", summary.to_json()?);
            } else {
                println!("\nMigration completed!");
                println!("  Jobs: {}", summary.jobs.len());
                println!("  Tables: {}", summary.total_tables);
                println!("  Rows: {}", summary.total_rows);
                println!("  Duration: {:.2}s", summary.duration_secs);
            }
        }

        Commands::ListTables => {
            let (mut source, _job) = connect_first_source(&config).await?;
            let result = list_tables(&mut source, &config).await;
            source.close().await;
            let tables = result?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                for table in &tables {
                    println!("{}", table);
                }
            }
        }

        Commands::Ddl => {
            let (mut source, job) = connect_first_source(&config).await?;
            let result = generate_ddl(&mut source, &config, &job.target_schema).await;
            source.close().await;

            for ddl in result? {
                println!("{};\n", ddl);
            }
        }

        Commands::Serve { bind } => {
            let (source, _job) = connect_first_source(&config).await?;
            let state = api::ApiState {
                source: Arc::new(Mutex::new(source)),
                schema: config.migration.source_schema.clone(),
                max_table_name_len: config.migration.max_table_name_len,
                table_prefix: config.migration.table_prefix.clone(),
            };
            api::serve(state, &bind).await?;
        }
    }

    Ok(())
}

/// Connect to the first job's source database; the read-only commands
/// all operate against it.
async fn connect_first_source(
    config: &Config,
) -> Result<(SqlServerSource, mssql2pg::JobConfig), MigrateError> {
    let job = config
        .jobs
        .first()
        .cloned()
        .ok_or_else(|| MigrateError::Config("at least one job is required".into()))?;
    let server = config.source_server(&job.source_instance)?;
    let source = SqlServerSource::connect(server, &job.source_database).await?;
    Ok((source, job))
}

async fn list_tables(
    source: &mut SqlServerSource,
    config: &Config,
) -> Result<Vec<String>, MigrateError> {
    source
        .list_tables(
            &config.migration.source_schema,
            config.migration.max_table_name_len,
            config.migration.table_prefix.as_deref(),
        )
        .await
}

async fn generate_ddl(
    source: &mut SqlServerSource,
    config: &Config,
    target_schema: &str,
) -> Result<Vec<String>, MigrateError> {
    let tables = list_tables(source, config).await?;

    let mut statements = Vec::with_capacity(tables.len());
    for table in &tables {
        let columns = source
            .table_columns(&config.migration.source_schema, table)
            .await?;
        let mapped = map_columns(table, &columns)?;
        statements.push(create_table_ddl(
            target_schema,
            &normalize_ident(table),
            &mapped,
        ));
    }

    Ok(statements)
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
