//! db-access - Main entry point.
//!
//! Renders the DDL for a JSON table definition in the chosen SQL dialect
//! and, with `--apply`, runs it against the configured database.

use db_access::config::Config;
use db_access::db::dialect::{build_create_table, build_drop_table};
use db_access::db::{DatabaseAccess, DbPool, dialect_for};
use db_access::models::TableDefinition;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries the rendered statements.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    let db_type = config.target_database_type()?;
    let dialect = dialect_for(db_type);

    let definition = std::fs::read_to_string(&config.table)
        .map_err(|e| format!("Cannot read {}: {}", config.table.display(), e))?;
    let table = TableDefinition::from_json(&definition)?;

    info!(
        table = %table.name,
        dialect = %db_type,
        columns = table.columns.len(),
        "Rendering table"
    );

    let mut statements = Vec::new();
    if config.recreate {
        statements.extend(build_drop_table(dialect, &table, true));
    }
    statements.extend(build_create_table(dialect, &table)?);

    for statement in &statements {
        println!("{};", statement);
    }

    if !config.apply {
        return Ok(());
    }

    let Some(database) = config.parse_database()? else {
        return Err("--apply needs --database".into());
    };
    let connection = database.into_connection_config("apply")?;
    let pool = DbPool::connect(&connection).await?;
    if let Some(version) = pool.server_version().await {
        info!(version = %version, "Applying statements");
    }

    let access = DatabaseAccess::new(pool.clone(), dialect)?;
    for statement in &statements {
        if let Err(e) = access.execute(statement, &[], &[]).await {
            error!(error = %e, statement = %statement, "Statement failed");
            pool.close().await;
            return Err(e.into());
        }
    }
    pool.close().await;

    info!(count = statements.len(), table = %table.name, "Table created");
    Ok(())
}
