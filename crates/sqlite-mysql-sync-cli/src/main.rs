//! sqlite-mysql-sync CLI - mirror every SQLite table into MySQL.

use clap::{Parser, Subcommand};
use sqlite_mysql_sync::{CommandTrigger, Config, FetchTrigger, MigrateError, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "sqlite-mysql-sync")]
#[command(about = "Schema-agnostic SQLite to MySQL upsert synchronization")]
#[command(version)]
struct Cli {
    /// Path to configuration file (YAML, or legacy key=value)
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
    /// Synchronize all tables
    Run {
        /// Run the configured fetch step first
        #[arg(long)]
        fetch: bool,

        /// Override number of workers
        #[arg(long)]
        workers: Option<usize>,

        /// Dry run: introspect and resolve keys without writing to the target
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate row counts between source and target
    Validate,

    /// Test database connections
    HealthCheck,

    /// Show resolved keys and target DDL for each table
    Plan,
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

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            fetch,
            workers,
            dry_run,
        } => {
            if let Some(w) = workers {
                config.migration.workers = Some(w);
                config.validate()?;
            }

            if fetch {
                let fetch_config = config.fetch.clone().ok_or_else(|| {
                    MigrateError::Config("--fetch given but no fetch section configured".into())
                })?;
                CommandTrigger::new(fetch_config).fetch().await?;
            }

            // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
            let cancel_token = setup_signal_handler();

            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.run(cancel_token, dry_run).await?;
            orchestrator.close().await;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                let status_msg = if dry_run { "Dry run completed!" } else { "Sync completed!" };
                println!("\n{}", status_msg);
                println!("  Run ID: {}", result.run_id);
                println!("  Status: {}", result.status);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!(
                    "  Tables: {} synced, {} skipped, {} failed (of {})",
                    result.tables_success,
                    result.tables_skipped,
                    result.tables_failed,
                    result.tables_total
                );
                println!(
                    "  Rows: {} inserted, {} updated, {} unchanged",
                    result.rows_inserted, result.rows_updated, result.rows_unchanged
                );
                if result.rows_null_key > 0 {
                    println!("  Rows skipped for a NULL key: {}", result.rows_null_key);
                }
                if !result.failed_tables.is_empty() {
                    println!("  Failed tables: {:?}", result.failed_tables);
                }
            }

            if result.status == "cancelled" {
                return Err(MigrateError::Cancelled);
            }
            if result.has_errors() {
                return Err(MigrateError::transfer(
                    result.failed_tables.join(", "),
                    format!("{} of {} tables failed", result.tables_failed, result.tables_total),
                ));
            }
        }

        Commands::Validate => {
            let orchestrator = Orchestrator::new(config).await?;
            let results = orchestrator.validate().await?;
            orchestrator.close().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("\nValidation Results:");
                println!("{:-<60}", "");
                for (table, (source, target, matches)) in &results {
                    let status = if *matches { "OK" } else { "MISMATCH" };
                    println!(
                        "{:<30} source={:<10} target={:<10} {}",
                        table, source, target, status
                    );
                }
            }

            let mismatched: Vec<_> = results
                .iter()
                .filter(|(_, (_, _, matches))| !matches)
                .map(|(t, _)| t.as_str())
                .collect();
            if !mismatched.is_empty() {
                return Err(MigrateError::transfer(
                    mismatched.join(", "),
                    "row counts differ between source and target",
                ));
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.health_check().await?;
            orchestrator.close().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (SQLite): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (MySQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::connection(
                    "health check failed",
                    "pinging source and target",
                ));
            }
        }

        Commands::Plan => {
            let orchestrator = Orchestrator::new(config).await?;
            let plans = orchestrator.plan().await?;
            orchestrator.close().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&plans)?);
            } else {
                for plan in &plans {
                    let key = plan.schema.unique_key.as_deref().unwrap_or("-");
                    println!("{} (key: {})", plan.schema.name, key);
                    for col in &plan.schema.columns {
                        println!("    {:<30} {:<16} -> {}", col.name, col.source_type, col.target_type);
                    }
                    match (&plan.ddl, &plan.skip_reason) {
                        (Some(ddl), _) => println!("  {}", ddl),
                        (None, Some(reason)) => println!("  skipped: {}", reason),
                        (None, None) => {}
                    }
                }
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json stays machine readable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM (cron/systemd shutdown).
/// Tables already in flight finish; no new table is started.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Finishing in-flight tables...", name);
                    token.cancel();
                }
                Err(e) => eprintln!("Failed to install {} handler: {}", name, e),
            }
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Finishing in-flight tables...");
            token.cancel();
        }
    });

    cancel_token
}
