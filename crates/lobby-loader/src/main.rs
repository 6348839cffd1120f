//! lobby-load - Main entry point

use clap::Parser;
use lobby_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use lobby_loader::cli::{Cli, Commands};
use lobby_loader::{commands, LoadOutcome};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Pick up DATABASE_URL / PG* / LOG_* from a local .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("lobby-load")
        .build();

    // Environment variables take precedence over flags
    let log_config = match log_config.clone().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring invalid logging settings: {}", e);
            log_config
        },
    };

    // Keep the guard alive so file logs are flushed on exit
    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {}", e);
            None
        },
    };

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Load(args) => {
            let outcome = commands::load(args).await?;
            print_outcome(&outcome, cli.json)?;
        },
        Commands::Check(args) => {
            let outcome = commands::check(args).await?;
            print_outcome(&outcome, cli.json)?;
            if outcome.non_ascii_rows() > 0 && !cli.json {
                println!("{} row(s) contain non-ASCII characters", outcome.non_ascii_rows());
            }
        },
        Commands::Describe { table } => {
            let (table_ref, columns) = commands::describe(table).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "table": table_ref,
                        "columns": columns,
                    }))?
                );
            } else {
                print!("{}", commands::format_columns(&table_ref, &columns));
            }
        },
        Commands::Tables { schema } => {
            let tables = commands::tables(schema).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "schema": schema,
                        "tables": tables,
                    }))?
                );
            } else {
                for table in &tables {
                    println!("{}", table);
                }
            }
        },
    }
    Ok(())
}

fn print_outcome(outcome: &LoadOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        println!("{}", outcome);
    }
    Ok(())
}
