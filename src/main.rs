//! dsrq - natural-language questions over the Daily Situation Report table.

use std::path::PathBuf;

use dsr_query::cli::{Cli, Command};
use dsr_query::error::{AppError, Result};
use dsr_query::export::EXPORT_FILENAME;
use dsr_query::logging;
use dsr_query::pipeline;
use serde::Serialize;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    match run(&cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            print_json(&serde_json::json!({ "error": e.detail() }), cli.pretty);
            std::process::exit(1);
        }
    }
}

/// Runs one subcommand and returns the process exit code.
async fn run(cli: &Cli) -> Result<i32> {
    let config = cli.resolve_config()?;
    info!("Store: {}", config.database.display_string());

    let pipeline = pipeline::bootstrap(&config).await?;

    let code = match &cli.command {
        Command::Query { question } => {
            let envelope = pipeline.answer(question).await;
            print_json(&envelope, cli.pretty);
            0
        }
        Command::TestDb => {
            let envelope = pipeline.diagnostic().await;
            print_json(&envelope, cli.pretty);
            0
        }
        Command::Provider => {
            print_json(
                &serde_json::json!({ "provider": pipeline.provider_name() }),
                cli.pretty,
            );
            0
        }
        Command::Export { sql, output } => match pipeline.export(sql).await {
            Ok(payload) => {
                let path = output
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(EXPORT_FILENAME));
                std::fs::write(&path, &payload.bytes).map_err(|e| {
                    AppError::export(format!("Failed to write {}: {e}", path.display()))
                })?;
                info!(path = %path.display(), "Workbook written");
                print_json(
                    &serde_json::json!({
                        "filename": payload.filename,
                        "content_type": payload.content_type,
                        "bytes": payload.bytes.len(),
                        "path": path.display().to_string(),
                    }),
                    cli.pretty,
                );
                0
            }
            Err(e) => {
                error!("Export failed: {}", e);
                print_json(&serde_json::json!({ "error": e.detail() }), cli.pretty);
                1
            }
        },
    };

    pipeline.shutdown().await;
    Ok(code)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match rendered {
        Ok(s) => println!("{s}"),
        Err(e) => error!("Failed to serialize output: {}", e),
    }
}
