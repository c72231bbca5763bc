//! DataScout CLI entry point

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use serde_json::json;
use tracing::debug;

use datascout::blocks::{BlockContext, BlockRegistry, data_loader};
use datascout::cli::{Cli, Command};
use datascout::config::Config;
use datascout::host::ConsoleHost;
use datascout::llm::create_client;
use tablequery::{SqliteEngine, Table, infer_schema};

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    let level = match cli_log_level.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    Ok(())
}

/// Load a table from a data file, inferring the source from the extension
fn load_table(path: &Path, sqlite_query: Option<&str>) -> Result<Table> {
    debug!(?path, "load_table: called");
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
    let path_str = path.to_string_lossy();

    let table = match extension.as_str() {
        "csv" => data_loader::load_csv(&path_str)?,
        "json" => data_loader::load_json(&path_str)?,
        "db" | "sqlite" | "sqlite3" => data_loader::load_sqlite(&path_str, sqlite_query)?,
        other => eyre::bail!("Unsupported input extension '{}' (expected csv, json, or sqlite)", other),
    };

    if table.is_empty() {
        eyre::bail!("Loaded data is empty: {}", path.display());
    }

    let schema = infer_schema(&table);
    Ok(table.with_schema(schema))
}

/// Build the block context from config
fn block_context(config: &Config) -> Result<BlockContext> {
    config.validate()?;
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;

    Ok(BlockContext {
        llm,
        engine: Arc::new(SqliteEngine::new()),
        host: Arc::new(ConsoleHost::new()),
        renderer: None,
        session_dir: config.session.dir.clone(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref())?;

    let config = Config::load(cli.config.as_ref())?;
    let registry = BlockRegistry::standard();

    match cli.command {
        Command::Explore {
            input,
            goal,
            max_iterations,
            output,
            query,
        } => {
            let table = load_table(&input, query.as_deref())?;
            let ctx = block_context(&config)?;
            let inputs = json!({
                "input_table": table,
                "exploration_goal": goal,
                "max_iterations": max_iterations.unwrap_or(config.exploration.max_iterations),
                "llm": config.llm.options(),
            });
            let result = registry.run("exploration-agent", inputs, &ctx).await?;

            if let Some(output) = output {
                let report = result["final_report"].as_str().unwrap_or_default();
                std::fs::write(&output, report).context("Failed to write report")?;
                eprintln!("Report written to {}", output.display());
            }
        }

        Command::Query { input, instruction, query } => {
            let table = load_table(&input, query.as_deref())?;
            let ctx = block_context(&config)?;
            let inputs = json!({
                "input_table": table,
                "instruction": instruction,
                "llm": config.llm.options(),
            });
            let result = registry.run("nl-to-sql", inputs, &ctx).await?;

            println!("-- {}", result["explanation"].as_str().unwrap_or_default());
            println!("{}", result["sql_query"].as_str().unwrap_or_default());
            let result_table: Table = serde_json::from_value(result["result_table"].clone())?;
            println!("{}", tablequery::preview_text(&result_table, 20));
        }

        Command::Quality { input, auto_clean, query } => {
            let table = load_table(&input, query.as_deref())?;
            let ctx = block_context(&config)?;
            let inputs = json!({
                "data_table": table,
                "auto_clean": auto_clean,
                "llm": config.llm.options(),
            });
            let result = registry.run("data-quality-checker", inputs, &ctx).await?;

            println!("{}", serde_json::to_string_pretty(&result["quality_report"])?);
            println!("\n{}", result["cleaning_suggestions"].as_str().unwrap_or_default());
        }

        Command::Stats {
            input,
            analysis,
            dependent,
            group_column,
            query,
        } => {
            let table = load_table(&input, query.as_deref())?;
            let ctx = block_context(&config)?;
            let inputs = json!({
                "data_table": table,
                "analysis_type": analysis,
                "variables": {
                    "dependent": dependent,
                    "group_column": group_column,
                },
                "llm": config.llm.options(),
            });
            let result = registry.run("statistical-analyzer", inputs, &ctx).await?;

            println!("{}", serde_json::to_string_pretty(&result["test_result"])?);
            println!("\n{}", result["interpretation"].as_str().unwrap_or_default());
        }

        Command::Recommend { input, goal, query } => {
            let table = load_table(&input, query.as_deref())?;
            let ctx = block_context(&config)?;
            let inputs = json!({
                "data_table": table,
                "analysis_goal": goal,
                "llm": config.llm.options(),
            });
            let result = registry.run("chart-recommender", inputs, &ctx).await?;

            println!("{}", serde_json::to_string_pretty(&result["recommended_charts"])?);
        }

        Command::Blocks => {
            for block in registry.iter() {
                println!("{:<24} {}", block.name(), block.description());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_table_rejects_unknown_extension() {
        let err = load_table(Path::new("data.parquet"), None).unwrap_err();
        assert!(err.to_string().contains("Unsupported input extension"));
    }

    #[test]
    fn test_load_table_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,x\n2,y\n").unwrap();

        let table = load_table(&path, None).unwrap();
        assert_eq!(table.shape(), (2, 2));
        assert!(table.schema.is_some());
    }

    #[test]
    fn test_load_table_empty_csv_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n").unwrap();

        let err = load_table(&path, None).unwrap_err();
        assert!(err.to_string().contains("Loaded data is empty"));
    }
}
