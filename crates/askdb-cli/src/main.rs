//! askdb CLI - ask natural-language questions about a CSV dataset

mod config;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use askdb_ai::{AnswerPipeline, LlmClient, PromptComposer};
use askdb_store::{QueryExecutor, TableLoader};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::AppConfig;

#[derive(Parser)]
#[command(name = "askdb")]
#[command(about = "Answer questions about a CSV dataset with SQL written by an LLM")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Source CSV file (overrides ASKDB_CSV_PATH)
    #[arg(long, global = true)]
    csv: Option<PathBuf>,

    /// Destination table name (overrides ASKDB_TABLE)
    #[arg(long, global = true)]
    table: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the CSV file into the database, replacing the table
    Load,

    /// Translate a question into SQL, run it and explain the result (requires LLM API key)
    Ask {
        /// The question, in plain language
        question: String,

        /// Query the existing database instead of reloading the CSV first
        #[arg(long)]
        skip_load: bool,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a read-only SQL statement against the loaded table
    Query {
        sql: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Logs go to stderr so stdout only carries results
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = AppConfig::from_env()?.with_overrides(cli.csv, cli.table);

    match cli.command {
        Commands::Load => {
            load_dataset(&config).await?;
        }
        Commands::Ask {
            question,
            skip_load,
            json,
        } => {
            if !skip_load {
                load_dataset(&config).await?;
            }
            ask(&config, &question, json).await?;
        }
        Commands::Query { sql, json } => {
            run_query(&config, &sql, json).await?;
        }
    }

    Ok(())
}

async fn load_dataset(config: &AppConfig) -> Result<()> {
    let loader = TableLoader::connect(&config.database_path)
        .await
        .with_context(|| format!("opening database {:?}", config.database_path))?
        .with_sentinel(config.missing_sentinel.clone());

    let summary = loader
        .load_csv(&config.csv_path, &config.table_name)
        .await
        .with_context(|| format!("loading {:?}", config.csv_path))?;
    loader.pool().close().await;

    println!(
        "Loaded {} rows into '{}' ({} missing cells filled with '{}')",
        summary.row_count, summary.table_name, summary.filled_cells, config.missing_sentinel
    );
    for (name, ty) in &summary.columns {
        println!("  {}: {}", name, ty.as_sql());
    }
    Ok(())
}

async fn open_executor(config: &AppConfig) -> Result<QueryExecutor> {
    let executor = QueryExecutor::connect(&config.database_path)
        .await?
        .enforce_read_only(config.enforce_read_only);
    Ok(executor)
}

async fn ask(config: &AppConfig, question: &str, json: bool) -> Result<()> {
    let executor = open_executor(config).await?;
    let schema = executor.describe_table(&config.table_name).await?;
    info!(
        "Using table '{}' with {} columns",
        schema.table_name,
        schema.columns.len()
    );

    let client = LlmClient::from_env()?;
    info!("Using model {}", client.provider().model());

    let composer = PromptComposer::new()
        .with_row_limit(config.row_limit)
        .with_schema(schema);
    let pipeline = AnswerPipeline::new(&client, &executor, composer);

    let answer = pipeline.answer(question).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        println!("\nGenerated SQL query:\n{}", answer.raw_reply);
        if answer.raw_reply.trim() != answer.sql {
            println!("\nExecuted SQL:\n{}", answer.sql);
        }
        println!("\nSQL Result:\n{}", answer.result);
        println!("\nFinal Answer:\n{}", answer.explanation);
    }
    Ok(())
}

async fn run_query(config: &AppConfig, sql: &str, json: bool) -> Result<()> {
    let executor = open_executor(config).await?;
    let result = executor.execute(sql).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result);
    }

    if result.is_failure() {
        bail!("query failed");
    }
    Ok(())
}
