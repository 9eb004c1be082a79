//! Tempora CLI
//!
//! Command-line interface for the Tempora query engine:
//! - Evaluate a query against a CSV/JSON series
//! - Check a query for syntax and identifier errors
//! - Print a default configuration file

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tempora::config::{generate_default_config, Config};
use tempora::query::{parse_query, Query, QueryEvaluator};
use tempora::series::InputFormat;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "tempora")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Event query language for time-series data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/tempora/config.toml or ./tempora.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a query against a data series and print the result as JSON
    Run {
        /// Query text, or a path to a query file with --query-file
        query: String,
        /// Series file (CSV or JSON)
        input: PathBuf,
        /// Treat QUERY as a path to a file holding the query
        #[arg(short = 'f', long)]
        query_file: bool,
        /// Input format (default: from config or file extension)
        #[arg(long, value_enum)]
        format: Option<InputFormat>,
        /// Pretty-print the JSON result
        #[arg(short, long)]
        pretty: bool,
    },

    /// Parse and validate a query without evaluating it
    Check {
        /// Query text, or a path to a query file with --query-file
        query: String,
        /// Treat QUERY as a path to a file holding the query
        #[arg(short = 'f', long)]
        query_file: bool,
    },

    /// Print a default configuration file
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => Config::load_default(),
    };
    init_tracing(&config);

    match cli.command {
        Commands::Run {
            query,
            input,
            query_file,
            format,
            pretty,
        } => {
            let query = load_query(&query, query_file)?;

            let format = match format.or(config.input.format) {
                Some(format) => format,
                None => InputFormat::from_path(&input)?,
            };
            let points = config
                .input
                .reader()
                .read_path(&input, format)
                .with_context(|| format!("Failed to read series from {:?}", input))?;

            let outcome = QueryEvaluator::new().evaluate(&query, &points)?;

            let json = if pretty || config.output.pretty {
                serde_json::to_string_pretty(&outcome)?
            } else {
                serde_json::to_string(&outcome)?
            };
            println!("{}", json);
        }

        Commands::Check { query, query_file } => {
            let query = load_query(&query, query_file)?;

            for sample in query.samples() {
                println!("sample  {}", sample.identifier());
            }
            for event in query.events() {
                println!("event   {}", event.identifier());
            }
            println!("Query OK ({} identifiers)", query.identifiers().len());
        }

        Commands::Config => {
            print!("{}", generate_default_config());
        }
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tempora={}", config.logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_query(query: &str, from_file: bool) -> anyhow::Result<Query> {
    let text = if from_file {
        std::fs::read_to_string(Path::new(query))
            .with_context(|| format!("Failed to read query file {:?}", query))?
    } else {
        query.to_string()
    };

    parse_query(&text).context("Invalid query")
}
