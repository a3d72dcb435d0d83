//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Most flags are optional so that values
//! from the configuration file are only overridden when given.

use clap::Parser;
use std::path::PathBuf;

/// Sales Insights - LLM-generated sales performance insights
///
/// Loads a sales CSV once at startup and serves per-representative,
/// team and trend insights over HTTP, generated by an Ollama model.
///
/// Examples:
///   sales-insights
///   sales-insights --data ./sales_data.csv --port 8080
///   sales-insights --model mistral:7b --max-length 200
///   sales-insights --dry-run
///   sales-insights --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .sales-insights.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Sales CSV to load at startup [default: sales_data.csv]
    #[arg(short, long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Address to listen on [default: 0.0.0.0]
    #[arg(long, value_name = "ADDR")]
    pub host: Option<String>,

    /// Port to listen on [default: 8000]
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Ollama model used to generate insights [default: llama3.2:latest]
    #[arg(short, long, env = "SALES_INSIGHTS_MODEL")]
    pub model: Option<String>,

    /// Ollama API URL [default: http://localhost:11434]
    #[arg(long, value_name = "URL")]
    pub ollama_url: Option<String>,

    /// Maximum number of generated tokens per insight [default: 100]
    #[arg(long, value_name = "TOKENS")]
    pub max_length: Option<u32>,

    /// Temperature for generation (0.0 - 2.0) [default: 0.7]
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds for each generation call
    ///
    /// Without this flag generation calls wait as long as the model takes.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Fail at startup instead of pulling a missing model
    #[arg(long)]
    pub no_pull: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Load the dataset, print its aggregates and exit without serving
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .sales-insights.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref data) = self.data {
            if data.is_dir() {
                return Err(format!("Data path is a directory: {}", data.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
