//! Sales Insights - LLM-generated sales performance insights
//!
//! An HTTP service that loads a sales CSV once at startup and answers
//! per-representative, team and trend queries with narrative insights
//! generated by an Ollama model.
//!
//! Exit codes:
//!   0 - Clean shutdown (or --init-config / --dry-run finished)
//!   1 - Startup or runtime error (config, dataset, model, bind)

mod analysis;
mod cli;
mod config;
mod data;
mod insight;
mod models;
mod server;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use data::DatasetStore;
use insight::{GeneratorSettings, OllamaGenerator};
use models::Period;
use server::AppState;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Sales Insights v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Startup failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .sales-insights.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize the dataset, listener and model.");
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG`, when set to
/// a valid filter, takes precedence over the flags.
fn init_logging(args: &Args) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(args.log_level(), rust_log.as_deref());

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn log_filter(level: Level, directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(level.as_str().to_lowercase()))
}

/// Load everything the service needs, then serve until shutdown.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    // The dataset must be in memory before anything is served.
    let dataset = DatasetStore::load(&config.data.path)
        .with_context(|| format!("Cannot start without dataset {}", config.data.path.display()))?;

    if args.dry_run {
        return handle_dry_run(&dataset);
    }

    let generator = OllamaGenerator::connect(GeneratorSettings::from(&config.model))
        .await
        .with_context(|| format!("Cannot load model {}", config.model.name))?;
    info!(
        "Model {} ready (max {} tokens per insight)",
        config.model.name, config.model.max_length
    );

    let state = AppState::new(dataset, Arc::new(generator), config.model.max_length);
    server::start_server(&config.bind_address(), state).await
}

/// Handle --dry-run: print the aggregates the endpoints would use, no LLM call.
fn handle_dry_run(dataset: &DatasetStore) -> Result<()> {
    println!("\n🔍 Dry run: dataset summary (no model calls)...\n");

    let team = analysis::aggregate_all(dataset.records());
    println!(
        "   Records: {} | Employees: {}",
        dataset.len(),
        dataset.employee_count()
    );
    println!(
        "   Leads: {} | Tours: {} | Applications: {}",
        team.total_leads, team.total_tours, team.total_applications
    );
    println!(
        "   Revenue confirmed: {} | Revenue pending: {}",
        team.total_revenue_confirmed, team.total_revenue_pending
    );

    for period in [Period::Monthly, Period::Quarterly] {
        match analysis::aggregate_by_period(dataset.records(), period) {
            Ok(report) => {
                println!("\n   {} buckets: {}", period, report.buckets.len());
                for bucket in &report.buckets {
                    println!(
                        "     📅 {} ({} records, {} leads)",
                        bucket.label, bucket.totals.record_count, bucket.totals.total_leads
                    );
                }
            }
            Err(e) => {
                warn!("{} trends unavailable: {}", period, e);
                println!("\n   {} buckets: unavailable ({})", period, e);
            }
        }
    }

    println!("\n✅ Dry run complete. No model calls were made.");
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
