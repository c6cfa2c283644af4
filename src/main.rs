use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use serde::Serialize;
use signal_correlator::ai::{Narrative, NarrativeAnalyzer};
use signal_correlator::collectors::CollectorSettings;
use signal_correlator::config::{AIBackendConfig, Config};
use signal_correlator::error::ConfigError;
use signal_correlator::report::{render_json, render_markdown, render_terminal};
use signal_correlator::telemetry::SignozClient;
use signal_correlator::{CorrelateOptions, CorrelationResult, Correlator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Output format for the correlation report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Markdown,
    Json,
}

/// Command-line arguments for the signal correlator
#[derive(Parser)]
#[command(
    name = "correlator",
    about = "Cross-signal correlation of logs and traces from SigNoz",
    long_about = "Collects error logs and failed or slow spans from every service in a SigNoz \
                  instance, groups them into temporal clusters, scores each cluster, and infers \
                  how errors propagate between services. Optionally asks an LLM for an incident \
                  narrative."
)]
struct Cli {
    /// Only correlate signals from this service
    #[arg(short, long, value_name = "NAME")]
    service: Option<String>,

    /// Look-back window in minutes
    #[arg(short, long, value_name = "MINUTES")]
    duration: Option<u32>,

    /// Cluster bucket size and propagation window in seconds
    #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
    bucket_size: Option<i64>,

    /// Minimum signals per cluster
    #[arg(long, value_name = "COUNT")]
    min_events: Option<usize>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Generate an AI narrative of the findings
    #[arg(long)]
    ai: bool,

    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in load_config
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        if self.duration == Some(0) {
            return Err("--duration must be greater than 0".to_string());
        }

        if let Some(ref service) = self.service {
            if service.trim().is_empty() {
                return Err("--service must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Merge command-line overrides over the configured correlation settings
    fn correlate_options(&self, config: &Config) -> CorrelateOptions {
        let mut options = CorrelateOptions::from(&config.correlation);
        if let Some(duration) = self.duration {
            options.duration_minutes = duration;
        }
        if let Some(bucket_size) = self.bucket_size {
            options.bucket_seconds = bucket_size;
        }
        if let Some(min_events) = self.min_events {
            options.min_events = min_events;
        }
        options.service = self.service.clone();
        options
    }
}

/// Load configuration from file or use defaults
///
/// A missing or invalid file is reported and replaced by the default
/// configuration rather than aborting the run.
fn load_config(config_path: Option<&Path>) -> Config {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match Config::from_file(path) {
                Ok(config) => config,
                Err(ConfigError::ReadError(_)) => {
                    warn!(
                        "Configuration file '{}' not found or unreadable, using defaults",
                        path.display()
                    );
                    Config::default()
                }
                Err(e) => {
                    error!("Configuration error in '{}': {}", path.display(), e);
                    warn!("Using default configuration due to invalid config file");
                    Config::default()
                }
            }
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    }
}

/// Fill an empty Anthropic key from the environment
fn resolve_backend(backend: &AIBackendConfig) -> AIBackendConfig {
    match backend {
        AIBackendConfig::Anthropic { api_key, model } if api_key.is_empty() => {
            AIBackendConfig::Anthropic {
                api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
                model: model.clone(),
            }
        }
        other => other.clone(),
    }
}

/// JSON document: the result plus the narrative when one was generated
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    result: &'a CorrelationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    narrative: Option<&'a Narrative>,
}

fn print_report(
    format: OutputFormat,
    result: &CorrelationResult,
    narrative: Option<&Narrative>,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            print!("{}", render_terminal(result));
            if let Some(narrative) = narrative {
                println!("\n▸ AI Correlation Analysis\n");
                println!("{}", narrative.text);
            }
        }
        OutputFormat::Markdown => {
            print!("{}", render_markdown(result));
            if let Some(narrative) = narrative {
                println!("\n## AI Correlation Analysis\n");
                println!("{}", narrative.text);
            }
        }
        OutputFormat::Json => {
            let json = match narrative {
                None => render_json(result)?,
                Some(_) => serde_json::to_string_pretty(&JsonReport { result, narrative })?,
            };
            println!("{}", json);
        }
    }
    Ok(())
}

async fn run(cli: &Cli, config: Config) -> anyhow::Result<()> {
    let options = cli.correlate_options(&config);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Received interrupt signal (SIGINT), finishing with partial data...");
        interrupt.cancel();
    })
    .context("Error setting SIGINT handler")?;

    let client = SignozClient::new(&config.telemetry).context("creating SigNoz client")?;
    let correlator = Correlator::new(
        Arc::new(client),
        CollectorSettings::from(&config.correlation),
    );

    let result = correlator
        .run(&options, &cancel)
        .await
        .context("correlation failed")?;

    let narrative = if cli.ai || config.ai.enabled {
        let analyzer = NarrativeAnalyzer::from_config(&resolve_backend(&config.ai.backend))
            .context("creating AI backend")?;
        match analyzer.narrate(&result).await {
            Ok(narrative) => narrative,
            Err(e) => {
                eprintln!("AI analysis failed: {}", e);
                None
            }
        }
    } else {
        None
    };

    print_report(cli.format, &result, narrative.as_ref())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting signal correlator");

    if let Err(e) = cli.validate() {
        anyhow::bail!("Invalid arguments: {}", e);
    }

    let config = load_config(cli.config.as_deref());
    run(&cli, config).await
}
