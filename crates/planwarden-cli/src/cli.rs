use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use planwarden_core::{LogIngestor, PlanEvidenceSplitter, SplitLog};
use planwarden_runtime::{Auditor, ProviderRegistry, RuntimeConfig};

use crate::sinks;

/// Exit code when `--fail-on-deviation` is set and a deviation was found.
pub const EXIT_DEVIATION: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "planwarden",
    about = "Audit an autonomous test agent's execution log against its own plan",
    version
)]
pub struct Cli {
    /// More log output (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Judge every plan step against the recorded evidence and write a report.
    Analyze(AnalyzeArgs),

    /// Show the plan and evidence extracted from a log, without judging.
    Inspect(InspectArgs),

    /// List the available judgment providers and whether each is usable.
    Providers(ProvidersArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Execution log (JSON).
    pub log: PathBuf,

    /// Where to write the report.
    #[arg(short, long, default_value = "deviation_report.md")]
    pub output: PathBuf,

    /// Runtime config (YAML, or JSON with a .json extension).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Provider type, overriding the config file.
    #[arg(long)]
    pub provider: Option<String>,

    /// Model name, overriding the config file.
    #[arg(long)]
    pub model: Option<String>,

    /// Judgment timeout such as `90s` or `2m`, overriding the config file.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    /// Do not echo the report to stdout.
    #[arg(long)]
    pub no_print: bool,

    /// Exit with status 2 when any step deviates.
    #[arg(long)]
    pub fail_on_deviation: bool,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Execution log (JSON).
    pub log: PathBuf,

    /// Runtime config; only the `ingest` section is used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the split as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ProvidersArgs {
    /// Runtime config; its `provider` section counts toward readiness.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Analyze(args) => run_analyze(args).await,
        Commands::Inspect(args) => run_inspect(args),
        Commands::Providers(args) => run_providers(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

fn read_log(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading log {}", path.display()))
}

async fn run_analyze(args: AnalyzeArgs) -> Result<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(provider) = args.provider {
        config.provider.provider_type = provider;
    }
    if let Some(model) = args.model {
        config.provider.model = Some(model);
    }
    if let Some(timeout) = args.timeout {
        config.judgment.timeout = timeout;
    }
    config.validate().context("invalid configuration")?;

    // Read the log before touching the network.
    let document = read_log(&args.log)?;

    let auditor = Auditor::from_config(&config, &ProviderRegistry::with_defaults())
        .with_context(|| format!("setting up provider '{}'", config.provider.provider_type))?;

    let outcome = auditor.audit(&document).await.map_err(|err| {
        let stage = err.stage();
        anyhow::Error::new(err).context(format!("audit failed at {} stage", stage))
    })?;

    let rendered = match args.format {
        OutputFormat::Markdown => outcome.report.to_markdown(),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&outcome)?;
            json.push('\n');
            json
        }
    };

    sinks::write_atomic(&args.output, &rendered)?;
    info!(path = %args.output.display(), "Report written");

    if !args.no_print {
        sinks::print(&rendered)?;
    }

    if args.fail_on_deviation && outcome.has_deviation() {
        return Ok(ExitCode::from(EXIT_DEVIATION));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_inspect(args: InspectArgs) -> Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let document = read_log(&args.log)?;

    let entries = LogIngestor::with_rules(config.ingest)
        .ingest(&document)
        .context("inspect failed at ingest stage")?;
    let split = PlanEvidenceSplitter::split(&entries).context("inspect failed at split stage")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&split)?);
    } else {
        print!("{}", describe_split(&split));
    }
    Ok(ExitCode::SUCCESS)
}

fn describe_split(split: &SplitLog) -> String {
    let mut out = format!("Plan ({} steps):\n", split.plan.len());
    for step in &split.plan {
        out.push_str(&format!("  {}. {}\n", step.ordinal, one_line(&step.description)));
    }
    out.push_str(&format!("\nEvidence ({} items):\n", split.evidence.len()));
    for item in &split.evidence {
        out.push_str(&format!("  [{}] {}\n", item.ordinal, one_line(&item.description)));
    }
    out
}

/// First line of `text`, cut to 100 characters.
fn one_line(text: &str) -> String {
    let first = text.lines().next().unwrap_or("");
    let mut line: String = first.chars().take(100).collect();
    if line.len() < first.len() || text.lines().nth(1).is_some() {
        line.push('…');
    }
    line
}

/// One line of `planwarden providers`.
#[derive(Debug)]
struct ProviderStatus {
    provider_type: String,
    model: String,
    description: &'static str,
    ready: bool,
}

/// Check every registered provider against its config section.
///
/// The configured provider is checked with the file's section; the others
/// with an empty one, so only their environment variables count.
fn provider_statuses(registry: &ProviderRegistry, config: &RuntimeConfig) -> Vec<ProviderStatus> {
    registry
        .available_types()
        .into_iter()
        .map(|provider_type| {
            let section = if provider_type == config.provider.provider_type {
                config.provider.factory_config()
            } else {
                serde_json::json!({})
            };
            let ready = registry.validate(provider_type, &section).is_ok();
            let description = registry
                .get_factory(provider_type)
                .map(|f| f.description())
                .unwrap_or_default();
            let model = section["model"]
                .as_str()
                .map(str::to_string)
                .or_else(|| {
                    registry
                        .default_config(provider_type)
                        .and_then(|c| c["model"].as_str().map(str::to_string))
                })
                .unwrap_or_default();
            ProviderStatus {
                provider_type: provider_type.to_string(),
                model,
                description,
                ready,
            }
        })
        .collect()
}

fn run_providers(args: ProvidersArgs) -> Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    for status in provider_statuses(&ProviderRegistry::with_defaults(), &config) {
        let readiness = if status.ready { "ready" } else { "no credential" };
        println!(
            "{:<10} {:<28} {:<14} {}",
            status.provider_type, status.model, readiness, status.description
        );
    }
    Ok(ExitCode::SUCCESS)
}
