//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use chaingraph_core::{BuildOptions, GraphRun, ProgressReporter, ProgressSnapshot, RunOutcome};
use chaingraph_shared::{
    AppConfig, VerificationStrategy, init_config, load_config, load_config_from, validate_api_key,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// chaingraph: evidence-gated industry chain graphs.
#[derive(Parser)]
#[command(
    name = "chaingraph",
    version,
    about = "Build upstream/midstream/downstream industry graphs whose facts are verified against retrieved documents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.chaingraph/chaingraph.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Verification strategy override.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum StrategyArg {
    Composite,
    Ranking,
}

impl From<StrategyArg> for VerificationStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Composite => Self::Composite,
            StrategyArg::Ranking => Self::Ranking,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the graph for an industry topic.
    Run(RunArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Industry topic, e.g. "光伏".
    #[arg(short, long)]
    pub topic: String,

    /// Output file for the graph JSON (defaults to <output_dir>/graph_<topic>_<timestamp>.json).
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Maximum discovery hops from the planned nodes.
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Scheduler iteration cap.
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Verification strategy.
    #[arg(long)]
    pub strategy: Option<StrategyArg>,

    /// Chat-completion base URL (OpenAI-compatible, ending in /v1).
    #[arg(long, env = "CHAINGRAPH_LLM_URL")]
    pub llm_url: Option<String>,

    /// Chat model name.
    #[arg(long)]
    pub model: Option<String>,

    /// Retrieval service endpoint.
    #[arg(long, env = "CHAINGRAPH_RETRIEVAL_URL")]
    pub retrieval_url: Option<String>,

    /// Also write the run report (outcome, completions, merges) next to the graph.
    #[arg(long)]
    pub report: bool,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "chaingraph=info",
        1 => "chaingraph=debug",
        _ => "chaingraph=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(cli.config.as_deref(), &args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Flags win over file values, which win over defaults.
fn apply_overrides(config: &mut AppConfig, args: &RunArgs) {
    if let Some(depth) = args.max_depth {
        config.defaults.max_depth = depth;
    }
    if let Some(cap) = args.max_iterations {
        config.scheduler.max_iterations = cap;
    }
    if let Some(strategy) = args.strategy {
        config.verification.strategy = strategy.into();
    }
    if let Some(url) = &args.llm_url {
        config.llm.base_url = url.clone();
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if let Some(url) = &args.retrieval_url {
        config.retrieval.endpoint = url.clone();
    }
}

fn default_output_path(output_dir: &str, topic: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let safe_topic: String = topic
        .chars()
        .map(|c| if c.is_whitespace() || std::path::is_separator(c) { '_' } else { c })
        .collect();
    Path::new(output_dir).join(format!("graph_{safe_topic}_{stamp}.json"))
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| eyre!("cannot create '{}': {e}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|e| eyre!("cannot write '{}': {e}", path.display()))?;
    Ok(())
}

async fn cmd_run(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let topic = args.topic.trim();
    if topic.is_empty() {
        return Err(eyre!("--topic must not be empty"));
    }

    let mut config = resolve_config(config_path)?;
    apply_overrides(&mut config, args);
    config.validate()?;

    if let Err(e) = validate_api_key(&config) {
        // Local model servers usually run without a key.
        warn!(error = %e, "continuing without an API key");
    }

    let collaborators = chaingraph_remote::collaborators(&config)?;
    let options = BuildOptions {
        topic: topic.to_string(),
        max_depth: config.defaults.max_depth,
        scheduler: config.scheduler.clone(),
        expansion: config.expansion.clone(),
        concurrency: config.verification.concurrency,
    };
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| default_output_path(&config.defaults.output_dir, topic));

    info!(topic, max_depth = options.max_depth, out = %out.display(), "building graph");

    let reporter = CliProgress::new();
    let run = chaingraph_core::build_graph(&options, &collaborators, &reporter).await;
    reporter.clear();

    write_json(&out, &run.graph)?;
    if args.report {
        let report_path = out.with_extension("report.json");
        write_json(&report_path, &run_report(&run))?;
        println!("  Report: {}", report_path.display());
    }

    print_summary(&run, &out);
    Ok(())
}

fn run_report(run: &GraphRun) -> serde_json::Value {
    serde_json::json!({
        "root_topic": run.graph.root_topic,
        "outcome": run.outcome,
        "iterations": run.iterations,
        "error_count": run.error_count,
        "pruned": run.pruned,
        "consolidation": run.consolidation,
        "completions": run.completions,
        "elapsed_secs": run.elapsed.as_secs_f64(),
    })
}

fn print_summary(run: &GraphRun, out: &Path) {
    let s = &run.graph.structure;
    println!();
    match run.outcome {
        RunOutcome::Complete => println!("  Graph built successfully!"),
        RunOutcome::Aborted(reason) => println!("  Graph build stopped early: {reason}"),
    }
    println!("  Topic:      {}", run.graph.root_topic);
    println!(
        "  Nodes:      {} (upstream {}, midstream {}, downstream {})",
        s.len(),
        s.upstream.len(),
        s.midstream.len(),
        s.downstream.len()
    );
    println!("  Iterations: {}", run.iterations);
    println!("  Errors:     {}", run.error_count);
    println!("  Pruned:     {}", run.pruned.len());
    if let Some(c) = &run.consolidation {
        println!("  Merged:     {} ({} invalid removed)", c.merged.len(), c.removed.len());
    }
    println!("  Output:     {}", out.display());
    println!("  Time:       {:.1}s", run.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn progress(&self, s: &ProgressSnapshot) {
        self.spinner.set_message(format!(
            "Iteration {}: {}/{} nodes resolved, {} queued, {} errors",
            s.iteration, s.resolved, s.nodes, s.pending, s.errors
        ));
    }

    fn finished(&self, outcome: RunOutcome, iterations: u32) {
        self.spinner
            .set_message(format!("Discovery {outcome} after {iterations} iterations"));
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
