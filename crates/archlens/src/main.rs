use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use archlens_core::config::{Config, CONFIG_FILE};
use archlens_core::engine::RuleEngine;
use archlens_core::pipeline::{AnalysisPipeline, AnalyzeOptions};
use archlens_core::report::ProjectReport;
use archlens_core::rules::{Rule, RuleRegistry};
use archlens_llm::HttpModelClient;
use archlens_python::PythonImportExtractor;
use archlens_report::{json, text, RenderFormat};

#[derive(Parser)]
#[command(name = "archlens")]
#[command(about = "Map module dependencies and check hexagonal architecture rules in Python projects")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). ARCHLENS_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum DiagramFormat {
    Png,
    Svg,
    Dot,
}

impl From<DiagramFormat> for RenderFormat {
    fn from(format: DiagramFormat) -> Self {
        match format {
            DiagramFormat::Png => RenderFormat::Png,
            DiagramFormat::Svg => RenderFormat::Svg,
            DiagramFormat::Dot => RenderFormat::Dot,
        }
    }
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to the project root
    path: PathBuf,
    /// Component root to analyze, relative to the project (repeatable)
    #[arg(long = "component")]
    components: Vec<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
    /// Compact JSON output
    #[arg(long)]
    compact: bool,
    /// Reuse cached imports for unchanged files
    #[arg(long)]
    incremental: bool,
    /// Config file path (defaults to .archlens.toml in the project or an ancestor)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a project and print the full report
    Analyze {
        #[command(flatten)]
        run: RunArgs,
        /// Write one dependency diagram per component into this directory
        #[arg(long)]
        diagram_dir: Option<PathBuf>,
        /// Diagram format
        #[arg(long, value_enum, default_value = "png")]
        diagram_format: DiagramFormat,
    },
    /// Analyze and exit with code 0 (no violations) or 1 (violations found)
    Check {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Create a default .archlens.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
    /// List the registered rules
    Rules {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Analyze {
            run,
            diagram_dir,
            diagram_format,
        } => cmd_analyze(&run, diagram_dir.as_deref(), diagram_format.into()),
        Commands::Check { run } => cmd_check(&run),
        Commands::Init { force } => cmd_init(force),
        Commands::Rules { config } => cmd_rules(config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(2);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("ARCHLENS_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_analyze(run: &RunArgs, diagram_dir: Option<&Path>, diagram_format: RenderFormat) -> Result<()> {
    let report = run_analysis(run)?;
    match run.format {
        OutputFormat::Text => print!("{}", text::format_report(&report)),
        OutputFormat::Json => println!("{}", json::format_report(&report, run.compact)),
    }
    if let Some(dir) = diagram_dir {
        write_diagrams(&report, &run.path, dir, diagram_format)?;
    }
    Ok(())
}

fn cmd_check(run: &RunArgs) -> Result<()> {
    let report = run_analysis(run)?;
    let passed = match run.format {
        OutputFormat::Text => {
            let (out, passed) = text::format_check(&report);
            print!("{out}");
            passed
        }
        OutputFormat::Json => {
            let (out, passed) = json::format_check(&report, run.compact);
            println!("{out}");
            passed
        }
    };
    if !passed {
        process::exit(1);
    }
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let target = PathBuf::from(CONFIG_FILE);
    if target.exists() && !force {
        anyhow::bail!("{CONFIG_FILE} already exists. Use --force to overwrite.");
    }
    std::fs::write(&target, Config::default_toml())
        .with_context(|| format!("failed to write {CONFIG_FILE}"))?;
    println!("Created {CONFIG_FILE} with default configuration.");
    Ok(())
}

fn cmd_rules(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(Path::new("."), config_path)?;
    let registry = RuleRegistry::builtin(&config.analyzer);

    println!("{}", "Registered rules".bold());
    for rule in registry.rules() {
        let status = if config.rules.disabled.iter().any(|d| d == rule.name()) {
            "disabled".yellow().to_string()
        } else if matches!(rule, Rule::Analyzer(_)) && !config.analyzer.enabled {
            "needs analyzer".yellow().to_string()
        } else {
            "enabled".green().to_string()
        };
        println!(
            "  {:<36} {:<13} key={:<34} {status}",
            rule.name(),
            rule.kind().to_string(),
            rule.result_key()
        );
    }
    Ok(())
}

fn load_config(project_path: &Path, config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default(project_path)),
    }
}

fn run_analysis(run: &RunArgs) -> Result<ProjectReport> {
    if !run.path.is_dir() {
        anyhow::bail!("'{}' is not a directory", run.path.display());
    }
    let config = load_config(&run.path, run.config.as_deref())?;
    let extractor = PythonImportExtractor::new().context("failed to initialize Python extractor")?;

    let analyzer = if config.analyzer.enabled {
        let client =
            HttpModelClient::new(&config.analyzer).context("failed to initialize analyzer client")?;
        Some(Arc::new(client))
    } else {
        None
    };

    let mut engine = RuleEngine::new(RuleRegistry::builtin(&config.analyzer), &config.rules);
    if let Some(client) = &analyzer {
        engine = engine.with_analyzer(client.clone());
    }

    let pipeline = AnalysisPipeline::new(vec![Box::new(extractor)], config, engine);
    let options = AnalyzeOptions {
        components: run.components.clone(),
        incremental: run.incremental,
        ..Default::default()
    };
    let result = pipeline.analyze(&run.path, &options);

    // The pipeline holds the only other handle to the analyzer.
    drop(pipeline);
    if let Some(client) = analyzer {
        match Arc::try_unwrap(client) {
            Ok(client) => client.shutdown(),
            Err(_) => warn!("analyzer client still in use; not shutting it down"),
        }
    }

    result.with_context(|| format!("failed to analyze '{}'", run.path.display()))
}

fn write_diagrams(
    report: &ProjectReport,
    project_path: &Path,
    dir: &Path,
    format: RenderFormat,
) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create diagram directory '{}'", dir.display()))?;

    for component in &report.components {
        let bytes = archlens_report::render(
            &component.import_dependencies_graph,
            Some(&component.layers),
            format,
        )
        .with_context(|| format!("failed to render diagram for '{}'", component.path))?;

        let name = diagram_name(&component.path, project_path);
        let target = dir.join(format!("{name}.{}", format.extension()));
        std::fs::write(&target, bytes)
            .with_context(|| format!("failed to write '{}'", target.display()))?;
        eprintln!("Wrote {}", target.display());
    }
    Ok(())
}

/// File stem for a component's diagram: its path with separators flattened,
/// or the project directory name for the project root itself.
fn diagram_name(component: &str, project_path: &Path) -> String {
    if component == "." {
        return project_path
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "project".to_string());
    }
    component.replace('/', "_")
}
