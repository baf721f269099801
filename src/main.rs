// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! docsort: local zero-shot document classifier and organizer

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use docsort::classifier::{Classifier, OllamaClient};
use docsort::config::{AppConfig, ModelBackend};
use docsort::fetcher::{FetchOutcome, Fetcher};
use docsort::report::{category_counts, render_bar_chart, render_table, results_json};
use docsort::session::Session;
use docsort::{DocsortError, Result};

/// docsort CLI - fetch, classify and file documents
#[derive(Parser, Debug)]
#[command(name = "docsort")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Zero-shot document classifier and organizer", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a configuration file and the working directories
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Download documents into their staging directories
    Fetch {
        /// URL to download (repeatable; overrides the configured list)
        #[arg(short, long)]
        url: Vec<String>,

        /// Target directory for the URL at the same position
        #[arg(short, long)]
        dir: Vec<PathBuf>,
    },

    /// Classify every document in the staging directory
    Analyze {
        /// Minimum score for a category to be kept (0.0-1.0)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Skip Ollama health check
        #[arg(long)]
        skip_health_check: bool,
    },

    /// Show the stored results table
    Results,

    /// Show one document's scores as a bar chart
    Show {
        /// Document file name
        file: String,

        /// Bar width in characters
        #[arg(short, long, default_value = "40")]
        width: usize,
    },

    /// Replace a document's categories with a single one
    Correct {
        /// Document file name
        file: String,

        /// New category
        category: String,
    },

    /// List documents tagged with any of the given categories
    Search {
        /// Categories to match
        #[arg(required = true)]
        categories: Vec<String>,
    },

    /// Move documents into folders named after their dominant category
    Organize {
        /// Show what would move without moving anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List categories with document counts
    Categories,

    /// Move journal and undo operations
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show classifier backend and store status
    Status,
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent moves
    List {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Move recently organized files back
    Undo {
        /// Number of moves to undo (0 = all)
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Dry run (show what would be undone)
        #[arg(long)]
        dry_run: bool,
    },

    /// Clear the journal
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let json = cli.format == "json";
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Init { dir, force } => run_init(dir, force),
        Commands::Fetch { url, dir } => run_fetch(&config, url, dir, json).await,
        Commands::Analyze { threshold, skip_health_check } => {
            run_analyze(config, threshold, skip_health_check, json).await
        }
        Commands::Results => {
            let session = open_session(config)?;
            if json {
                print_json(&results_json(session.results().iter()))
            } else if session.results().is_empty() {
                println!("No results yet. Run `docsort analyze` first.");
                Ok(())
            } else {
                print!("{}", render_table(session.results().iter()));
                Ok(())
            }
        }
        Commands::Show { file, width } => {
            let session = open_session(config)?;
            let record = session.record(&file)?;
            if json {
                print_json(&json!({ "filename": file, "record": record }))
            } else {
                println!("{} ({})", file, record.path.display());
                print!("{}", render_bar_chart(&record.categories, width));
                Ok(())
            }
        }
        Commands::Correct { file, category } => {
            let mut session = open_session(config)?;
            session.correct(&file, &category)?;
            println!("{} -> {}", file, category);
            Ok(())
        }
        Commands::Search { categories } => {
            let session = open_session(config)?;
            let hits = session.search(&categories);
            if json {
                print_json(&results_json(hits))
            } else if hits.is_empty() {
                println!("No documents in {}", categories.join(", "));
                Ok(())
            } else {
                print!("{}", render_table(hits));
                Ok(())
            }
        }
        Commands::Organize { dry_run } => run_organize(config, dry_run, json),
        Commands::Categories => {
            let session = open_session(config)?;
            let counts = category_counts(session.results(), &session.categories());
            if json {
                print_json(&json!(counts
                    .iter()
                    .map(|(name, n)| json!({ "name": name, "documents": n }))
                    .collect::<Vec<_>>()))
            } else {
                for (name, n) in counts {
                    println!("  {:<28} {}", name, n);
                }
                Ok(())
            }
        }
        Commands::History { action } => run_history_command(config, action),
        Commands::Config { action } => run_config_command(config, action, &cli.config),
        Commands::Status => run_status(config).await,
    }
}

fn open_session(config: AppConfig) -> Result<Session> {
    let classifier = Classifier::from_config(&config.classifier, config.categories.clone())?;
    Session::open(config, classifier)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_fetch(config: &AppConfig, urls: Vec<String>, dirs: Vec<PathBuf>, json: bool) -> Result<()> {
    let (urls, dirs) = if urls.is_empty() && dirs.is_empty() {
        let dirs = config.fetch.directories.iter().map(PathBuf::from).collect();
        (config.fetch.urls.clone(), dirs)
    } else {
        (urls, dirs)
    };

    let fetcher = Fetcher::new(Duration::from_secs(config.fetch.timeout_secs))?;
    let report = fetcher.fetch_all(&urls, &dirs).await?;

    if json {
        let outcomes: Vec<serde_json::Value> = report
            .outcomes
            .iter()
            .map(|o| match o {
                FetchOutcome::Downloaded { path, bytes } => {
                    json!({ "status": "downloaded", "path": path, "bytes": bytes })
                }
                FetchOutcome::AlreadyPresent(path) => json!({ "status": "present", "path": path }),
                FetchOutcome::Failed { url, reason } => {
                    json!({ "status": "failed", "url": url, "reason": reason })
                }
            })
            .collect();
        return print_json(&json!(outcomes));
    }

    for outcome in &report.outcomes {
        match outcome {
            FetchOutcome::Downloaded { path, bytes } => println!("  downloaded {} ({} bytes)", path.display(), bytes),
            FetchOutcome::AlreadyPresent(path) => println!("  present    {}", path.display()),
            FetchOutcome::Failed { url, reason } => println!("  failed     {}: {}", url, reason),
        }
    }
    println!(
        "\n{} downloaded, {} already present, {} failed",
        report.downloaded(),
        report.already_present(),
        report.failed()
    );
    Ok(())
}

async fn run_analyze(config: AppConfig, threshold: Option<f64>, skip_health_check: bool, json: bool) -> Result<()> {
    config.validate()?;
    let threshold = threshold.unwrap_or(config.classifier.threshold);

    if config.classifier.backend == ModelBackend::Ollama && !skip_health_check {
        check_engine(&config).await?;
    }

    let mut session = open_session(config)?;
    let report = session.run_analysis(threshold).await?;

    if json {
        return print_json(&json!({
            "analyzed": report.analyzed,
            "unknown": report.unknown,
            "failed": report.failed,
            "threshold": threshold,
        }));
    }

    print!("{}", render_table(session.results().iter()));
    println!(
        "\nAnalyzed {} documents ({} unknown, {} failed)",
        report.analyzed, report.unknown, report.failed
    );
    Ok(())
}

/// Fail early when Ollama or the configured model is missing
async fn check_engine(config: &AppConfig) -> Result<()> {
    let client = OllamaClient::new(&config.classifier.url, Duration::from_secs(10))?;
    info!("Checking Ollama availability...");
    client.health_check().await.map_err(|e| {
        DocsortError::ModelUnavailable(format!("Failed to connect to Ollama: {}", e))
    })?;

    if !client.model_available(&config.classifier.model).await? {
        warn!(
            "Model '{}' not found. Try: ollama pull {}",
            config.classifier.model, config.classifier.model
        );
    }
    Ok(())
}

fn run_organize(config: AppConfig, dry_run: bool, json: bool) -> Result<()> {
    let session = open_session(config)?;
    if dry_run {
        warn!("DRY RUN MODE - files will not be moved");
    }
    let report = session.organize(dry_run)?;

    if json {
        let moved: Vec<serde_json::Value> = report
            .moved
            .iter()
            .map(|m| json!({ "filename": m.filename, "category": m.category, "from": m.from, "to": m.to }))
            .collect();
        return print_json(&json!({ "moved": moved, "skipped": report.skipped, "dry_run": dry_run }));
    }

    let verb = if dry_run { "Would move" } else { "Moved" };
    for m in &report.moved {
        println!("  {} {} -> {}", verb, m.filename, m.to.display());
    }
    if !report.skipped.is_empty() {
        println!("Skipped (not at recorded path): {}", report.skipped.join(", "));
    }
    Ok(())
}

fn run_history_command(config: AppConfig, action: HistoryCommands) -> Result<()> {
    match action {
        HistoryCommands::List { count } => {
            let session = open_session(config)?;
            let entries = session.organizer().history().get_recent(count)?;
            println!("Recent moves ({} entries):", entries.len());
            for entry in entries {
                let status = if entry.undone { "[UNDONE]" } else { "" };
                println!(
                    "  {} {} -> {} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.original_path.display(),
                    entry.new_path.display(),
                    status
                );
            }
        }
        HistoryCommands::Undo { count, dry_run } => {
            let session = open_session(config)?;
            let report = session.undo(count, dry_run)?;

            if report.restored.is_empty() && report.skipped.is_empty() {
                println!("No moves to undo");
                return Ok(());
            }

            let verb = if dry_run { "Would undo" } else { "Undone" };
            for entry in &report.restored {
                println!("{}: {} -> {}", verb, entry.new_path.display(), entry.original_path.display());
            }
            for (entry, reason) in &report.skipped {
                warn!("Skipped {:?}: {}", entry.new_path, reason);
            }
        }
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing history");
                return Ok(());
            }
            let session = open_session(config)?;
            session.organizer().history().clear()?;
            println!("History cleared");
        }
    }

    Ok(())
}

fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Categories: {}", config.categories.join(", "));
            println!("  Model: {} ({:?})", config.classifier.model, config.classifier.backend);
            println!("  Results: {}", config.results_file);
            if config.fetch.urls.len() != config.fetch.directories.len() {
                warn!(
                    "fetch lists differ in length ({} urls, {} directories); `docsort fetch` will refuse to run",
                    config.fetch.urls.len(),
                    config.fetch.directories.len()
                );
            }
        }
    }

    Ok(())
}

async fn run_status(config: AppConfig) -> Result<()> {
    println!("docsort v{} Status", env!("CARGO_PKG_VERSION"));
    println!("==================");

    match config.classifier.backend {
        ModelBackend::Ollama => {
            let client = OllamaClient::new(&config.classifier.url, Duration::from_secs(10))?;
            match client.health_check().await {
                Ok(()) => println!("Ollama: Running ({})", client.base_url()),
                Err(e) => println!("Ollama: Error - {}", e),
            }
            match client.list_models().await {
                Ok(models) => {
                    println!("\nAvailable models:");
                    for m in &models {
                        let marker = if m.starts_with(config.classifier.model.as_str()) { "→" } else { " " };
                        println!("  {} {}", marker, m);
                    }
                }
                Err(e) => println!("  Error listing models: {}", e),
            }
        }
        ModelBackend::Keyword => println!("Classifier: offline keyword scorer"),
    }

    let session = open_session(config)?;
    println!("\nStore ({}):", session.config().results_file);
    println!("  Documents: {}", session.results().len());
    println!("  Journal entries: {}", session.organizer().history().read_all()?.len());
    println!("  Extractors: {}", session.extractor().partitioner_names().join(", "));

    println!("\nConfiguration:");
    println!("  Staging: {}", session.config().source_dir);
    println!("  Destination: {}", session.config().dest_dir);
    println!(
        "  Threshold: {:.2}, top-k: {}",
        session.classifier().policy().threshold,
        session.classifier().policy().top_k
    );

    Ok(())
}

fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(DocsortError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    let mut config = AppConfig::default();
    let staging = target.join("documents");
    let sorted = target.join("sorted");
    std::fs::create_dir_all(&staging)?;
    std::fs::create_dir_all(&sorted)?;

    config.source_dir = staging.to_string_lossy().to_string();
    config.dest_dir = sorted.to_string_lossy().to_string();
    config.results_file = target.join("results.json").to_string_lossy().to_string();
    config.fetch.directories = vec![config.source_dir.clone(); config.fetch.urls.len()];
    config.save(&config_path)?;

    println!("docsort initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    println!("  - documents/");
    println!("  - sorted/");
    println!("\nNext steps:");
    println!("  1. docsort fetch");
    println!("  2. docsort analyze");
    println!("  3. docsort organize --dry-run");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["docsort"]).is_err());
        let cli = Cli::try_parse_from(["docsort", "results"]).unwrap();
        assert!(!cli.verbose);
        assert_eq!(cli.format, "text");
    }

    #[test]
    fn test_cli_fetch_pairs() {
        let cli = Cli::try_parse_from([
            "docsort", "fetch", "--url", "https://a/x.pdf", "--dir", "docs", "--url", "https://b/y.pdf",
        ])
        .unwrap();

        match cli.command {
            Commands::Fetch { url, dir } => {
                assert_eq!(url.len(), 2);
                assert_eq!(dir, vec![PathBuf::from("docs")]);
            }
            _ => panic!("Expected Fetch command"),
        }
    }

    #[test]
    fn test_cli_analyze_threshold() {
        let cli = Cli::try_parse_from(["docsort", "analyze", "--threshold", "0.45", "--format", "json"]).unwrap();
        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Analyze { threshold, skip_health_check } => {
                assert_eq!(threshold, Some(0.45));
                assert!(!skip_health_check);
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_cli_search_and_history() {
        let cli = Cli::try_parse_from(["docsort", "search", "GGE", "Mathématiques"]).unwrap();
        match cli.command {
            Commands::Search { categories } => assert_eq!(categories, vec!["GGE", "Mathématiques"]),
            _ => panic!("Expected Search command"),
        }

        assert!(Cli::try_parse_from(["docsort", "search"]).is_err());

        let cli = Cli::try_parse_from(["docsort", "history", "undo", "--count", "0", "--dry-run"]).unwrap();
        match cli.command {
            Commands::History { action: HistoryCommands::Undo { count, dry_run } } => {
                assert_eq!(count, 0);
                assert!(dry_run);
            }
            _ => panic!("Expected history undo"),
        }
    }

    #[test]
    fn test_init_writes_config() {
        let dir = tempfile::tempdir().unwrap();
        run_init(Some(dir.path().to_path_buf()), false).unwrap();

        let config = AppConfig::load(&dir.path().join("config.json")).unwrap();
        assert!(config.source_dir.ends_with("documents"));
        assert_eq!(config.fetch.urls.len(), config.fetch.directories.len());
        assert!(dir.path().join("sorted").is_dir());

        assert!(run_init(Some(dir.path().to_path_buf()), false).is_err());
    }
}
