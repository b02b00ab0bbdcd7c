//! Linkscrub main entry point
//!
//! This is the command-line interface for the Linkscrub URL cleaner.

use clap::Parser;
use linkscrub::config::{load_config_with_hash, Config};
use linkscrub::pattern::{PatternCompiler, PublicSuffixList, SuffixResolver};
use linkscrub::state::{AppState, InterceptRequest, NoopNavigator};
use linkscrub::storage::{shared, SqliteStorage};
use linkscrub::url::parse_web_url;
use linkscrub::RuleSourceResolver;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Linkscrub: strips tracking parameters from URLs
///
/// Linkscrub resolves its rule set from verified remote sources, a local
/// cache, a bundled rule file and your custom rules, then cleans every URL
/// given with --url or read line by line from standard input.
#[derive(Parser, Debug)]
#[command(name = "linkscrub")]
#[command(version = "1.0.0")]
#[command(about = "Strips tracking parameters from URLs", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// URL to clean (repeatable); standard input is read when omitted
    #[arg(long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// Read and write intercepted requests as JSON lines
    #[arg(long)]
    json: bool,

    /// Skip remote rule sources for this run
    #[arg(long)]
    offline: bool,

    /// Add a host pattern to the whitelist (repeatable)
    #[arg(long = "allow", value_name = "HOST")]
    allow: Vec<String>,

    /// Remove a host pattern from the whitelist (repeatable)
    #[arg(long = "disallow", value_name = "HOST")]
    disallow: Vec<String>,

    /// Disable a provider by identity key, e.g. "url:^https?://..." (repeatable)
    #[arg(long = "disable", value_name = "KEY")]
    disable: Vec<String>,

    /// Re-enable a provider by identity key (repeatable)
    #[arg(long = "enable", value_name = "KEY")]
    enable: Vec<String>,

    /// Replace the stored custom rules with the given JSON file
    #[arg(long, value_name = "FILE")]
    custom_rules: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the configured rule sources without cleaning
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, _config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.offline {
        config.rules.remote_enabled = false;
    }

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config).await?;
    } else {
        handle_clean(config, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("linkscrub=info,warn"),
            1 => EnvFilter::new("linkscrub=debug,info"),
            2 => EnvFilter::new("linkscrub=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Cleaned URLs go to stdout, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the configured sources and switches
fn handle_dry_run(config: &Config) {
    println!("=== Linkscrub Dry Run ===\n");

    println!("Rules:");
    println!("  Built-in rules: {}", enabled(config.rules.builtin_enabled));
    println!("  Remote rules: {}", enabled(config.rules.remote_enabled));
    println!("  Bundled file: {}", config.rules.bundled_path);
    println!("  Fetch timeout: {}s", config.rules.fetch_timeout_secs);

    println!("\nRemote Sources ({}):", config.rules.remote.len());
    for source in &config.rules.remote {
        println!("  - {}", source.rule_url);
        println!("    hash: {}", source.hash_url);
    }

    println!("\nEngine:");
    println!("  Referral marketing: {}", enabled(config.engine.referral_marketing));
    println!("  Domain blocking: {}", enabled(config.engine.domain_blocking));
    println!("  Skip local hosts: {}", enabled(config.engine.skip_local_hosts));
    println!("  Logging: {}", enabled(config.engine.logging));
    if !config.engine.resource_types.is_empty() {
        println!("  Resource types: {}", config.engine.resource_types.join(", "));
    }

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Log limit: {}", config.log.limit);
    match &config.suffix.list_path {
        Some(path) => println!("  Public suffix list: {}", path),
        None => println!("  Public suffix list: none (any-TLD patterns use generic matching)"),
    }

    println!("\n✓ Configuration is valid");
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

/// Handles the --stats mode: resolves the rules, then shows merge
/// statistics alongside the persisted status and counters
async fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use linkscrub::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.storage.database_path);

    let storage = shared(SqliteStorage::new(Path::new(&config.storage.database_path))?);
    let resolver = RuleSourceResolver::from_config(&config.rules, Some(Arc::clone(&storage)))?;
    let resolved = resolver.resolve().await;

    let stats = {
        let guard = storage.lock().unwrap_or_else(|e| e.into_inner());
        load_statistics(&*guard)?
    };
    print_statistics(&stats.with_resolution(&resolved));

    Ok(())
}

/// Handles the main operation: resolve rules, then clean URLs
async fn handle_clean(config: Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let storage = shared(SqliteStorage::new(Path::new(&config.storage.database_path))?);

    let resolver: Option<Arc<dyn SuffixResolver>> = match &config.suffix.list_path {
        Some(path) => match PublicSuffixList::from_path(Path::new(path)) {
            Ok(list) => Some(Arc::new(list)),
            Err(e) => {
                tracing::warn!("Public suffix list unavailable: {}", e);
                None
            }
        },
        None => None,
    };
    let compiler = Arc::new(PatternCompiler::new(resolver));

    let state = Arc::new(AppState::new(
        config.clone(),
        compiler,
        Some(Arc::clone(&storage)),
        Arc::new(NoopNavigator),
    ));

    for entry in &cli.allow {
        state.add_whitelist_entry(entry)?;
    }
    for entry in &cli.disallow {
        if !state.remove_whitelist_entry(entry) {
            tracing::warn!("Whitelist entry '{}' was not present", entry);
        }
    }
    if !cli.disable.is_empty() {
        state.disable_providers(&cli.disable);
    }
    if !cli.enable.is_empty() {
        state.enable_providers(&cli.enable);
    }
    if let Some(path) = &cli.custom_rules {
        let json = std::fs::read_to_string(path)?;
        let count = state.set_custom_rules(&json)?;
        tracing::info!("Stored {} custom providers from {}", count, path.display());
    }

    let rule_resolver = RuleSourceResolver::from_config(&config.rules, Some(storage))?;
    let resolved = state.reload(&rule_resolver).await;
    for failure in &resolved.failures {
        tracing::warn!("Rule source {} failed: {}", failure.rule_url, failure.error);
    }

    let flusher = Arc::clone(&state).spawn_flush_loop();

    if cli.urls.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if !line.is_empty() {
                process_line(&state, line, cli.json)?;
            }
        }
    } else {
        for url in &cli.urls {
            process_line(&state, url, cli.json)?;
        }
    }

    flusher.abort();
    state.flush();

    Ok(())
}

/// Cleans one input line and prints the result
fn process_line(state: &AppState, line: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        match state.handle_json_request(line) {
            Ok(response) => println!("{}", response),
            Err(e) => tracing::warn!("Skipping malformed request '{}': {}", line, e),
        }
        return Ok(());
    }

    if let Err(e) = parse_web_url(line) {
        tracing::warn!("Passing through '{}': {}", line, e);
        println!("{}", line);
        return Ok(());
    }

    let response = state.handle_request(&InterceptRequest::navigation(line));
    if response.cancel {
        println!("BLOCKED {}", line);
    } else {
        println!("{}", response.redirect_url.as_deref().unwrap_or(line));
    }
    Ok(())
}
