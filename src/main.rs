//! Langmirror main entry point
//!
//! This is the command-line interface for the Langmirror site mirror.

use anyhow::Context;
use clap::Parser;
use langmirror::config::{load_config_with_hash, Config};
use langmirror::crawler::{mirror, MirrorOptions};
use langmirror::output::{load_statistics, print_statistics};
use langmirror::storage::open_frontier;
use std::path::PathBuf;
use tracing::instrument::WithSubscriber;
use tracing_subscriber::EnvFilter;

/// Langmirror: a language-scoped static site mirror
///
/// Langmirror renders every page of one language section of a website in a
/// real browser, rewrites links and resources to a mirror origin and writes a
/// self-hosting copy to disk. Interrupted runs resume where they stopped.
#[derive(Parser, Debug)]
#[command(name = "langmirror")]
#[command(version)]
#[command(about = "A language-scoped static site mirror", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be mirrored without rendering anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the frontier database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Process this URL before anything already queued (repeatable)
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Seed only the language root instead of reading the sitemap
    #[arg(long)]
    skip_sitemap: bool,

    /// WebDriver endpoint, overriding the config file
    #[arg(long, value_name = "URL", env = "LANGMIRROR_RENDERER_ENDPOINT")]
    renderer_endpoint: Option<String>,

    /// WebDriver access token, overriding the config file
    #[arg(
        long,
        value_name = "TOKEN",
        env = "LANGMIRROR_RENDERER_TOKEN",
        hide_env_values = true
    )]
    renderer_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, cli.quiet))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .finish();

    run(cli).with_subscriber(subscriber).await
}

/// Picks the log filter for the verbosity flags
fn log_filter(verbose: u8, quiet: bool) -> EnvFilter {
    if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("langmirror=info,warn"),
            1 => EnvFilter::new("langmirror=debug,info"),
            2 => EnvFilter::new("langmirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("cannot load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(endpoint) = cli.renderer_endpoint {
        config.renderer.endpoint = endpoint;
    }
    if let Some(token) = cli.renderer_token {
        config.renderer.token = Some(token);
    }

    let options = MirrorOptions {
        seeds: cli.seeds,
        skip_sitemap: cli.skip_sitemap,
    };

    if cli.dry_run {
        handle_dry_run(&config, &options);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_mirror(config, &config_hash, options).await
    }
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, options: &MirrorOptions) {
    println!("=== Langmirror Dry Run ===\n");

    println!("Site:");
    println!("  Source: {}", config.site.source_origin);
    println!("  Language: {}", config.site.language);
    println!("  Mirror: {}", config.site.mirror_origin);

    println!("\nOutput:");
    println!("  Root: {}", config.output.root_dir.display());
    println!("  Database: {}", config.output.database_path.display());
    println!("  Assets: {}", config.output.assets_path().display());

    println!("\nRenderer:");
    println!("  Endpoint: {}", config.renderer.endpoint);
    println!(
        "  Token: {}",
        if config.renderer.token.is_some() {
            "set"
        } else {
            "none"
        }
    );
    println!("  Browser: {}", config.renderer.browser);
    println!("  Headless: {}", config.renderer.headless);
    println!("  Settle time: {}ms", config.renderer.settle_time_ms);
    println!("  Page timeout: {}s", config.renderer.page_timeout_secs);

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Backoff base: {}ms", config.retry.backoff_base_ms);
    println!("  Max jitter: {}ms", config.retry.max_jitter_ms);

    println!("\nAssets:");
    println!("  CDN hosts: {}", config.assets.cdn_hosts.join(", "));
    println!(
        "  Fallback origins: {}",
        config.assets.fallback_origins.join(", ")
    );
    for canonical in &config.assets.canonical_names {
        println!("  {}* -> {}", canonical.prefix, canonical.name);
    }

    println!(
        "\nSitemap: {}",
        if config.sitemap.enabled && !options.skip_sitemap {
            format!("enabled (cache {}h)", config.sitemap.max_age_hours)
        } else {
            "skipped".to_string()
        }
    );

    if !options.seeds.is_empty() {
        println!("\nPriority seeds ({}):", options.seeds.len());
        for seed in &options.seeds {
            println!("  * {}", seed);
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start mirroring {}/{}/",
        config.site.source_origin_trimmed(),
        config.site.language
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path.display());

    let frontier = open_frontier(&config.output.database_path).with_context(|| {
        format!(
            "cannot open frontier {}",
            config.output.database_path.display()
        )
    })?;
    let stats = load_statistics(&frontier)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main mirror operation
async fn handle_mirror(
    config: Config,
    config_hash: &str,
    options: MirrorOptions,
) -> anyhow::Result<()> {
    tracing::info!(
        "Mirroring {}/{}/ to {}",
        config.site.source_origin_trimmed(),
        config.site.language,
        config.site.mirror_origin
    );

    let summary = mirror(config, config_hash, options)
        .await
        .context("mirror run failed")?;

    tracing::info!(
        "Mirror completed: {} pages persisted, {} abandoned in {:?}",
        summary.pages_persisted,
        summary.pages_abandoned,
        summary.duration
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repeated_seeds() {
        let cli = Cli::try_parse_from([
            "langmirror",
            "mirror.toml",
            "--seed",
            "https://www.example.org/es/a",
            "--seed",
            "https://www.example.org/es/b",
            "--skip-sitemap",
        ])
        .unwrap();

        assert_eq!(cli.seeds.len(), 2);
        assert!(cli.skip_sitemap);
    }

    #[test]
    fn test_dry_run_conflicts_with_stats() {
        assert!(Cli::try_parse_from(["langmirror", "m.toml", "--dry-run", "--stats"]).is_err());
    }
}
