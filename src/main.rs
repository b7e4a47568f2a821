use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use feedscout::config::{Config, DEFAULT_CONFIG_PATH};
use feedscout::feed::{
    apply_fixes, check_feeds, ingest, load_feed_list, propose_fixes, save_feed_list,
    FeedDefinition, Fetcher, FetcherSettings, IngestOptions,
};
use feedscout::storage::{Database, DatabaseError};

#[derive(Parser, Debug)]
#[command(
    name = "feedscout",
    version,
    about = "Discover, validate and ingest RSS/Atom news feeds"
)]
struct Args {
    /// Config file (TOML)
    #[arg(long, global = true, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Feed list (YAML), overrides `feeds_path`
    #[arg(long, global = true, value_name = "FILE")]
    feeds: Option<PathBuf>,

    /// Verbose logging (default filter `debug` instead of `info`)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Strictly validate every feed; exit 1 if any fails
    Check,

    /// Find working replacements for broken feeds
    Fix {
        /// Write the replacements back to the feed list
        #[arg(long)]
        apply: bool,
    },

    /// Fetch every feed into the article store
    Ingest {
        /// Entries taken from the top of each feed
        #[arg(long, value_name = "N")]
        max_per_feed: Option<usize>,

        /// Article store (SQLite), overrides `database_path`
        #[arg(long, value_name = "FILE")]
        database: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.debug);

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config: {}", args.config.display()))?;
    if let Some(feeds) = &args.feeds {
        config.feeds_path = feeds.display().to_string();
    }

    let fetcher =
        Fetcher::new(FetcherSettings::from(&config)).context("Failed to build HTTP client")?;
    let feeds_path = PathBuf::from(&config.feeds_path);
    let feeds = load_feed_list(&feeds_path).context("Failed to load feed list")?;

    match args.command {
        Command::Check => run_check(&fetcher, &feeds, &config).await,
        Command::Fix { apply } => run_fix(&fetcher, feeds, &feeds_path, &config, apply).await,
        Command::Ingest {
            max_per_feed,
            database,
            json,
        } => {
            if let Some(max) = max_per_feed {
                config.max_items_per_feed = max;
            }
            if let Some(database) = database {
                config.database_path = database.display().to_string();
            }
            run_ingest(&fetcher, &feeds, &config, json).await
        }
    }
}

async fn run_check(fetcher: &Fetcher, feeds: &[FeedDefinition], config: &Config) -> Result<ExitCode> {
    tracing::info!(feeds = feeds.len(), "Checking feeds");
    let failing = check_feeds(fetcher, feeds, config.check_concurrency).await;

    if failing.is_empty() {
        tracing::info!("All {} feeds are healthy", feeds.len());
        return Ok(ExitCode::SUCCESS);
    }

    tracing::error!("{} feed(s) failed:", failing.len());
    for feed in &failing {
        tracing::error!("  {:<30} {}", feed.label(), feed.url);
    }
    Ok(ExitCode::FAILURE)
}

async fn run_fix(
    fetcher: &Fetcher,
    mut feeds: Vec<FeedDefinition>,
    feeds_path: &Path,
    config: &Config,
    apply: bool,
) -> Result<ExitCode> {
    tracing::info!(feeds = feeds.len(), "Checking feeds");
    let report = propose_fixes(
        fetcher,
        &feeds,
        &config.probe_suffixes,
        config.check_concurrency,
    )
    .await;

    if report.broken == 0 {
        tracing::info!("All feeds already valid");
        return Ok(ExitCode::SUCCESS);
    }

    tracing::warn!(
        "{} feed(s) need attention; {} have auto-repair suggestions",
        report.broken,
        report.fixes.len()
    );
    for fix in &report.fixes {
        tracing::warn!("  {} -> {}", fix.old_url, fix.new_url);
    }

    if apply && !report.fixes.is_empty() {
        let patched = apply_fixes(&mut feeds, &report.fixes);
        save_feed_list(feeds_path, &feeds).context("Failed to save feed list")?;
        tracing::info!(
            path = %feeds_path.display(),
            "Feed list updated ({} URLs patched)",
            patched
        );
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_ingest(
    fetcher: &Fetcher,
    feeds: &[FeedDefinition],
    config: &Config,
    json: bool,
) -> Result<ExitCode> {
    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            anyhow::bail!(
                "Database {} is locked by another process. Please wait for it to finish and try again.",
                config.database_path
            );
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let report = ingest(&db, fetcher, feeds, &IngestOptions::from(config)).await;

    if json {
        let out = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
        println!("{out}");
    }

    Ok(ExitCode::SUCCESS)
}
