//! gazette - CLI entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use git2::Repository;
use tracing::warn;

use gazette::cache::CacheStore;
use gazette::config::Config;
use gazette::git::{RangeRequest, ResolvedRange, fetch_commits, resolve_range, tags};
use gazette::github::{auth, detect_remote, fetch_merged_prs};
use gazette::output::{self, OutputFormat};
use gazette::provider::select_provider;
use gazette::summarize::{ReduceOptions, reduce, run_map};
use gazette::unit::{PreparedUnit, extract_units, select_evidence};

/// Generate concise, user-facing release notes from git activity.
#[derive(Parser, Debug)]
#[command(name = "gazette")]
#[command(about = "Generate concise, user-facing release notes from git activity")]
#[command(version)]
struct Cli {
    /// Generate notes for the release ending at this tag
    #[arg(long)]
    tag: Option<String>,

    /// Start commit SHA for the range (exclusive)
    #[arg(long)]
    from_sha: Option<String>,

    /// End commit SHA for the range (defaults to HEAD)
    #[arg(long, requires = "from_sha")]
    to_sha: Option<String>,

    /// Earliest commit date, YYYY-MM-DD
    #[arg(long)]
    since_date: Option<String>,

    /// Latest commit date, YYYY-MM-DD
    #[arg(long)]
    until_date: Option<String>,

    /// Relative window ending at HEAD, e.g. 7d, 24h, 2w
    #[arg(long)]
    window: Option<String>,

    /// Render Markdown instead of terminal text
    #[arg(long, conflicts_with = "json")]
    md: bool,

    /// Render JSON instead of terminal text
    #[arg(long)]
    json: bool,

    /// Human label for the release heading
    #[arg(long)]
    label: Option<String>,

    /// Do not send code excerpts to the summarizer
    #[arg(long)]
    no_code: bool,

    /// Include internal-only changes in the output
    #[arg(long, conflicts_with = "drop_internal")]
    include_internal: bool,

    /// Hide internal-only changes (the default)
    #[arg(long)]
    drop_internal: bool,

    /// Force a summarization provider
    #[arg(long, value_parser = ["openai", "cerebras", "heuristic"])]
    provider: Option<String>,

    /// Concurrent summarization requests
    #[arg(long)]
    concurrency: Option<usize>,

    /// Repository root (defaults to discovery from the working directory)
    #[arg(long)]
    repo_root: Option<PathBuf>,

    /// Path to a gazette.config.yml file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bypass the bullet cache for this run
    #[arg(long)]
    no_cache: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run environment diagnostics
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the rendered summary; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let repo = open_repository(cli.repo_root.as_deref())?;
    let repo_root = repo
        .workdir()
        .unwrap_or_else(|| repo.path())
        .to_path_buf();

    let mut config = Config::load(&repo_root, cli.config.as_deref())
        .context("Failed to load configuration")?;
    apply_cli_overrides(&mut config, &cli);

    if matches!(cli.command, Some(Command::Check)) {
        return run_check(&repo, &repo_root, &config);
    }

    run(&cli, &repo, &repo_root, &config).await
}

async fn run(cli: &Cli, repo: &Repository, repo_root: &Path, config: &Config) -> Result<()> {
    status("resolving commit range...");
    let request = RangeRequest {
        tag: cli.tag.clone(),
        from_sha: cli.from_sha.clone(),
        to_sha: cli.to_sha.clone(),
        since_date: cli.since_date.clone(),
        until_date: cli.until_date.clone(),
        window: cli.window.clone(),
    };
    let range = resolve_range(repo, &request, config.fallback_window_days)
        .context("Failed to resolve commit range")?;
    status(&format!("range {}", range.describe()));

    status("reading commits and pull requests...");
    let commits = fetch_commits(repo, &range).context("Failed to read commits")?;
    let prs = if commits.is_empty() {
        Vec::new()
    } else {
        let since = commits.first().map(|c| c.timestamp);
        match fetch_prs(repo, since).await {
            Ok(prs) => prs,
            Err(e) => {
                warn!("Could not fetch PR metadata: {e}. Continuing with commits only.");
                Vec::new()
            }
        }
    };

    status("extracting change units...");
    let extracted = extract_units(repo, &commits, &prs, &config.internal);
    let prepared: Vec<PreparedUnit> = extracted
        .into_iter()
        .map(|unit| select_evidence(unit, &config.evidence, !cli.no_code))
        .collect();
    status(&format!(
        "{} commits grouped into {} units",
        commits.len(),
        prepared.len()
    ));

    let provider =
        select_provider(&config.providers, cli.provider.as_deref()).context("Provider selection failed")?;

    let cache = if cli.no_cache {
        None
    } else {
        match CacheStore::open(repo_root) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("Cache unavailable: {e}. Continuing without caching.");
                None
            }
        }
    };

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("gazette: interrupt received, finishing without new provider calls");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    status("summarizing individual changes...");
    let outcome = run_map(&prepared, provider.as_ref(), cache.as_ref(), &config.map, &cancel).await;
    for warning in &outcome.warnings {
        warn!("{warning}");
    }

    status("merging summaries...");
    let options = ReduceOptions {
        include_internal: config.include_internal,
        label: resolve_label(cli, config, &range),
    };
    let summary = reduce(
        &range.describe(),
        outcome.bullets,
        &outcome.stats,
        &config.reduce,
        &options,
    );

    status("rendering output...");
    let format = if cli.json {
        OutputFormat::Json
    } else if cli.md {
        OutputFormat::Markdown
    } else {
        OutputFormat::Terminal
    };
    let rendered = output::render(&summary, format).context("Failed to render summary")?;
    print!("{rendered}");
    if !rendered.ends_with('\n') {
        println!();
    }

    Ok(())
}

/// Open the repository, discovering upward from the working directory
/// unless a root was given.
fn open_repository(root: Option<&Path>) -> Result<Repository> {
    match root {
        Some(root) => Repository::open(root)
            .with_context(|| format!("Not a git repository: {}", root.display())),
        None => Repository::discover(".")
            .context("Not a git repository. Run gazette from within a git repository."),
    }
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if cli.include_internal {
        config.include_internal = true;
    }
    if cli.drop_internal {
        config.include_internal = false;
    }
    if let Some(concurrency) = cli.concurrency {
        config.map.concurrency = concurrency.max(1);
    }
}

/// Label precedence: the flag, then the per-tag config table, then the
/// configured default.
fn resolve_label(cli: &Cli, config: &Config, range: &ResolvedRange) -> Option<String> {
    cli.label
        .clone()
        .or_else(|| config.label_for_tag(range.to_tag.as_deref()))
}

async fn fetch_prs(
    repo: &Repository,
    since: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<Vec<gazette::PullRequest>> {
    let (owner, name) = detect_remote(repo).context("No GitHub remote detected")?;
    let token = auth::get_github_token().ok();
    if token.is_none() {
        warn!("No GitHub token found; fetching PR metadata anonymously");
    }
    let prs = fetch_merged_prs(token.as_deref(), &owner, &name, since).await?;
    status(&format!("{} merged PRs from {owner}/{name}", prs.len()));
    Ok(prs)
}

/// Environment diagnostics, printed as one line per check.
fn run_check(repo: &Repository, repo_root: &Path, config: &Config) -> Result<()> {
    status("running environment diagnostics...");
    let mut has_error = false;

    println!("[OK] Repository root: {}", repo_root.display());

    let config_file = ["gazette.config.yml", "gazette.config.yaml"]
        .iter()
        .map(|name| repo_root.join(name))
        .find(|path| path.exists());
    match config_file {
        Some(path) => println!("[OK] Config file: {}", path.display()),
        None => println!("[OK] No config file; built-in defaults in use"),
    }

    match tags::get_latest_reachable_tag(repo) {
        Ok(Some(tag)) => println!("[OK] Latest reachable tag: {}", tag.name),
        Ok(None) => println!(
            "[WARN] No tags reachable from HEAD; default range falls back to {} days",
            config.fallback_window_days
        ),
        Err(e) => {
            println!("[ERROR] Could not inspect tags: {e}");
            has_error = true;
        }
    }

    match detect_remote(repo) {
        Ok((owner, name)) => println!("[OK] GitHub remote: {owner}/{name}"),
        Err(_) => println!("[WARN] No GitHub remote; PR grouping uses commit messages only"),
    }

    match auth::token_source() {
        Some(source) => println!("[OK] GitHub token available via {source}"),
        None => println!("[WARN] No GitHub token; PR metadata limited to anonymous rate limits"),
    }

    match select_provider(&config.providers, None) {
        Ok(provider) if provider.id() == "heuristic" => {
            println!("[WARN] No provider credentials; summaries fall back to commit titles");
        }
        Ok(provider) => println!(
            "[OK] Summarization provider: {} (model {})",
            provider.id(),
            provider.model()
        ),
        Err(e) => {
            println!("[ERROR] Provider selection failed: {e}");
            has_error = true;
        }
    }

    match CacheStore::open(repo_root) {
        Ok(store) => println!("[OK] Cache directory: {}", store.dir().display()),
        Err(e) => {
            println!("[ERROR] Cache directory unusable: {e}");
            has_error = true;
        }
    }

    if has_error {
        bail!("environment diagnostics reported errors");
    }
    Ok(())
}

/// Progress line on stderr; stdout is reserved for the rendered
/// summary.
fn status(message: &str) {
    eprintln!("gazette: {message}");
}
