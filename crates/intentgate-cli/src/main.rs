//! intentgate - command-line host for intention gating.
//!
//! `intentgate session` simulates one browser page context in the terminal:
//! type URLs to open them, answer the intention prompt, and pick a conflict
//! choice. The other subcommands inspect and maintain the intention store.
//!
//! # Configuration
//!
//! Reads `--config <file>` (TOML, JSON or YAML) or the environment
//! (`INTENTGATE_*`, `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`). A `.env` file is
//! loaded first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use intentgate_core::{
    normalize_domain, BlocklistResolver, Category, Classifier, CleanupScheduler, ConflictChoice,
    ContentExtractor, GateConfig, GateError, GateState, InterceptDecision, InterceptorDeps,
    IntentionMatcher, IntentionStore, IntentionValidator, KeyValueStore, KvOverrideSource,
    RouteInterceptor, SqliteKvStore, StaticEntitlement, SubmitOutcome,
};
use intentgate_extractors::ExtractionPipeline;
use intentgate_llm::LlmFactory;

mod console;

use console::ConsoleNavigator;

#[derive(Parser)]
#[command(name = "intentgate", version, about = "Gate distracting sites behind a stated intention")]
struct Cli {
    /// Configuration file (.toml, .json or .yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Simulate a page context: open URLs and answer prompts interactively
    Session {
        /// URL to open first
        url: Option<String>,
    },
    /// Show whether a URL is blocked and what is stored for its domain
    Check { url: String },
    /// Validate an intention without storing it
    Validate { text: String },
    /// Match the page at a URL against its domain's stored intention
    Match { url: String },
    /// List stored intentions and the active one
    Status {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove expired intentions now
    Sweep,
    /// Run the periodic expiry sweep until interrupted
    Daemon,
    /// Clear the active intention, or everything stored for one domain
    Clear { domain: Option<String> },
    /// Block a site: re-blocks a built-in one, or adds a custom one
    Block { domain: String },
    /// Allow a site: unblocks a built-in one, or drops a custom one
    Unblock { domain: String },
    /// Remove a domain from the override set
    Reset { domain: String },
}

struct App {
    config: GateConfig,
    store: Arc<IntentionStore>,
    overrides: Arc<KvOverrideSource>,
    classifier: Classifier,
}

impl App {
    fn open(config: GateConfig) -> Result<Self> {
        let path = config.store_path();
        let kv: Arc<dyn KeyValueStore> = Arc::new(
            SqliteKvStore::new(&path)
                .with_context(|| format!("opening store at {}", path.display()))?,
        );
        let store = Arc::new(IntentionStore::new(kv.clone(), config.store.clone()));
        let overrides = Arc::new(KvOverrideSource::new(kv));
        let classifier = build_classifier(&config);
        Ok(Self {
            config,
            store,
            overrides,
            classifier,
        })
    }

    fn extractor(&self) -> Result<Arc<dyn ContentExtractor>> {
        Ok(Arc::new(ExtractionPipeline::http(self.config.extractor.clone())?))
    }
}

/// Classifier for the configured provider, or one that fails open when no
/// credentials are available.
fn build_classifier(config: &GateConfig) -> Classifier {
    match LlmFactory::from_config(&config.llm) {
        Ok(llm) => Classifier::new(llm, &config.classifier),
        Err(e) => {
            let hint = e.suggestion().unwrap_or_default();
            if matches!(e, GateError::MissingCredentials(_)) {
                warn!(error = %e, hint, "No classifier credentials, AI classification disabled");
            } else {
                warn!(error = %e, hint, "Could not create LLM provider, AI classification disabled");
            }
            Classifier::unconfigured(&config.classifier)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<GateConfig> {
    match path {
        Some(path) => GateConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(GateConfig::from_env()),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

/// Prefix `https://` when the input has no scheme.
fn as_url(input: &str) -> String {
    let input = input.trim();
    if input.contains("://") || (input.contains(':') && !input.contains('.')) {
        input.to_string()
    } else {
        format!("https://{}", input)
    }
}

fn parse_choice(input: &str) -> Option<ConflictChoice> {
    match input.trim().to_lowercase().as_str() {
        "continue" | "c" => Some(ConflictChoice::ContinueWithActive),
        "new" | "n" => Some(ConflictChoice::SetNewIntention),
        "back" | "b" => Some(ConflictChoice::GoBack),
        _ => None,
    }
}

fn report(decision: &InterceptDecision) {
    match decision {
        InterceptDecision::Allowed(reason) => println!("allowed ({:?})", reason),
        InterceptDecision::Monitoring { domain } => println!("allowed, watching {}", domain),
        // The navigator already rendered these.
        InterceptDecision::Prompted { .. } | InterceptDecision::Conflict(_) => {}
    }
}

/// Sweep expired intentions now and schedule the periodic sweep.
async fn start_cleanup(store: Arc<IntentionStore>) -> Result<CleanupScheduler> {
    let scheduler = CleanupScheduler::from_store(store).await?;
    let removed = scheduler.start().await?;
    info!(
        removed,
        interval_minutes = scheduler.interval_minutes(),
        "Sweeping expired intentions"
    );
    Ok(scheduler)
}

async fn run_session(app: App, start: Option<String>) -> Result<()> {
    let mut cleanup = start_cleanup(app.store.clone()).await?;
    let (navigator, mut loads) = ConsoleNavigator::new();
    let navigator = Arc::new(navigator);
    let interceptor = RouteInterceptor::new(
        InterceptorDeps {
            store: app.store.clone(),
            overrides: app.overrides.clone(),
            classifier: app.classifier.clone(),
            extractor: app.extractor()?,
            navigator: navigator.clone(),
            entitlement: Arc::new(StaticEntitlement(true)),
        },
        &app.config,
    );

    if let Some(url) = start {
        let url = as_url(&url);
        navigator.visit(&url);
        report(&interceptor.on_page_load(&url).await);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(url) = loads.recv() => {
                report(&interceptor.on_page_load(&url).await);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "quit" || line == "exit" {
                    break;
                }

                if interceptor.pending_conflict().is_some() {
                    match parse_choice(line) {
                        Some(choice) => match interceptor.resolve_conflict(choice).await {
                            Ok(resolution) => debug!(?resolution, "Conflict resolved"),
                            Err(e) => warn!(error = %e, "Conflict resolution failed"),
                        },
                        None => println!("continue | new | back"),
                    }
                } else if interceptor.state() == GateState::AwaitingInput {
                    match interceptor.submit(line).await {
                        SubmitOutcome::Accepted { redirect_to } => {
                            debug!(%redirect_to, "Intention accepted")
                        }
                        SubmitOutcome::TimedPass { minutes, .. } => {
                            println!("pass granted for {} minutes", minutes)
                        }
                        SubmitOutcome::Rejected { .. } => {}
                        SubmitOutcome::Busy => println!("still checking the last answer"),
                        SubmitOutcome::NotAwaitingInput => {}
                    }
                } else {
                    let url = as_url(line);
                    navigator.visit(&url);
                    report(&interceptor.on_page_load(&url).await);
                }
            }
        }
    }

    interceptor.shutdown();
    cleanup.shutdown().await?;
    Ok(())
}

async fn check(app: &App, url: &str) -> Result<()> {
    let url = as_url(url);
    let domain = normalize_domain(&url);
    let verdict = BlocklistResolver::new(app.overrides.clone())
        .resolve(&url)
        .await?;

    println!(
        "{}: {} ({:?})",
        domain,
        if verdict.is_blocked() { "blocked" } else { "allowed" },
        verdict
    );
    if let Some(category) = Category::of(&domain) {
        println!(
            "  category: {}{}",
            category,
            if category.time_blockable() { ", accepts timed passes" } else { "" }
        );
    }
    match app.store.get(&domain).await? {
        Some(record) => match record.timed_pass_minutes() {
            Some(minutes) => println!(
                "  timed pass: {} minutes, until {}",
                minutes,
                record.expires_at.format("%H:%M")
            ),
            None => println!(
                "  intention: \"{}\", until {}",
                record.intention_text,
                record.expires_at.format("%Y-%m-%d %H:%M")
            ),
        },
        None => println!("  no stored intention"),
    }
    Ok(())
}

async fn status(app: &App, json: bool) -> Result<()> {
    let active = app.store.get_active().await?;
    let records = app.store.list().await?;

    if json {
        let out = serde_json::json!({
            "active": active.as_ref().map(|a| serde_json::json!({
                "domain": a.domain,
                "intention": a.intention_text,
                "expiresAt": a.expires_at.timestamp_millis(),
            })),
            "accessible": app.store.accessible_sites().await?,
            "intentions": records.iter().map(|r| serde_json::json!({
                "domain": r.domain,
                "intention": r.intention_text,
                "createdAt": r.created_at.timestamp_millis(),
                "expiresAt": r.expires_at.timestamp_millis(),
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    match &active {
        Some(a) => println!("active: {} \"{}\"", a.domain, a.intention_text),
        None => println!("active: none"),
    }
    let now = chrono::Utc::now();
    for record in &records {
        let left = (record.expires_at - now).num_minutes().max(0);
        println!("{:<24} {:<40} {}m left", record.domain, record.intention_text, left);
    }
    Ok(())
}

async fn daemon(app: &App) -> Result<()> {
    let mut scheduler = start_cleanup(app.store.clone()).await?;
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping scheduler");
    scheduler.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let app = App::open(config)?;

    match cli.command {
        Command::Session { url } => run_session(app, url).await?,
        Command::Check { url } => check(&app, &url).await?,
        Command::Validate { text } => {
            let outcome = IntentionValidator::new(app.classifier.clone(), app.config.validator.clone())
                .validate(&text)
                .await;
            if outcome.is_valid {
                println!("valid ({:?})", outcome.source);
            } else {
                println!("invalid: {}", outcome.reason.unwrap_or_default());
            }
        }
        Command::Match { url } => {
            let url = as_url(&url);
            let matcher = IntentionMatcher::new(
                app.store.clone(),
                app.extractor()?,
                app.classifier.clone(),
                app.config.matcher.clone(),
            );
            let result = matcher.match_url(&url).await?;
            println!(
                "confidence {:.2}, {}: {}",
                result.confidence,
                if result.matches { "matches" } else { "does not match" },
                result.reasoning
            );
        }
        Command::Status { json } => status(&app, json).await?,
        Command::Sweep => {
            let removed = app.store.cleanup_expired().await?;
            println!("removed {} expired intentions", removed);
        }
        Command::Daemon => daemon(&app).await?,
        Command::Clear { domain: Some(domain) } => {
            let domain = normalize_domain(&domain);
            app.store.clear_active_for(&domain).await?;
            app.store.remove(&domain).await?;
            println!("cleared {}", domain);
        }
        Command::Clear { domain: None } => {
            app.store.clear_active().await?;
            println!("cleared active intention");
        }
        Command::Block { domain } => {
            let domain = normalize_domain(&domain);
            if app.overrides.block(&domain).await? {
                println!("{} blocked", domain);
            } else {
                println!("{} already blocked", domain);
            }
        }
        Command::Unblock { domain } => {
            let domain = normalize_domain(&domain);
            if app.overrides.unblock(&domain).await? {
                println!("{} unblocked", domain);
            } else {
                println!("{} already allowed", domain);
            }
        }
        Command::Reset { domain } => {
            let domain = normalize_domain(&domain);
            if app.overrides.remove(&domain).await? {
                println!("override removed for {}", domain);
            } else {
                println!("{} had no override", domain);
            }
        }
    }
    Ok(())
}
