//! helper-bot CLI: the r/PCSX2 helper bot service and its offline tools.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use pcsx2_helper_bot::backoff::{ThreadSleeper, classify_fault, run_supervised};
use pcsx2_helper_bot::catalog::scrape::{HttpListing, parse_listing};
use pcsx2_helper_bot::catalog::{Catalog, CatalogSource};
use pcsx2_helper_bot::command::CommandParser;
use pcsx2_helper_bot::compose::Composer;
use pcsx2_helper_bot::config::{BotConfig, CatalogBotConfig, RedditCredentials};
use pcsx2_helper_bot::resolve::{EntityResolver, Resolution};
use pcsx2_helper_bot::transport::RedditTransport;

#[derive(Parser)]
#[command(name = "helper-bot", version, about = "PCSX2 forum helper bot")]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream the subreddit and answer summons until interrupted.
    Run,

    /// Resolve a query against one bot's catalog and print the reply segment.
    Resolve {
        /// Bot name from the config, e.g. "cpu", "gpu", "wiki".
        bot: String,

        /// Search term.
        query: String,

        /// Read the listing from a saved HTML file instead of fetching it.
        #[arg(long)]
        listing: Option<PathBuf>,

        /// Fetch the detail page of a direct match.
        #[arg(long)]
        detail: bool,
    },

    /// Show which terms each summon phrase extracts from a comment body.
    Parse {
        /// Comment body.
        body: String,
    },

    /// Classify a fault text the way the scheduler does.
    Classify {
        /// Fault text, e.g. "RATELIMIT: try again in 3 minutes."
        text: String,
    },

    /// Print the effective configuration as TOML.
    Config {
        /// Write it to this path instead of stdout.
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let fallback = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run => run(&config)?,

        Commands::Resolve {
            bot,
            query,
            listing,
            detail,
        } => {
            let Some(bot_config) = config.catalog_bots().find(|b| b.name == bot) else {
                let names: Vec<&str> = config.catalog_bots().map(|b| b.name.as_str()).collect();
                miette::bail!("unknown bot {bot:?}; configured: {}", names.join(", "));
            };
            let catalog = match listing {
                Some(path) => {
                    let html = std::fs::read_to_string(&path).into_diagnostic()?;
                    parse_listing(bot_config.source, &html, &bot_config.url)?
                }
                None => fetch_catalog(bot_config)?,
            };

            let resolver = EntityResolver::new(bot_config.resolver.clone())?;
            let mut resolution = resolver.resolve(&query, &catalog);
            if let Resolution::Matched { entry, score, .. } = &resolution {
                println!("matched {:?} (score {score})", entry.name);
                if detail {
                    let fetched = bot_config.source.fetch_detail(&entry.reference)?;
                    resolution = Resolution::Matched {
                        entry: entry.clone(),
                        score: *score,
                        detail: Some(fetched),
                    };
                }
            }
            let composer = Composer::new(
                bot_config.reply.clone(),
                bot_config.tiers.clone(),
                &bot_config.usage,
            );
            println!("{}", composer.compose(&query, &resolution));
        }

        Commands::Parse { body } => {
            let phrases: Vec<&str> = config.responders.iter().map(|r| r.phrase()).collect();
            for phrase in &phrases {
                let parser = CommandParser::new(phrase, phrases.iter().copied())?;
                match parser.terms(&body) {
                    Ok(terms) if terms.is_empty() => {}
                    Ok(terms) => println!("{phrase} {terms:?}"),
                    Err(e) => println!("{phrase} error: {e}"),
                }
            }
        }

        Commands::Classify { text } => {
            println!("{:?}", config.backoff.classify(&text));
            println!("(with default backoff: {:?})", classify_fault(&text));
        }

        Commands::Config { write } => match write {
            Some(path) => {
                config.save(&path)?;
                println!("Wrote configuration to {}", path.display());
            }
            None => print!("{}", config.to_toml()?),
        },
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<BotConfig> {
    match path {
        Some(path) => Ok(BotConfig::load(path)?),
        None => {
            let config = BotConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn fetch_catalog(bot: &CatalogBotConfig) -> pcsx2_helper_bot::error::CatalogResult<Catalog> {
    HttpListing::new(bot.source, &bot.url).fetch()
}

fn run(config: &BotConfig) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown)).into_diagnostic()?;
    }

    let credentials = RedditCredentials::from_env()?;
    let dispatcher = config.build_dispatcher(fetch_catalog)?;
    let phrases: Vec<&str> = dispatcher.phrases().collect();
    tracing::info!(phrases = ?phrases, "responders registered");

    let mut transport = RedditTransport::connect(
        credentials,
        &config.bot.subreddit,
        &config.bot.user_agent,
        Duration::from_secs(config.bot.poll_interval_secs),
        Arc::clone(&shutdown),
    )?;

    let sleeper = ThreadSleeper::interruptible(Arc::clone(&shutdown));
    let (end, stats) = run_supervised(
        &dispatcher,
        &mut transport,
        config.backoff,
        &sleeper,
        shutdown,
    );
    tracing::info!(
        ?end,
        replied = stats.replied,
        skipped = stats.skipped,
        faults = stats.faults,
        rate_limits = stats.rate_limits,
        "helper bot stopped"
    );
    Ok(())
}
