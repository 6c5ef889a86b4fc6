//! CLI entry point for the evidence enrichment worker.
//!
//! This binary wires the library crate's components together the way a
//! deployment would: build a provider registry from the environment,
//! construct the worker, and drive its single long-running loop until a
//! shutdown signal arrives. The persistent queue/evidence store, LLM,
//! embedding, and translation collaborators are all external systems
//! per the pipeline's contract (see `enrichment_runtime::store`); this
//! binary falls back to the in-memory store and mock translator so `run`
//! and `doctor` work standalone, and only wires the real LLM client when
//! an API key is present in the environment.

use std::sync::Arc;

use clap::{Arg, Command};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use enrichment_runtime::breaker::CircuitBreakerConfig;
use enrichment_runtime::llm::CloudLlmCompletion;
use enrichment_runtime::metrics::file::FileMetrics;
use enrichment_runtime::metrics::{Metrics, NoopMetrics};
use enrichment_runtime::providers::build_registry_from_env;
use enrichment_runtime::store::InMemoryStore;
use enrichment_runtime::translate::MockTranslator;
use enrichment_runtime::{EnrichmentStore, EnrichmentWorker, WorkerConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::try_init().ok();

    let matches = Command::new("enrichment-worker")
        .version(VERSION)
        .about("Evidence enrichment pipeline: query generation, provider fan-out, content extraction, and claim scoring")
        .subcommand(
            Command::new("run")
                .about("Start the enrichment worker loop")
                .arg(
                    Arg::new("metrics-file")
                        .long("metrics-file")
                        .value_name("PATH")
                        .help("Write periodic JSON metrics snapshots to PATH instead of discarding them"),
                ),
        )
        .subcommand(
            Command::new("doctor")
                .about("Validate configuration and report provider availability"),
        )
        .subcommand(Command::new("status").about("Show the registered provider order"))
        .get_matches();

    match matches.subcommand() {
        Some(("run", sub)) => run(sub).await,
        Some(("doctor", _)) => doctor().await,
        Some(("status", _)) => status().await,
        _ => {
            println!("enrichment-worker v{VERSION}");
            println!("Use --help for available commands");
        }
    }
}

fn load_config() -> WorkerConfig {
    match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration, falling back to defaults");
            WorkerConfig::default()
        }
    }
}

async fn run(sub_matches: &clap::ArgMatches) {
    let config = load_config();
    if let Err(err) = config.validate() {
        error!(error = %err, "configuration failed validation");
        std::process::exit(1);
    }

    let registry = Arc::new(build_registry_from_env(
        &config.providers.order,
        CircuitBreakerConfig {
            reset_after: config.providers.cooldown,
            ..CircuitBreakerConfig::default()
        },
    ));

    let available = registry.available_providers(CancellationToken::new()).await;
    if available.is_empty() {
        warn!("no search providers configured; set e.g. YACY_BASE_URL or NEWSAPI_API_KEY");
    } else {
        info!(count = available.len(), "search providers available");
    }

    let llm = CloudLlmCompletion::from_env().map(|c| Arc::new(c) as Arc<dyn enrichment_runtime::llm::LlmCompletion>);
    if llm.is_none() {
        info!("no LLM collaborator configured; claim extraction runs heuristic-only");
    }

    let translator = if config.query_translate {
        Some(Arc::new(MockTranslator) as Arc<dyn enrichment_runtime::translate::Translator>)
    } else {
        None
    };

    let store: Arc<dyn EnrichmentStore> = Arc::new(InMemoryStore::default());
    info!("using the in-memory store; wire a persistent EnrichmentStore implementation for production use");

    let metrics: Arc<dyn Metrics> = match sub_matches.get_one::<String>("metrics-file") {
        Some(path) => Arc::new(FileMetrics::new(path.clone())),
        None => Arc::new(NoopMetrics),
    };

    let worker = EnrichmentWorker::new(config, store, registry, llm, None, translator, metrics);

    let ctx = CancellationToken::new();
    let shutdown_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown_ctx.cancel();
        }
    });

    if let Err(err) = worker.run(ctx).await {
        error!(error = %err, "enrichment worker exited with error");
        std::process::exit(1);
    }
}

async fn doctor() {
    let config = load_config();
    match config.validate() {
        Ok(()) => println!("configuration: OK"),
        Err(err) => {
            println!("configuration: INVALID ({err})");
            std::process::exit(1);
        }
    }

    let registry = build_registry_from_env(
        &config.providers.order,
        CircuitBreakerConfig {
            reset_after: config.providers.cooldown,
            ..CircuitBreakerConfig::default()
        },
    );
    let available = registry.available_providers(CancellationToken::new()).await;
    println!("providers configured: {}", config.providers.order.join(", "));
    println!(
        "providers available:  {}",
        available.iter().map(|p| p.name().to_string()).collect::<Vec<_>>().join(", ")
    );

    if CloudLlmCompletion::from_env().is_some() {
        println!("LLM collaborator:     configured");
    } else {
        println!("LLM collaborator:     not configured (heuristic claim extraction only)");
    }
}

async fn status() {
    let config = load_config();
    println!("provider order: {}", config.providers.order.join(", "));
    println!("max evidence per item: {}", config.max_evidence_per_item);
    println!("min agreement: {}", config.min_agreement);
    println!("item timeout: {:?}", config.item_timeout);
}
