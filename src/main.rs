//! signal-brain - Signal Ingestion and Windowed Decision Pipeline
//!
//! Runs the source adapters, the window aggregator, or both.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use signal_brain::adapters::cli::{self, CliApp, Command, WindowArgs};
use signal_brain::adapters::memory::{MemoryChannel, MemoryStore};
use signal_brain::adapters::openai::OpenAiOracle;
use signal_brain::adapters::postgres::PostgresStore;
use signal_brain::adapters::pump_fun::PumpFunStream;
use signal_brain::adapters::rabbitmq::RabbitChannel;
use signal_brain::adapters::raydium::RaydiumPoller;
use signal_brain::adapters::social::{HttpSocialSearch, SocialMetricsPoller};
use signal_brain::adapters::source::SignalEmitter;
use signal_brain::application::{Pipeline, PipelineContext, PipelineMode, Sources, WorkerPool};
use signal_brain::config::{load_config, Config};
use signal_brain::ports::{SignalChannel, SignalStore};

const DEFAULT_CONFIG: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = cli::init();
    let mut config = resolve_config(&app)?;
    init_logging(app.verbose, app.debug, &config.logging.level)?;

    let Some(mode) = app.command.mode() else {
        return check_config_command(&config);
    };

    let mut in_memory = false;
    match &app.command {
        Command::Run(cmd) => {
            apply_window_args(&mut config, &cmd.window);
            in_memory = cmd.in_memory;
        }
        Command::Consume(cmd) => apply_window_args(&mut config, &cmd.window),
        Command::Collect(cmd) => {
            config.pump_fun.enabled &= !cmd.no_pump_fun;
            config.raydium.enabled &= !cmd.no_raydium;
            config.social.enabled |= cmd.social;
        }
        Command::CheckConfig => {}
    }
    config
        .validate()
        .context("Invalid configuration after command line overrides")?;

    run_pipeline(&config, mode, in_memory).await
}

fn init_logging(verbose: bool, debug: bool, level: &str) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fmt().with_env_filter(filter).init();
    Ok(())
}

fn resolve_config(app: &CliApp) -> Result<Config> {
    match &app.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            load_config(DEFAULT_CONFIG).context("Failed to load configuration")
        }
        None => Config::from_env().context("Invalid configuration from environment"),
    }
}

fn apply_window_args(config: &mut Config, args: &WindowArgs) {
    if let Some(secs) = args.window_secs {
        config.window.duration_secs = secs;
    }
    config.window.idle_flush |= args.idle_flush;
}

fn check_config_command(config: &Config) -> Result<()> {
    let mut shown = config.clone();
    if shown.oracle.api_key.is_some() {
        shown.oracle.api_key = Some("<redacted>".to_string());
    }
    if shown.social.api_token.is_some() {
        shown.social.api_token = Some("<redacted>".to_string());
    }

    let rendered = toml::to_string_pretty(&shown).context("Failed to render configuration")?;
    println!("{}", rendered);
    println!("# configuration OK");
    Ok(())
}

async fn connect(
    config: &Config,
    in_memory: bool,
) -> Result<(Arc<dyn SignalChannel>, Arc<dyn SignalStore>)> {
    if in_memory {
        tracing::warn!("IN-MEMORY MODE - signals and decisions are not durable");
        return Ok((Arc::new(MemoryChannel::new()), Arc::new(MemoryStore::new())));
    }

    let channel = RabbitChannel::connect(config.rabbit_config())
        .await
        .context("Failed to connect to RabbitMQ")?;
    let store = PostgresStore::connect(&config.postgres_config())
        .await
        .context("Failed to connect to Postgres")?;

    Ok((Arc::new(channel), Arc::new(store)))
}

fn build_sources(config: &Config, ctx: &PipelineContext) -> Result<Sources> {
    let emitter = SignalEmitter::with_capacity(
        ctx.channel(),
        ctx.store(),
        config.store.max_connections as usize,
    );
    let mut sources = Sources {
        emitter: Some(emitter.clone()),
        ..Sources::default()
    };

    if config.pump_fun.enabled {
        sources.pump_fun = Some(Arc::new(PumpFunStream::new(
            config.pump_fun_config(),
            emitter.clone(),
        )));
    }

    if config.raydium.enabled {
        let poller = RaydiumPoller::new(config.raydium_config(), emitter.clone())
            .context("Failed to create Raydium poller")?;
        sources.raydium = Some(Arc::new(poller));
    }

    if config.social.enabled {
        if config.social.keywords.is_empty() {
            tracing::warn!("Social metrics enabled without keywords, skipping");
        } else {
            let search = HttpSocialSearch::new(config.search_config())
                .context("Failed to create social search client")?;
            sources.social = Some(Arc::new(SocialMetricsPoller::new(
                config.social_metrics_config(),
                Arc::new(search),
                WorkerPool::new(config.workers.size),
                emitter,
            )));
        }
    }

    Ok(sources)
}

async fn run_pipeline(config: &Config, mode: PipelineMode, in_memory: bool) -> Result<()> {
    tracing::info!("Starting signal-brain ({:?})...", mode);

    let (channel, store) = connect(config, in_memory).await?;

    let oracle =
        OpenAiOracle::new(config.oracle_config()).context("Failed to create oracle client")?;
    if mode.runs_consumer() && config.oracle.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set - every window will fall back to HOLD");
    }

    let ctx = Arc::new(PipelineContext::new(
        channel,
        store,
        Arc::new(oracle),
        config.risk.clone(),
    ));

    let sources = if mode.runs_sources() {
        build_sources(config, &ctx)?
    } else {
        Sources::default()
    };

    let pipeline = Pipeline::new(Arc::clone(&ctx), config.aggregator_config(), sources);
    pipeline.start(mode).await.context("Failed to start pipeline")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    pipeline.stop().await;
    tracing::info!("signal-brain stopped");
    Ok(())
}
