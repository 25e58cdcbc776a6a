use std::sync::Arc;

use clap::Parser;
use nexusquant::advisors::AnalystAdvisor;
use nexusquant::cli::{self, Cli, Commands, OutputMode, RunArgs, DEFAULT_SEED};
use nexusquant::config::{AppConfig, LoggingConfig};
use nexusquant::error::{NexusError, Result};
use nexusquant::persistence::{NullRecorder, PostgresRecorder, RunRecorder};
use nexusquant::simulation::{MarketReplay, MarketSource, SimulationEngine};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config_dir)?;

    match cli.command {
        Some(Commands::CheckConfig) => check_config(&config),
        Some(Commands::Run(args)) => run_simulation(config, args).await,
        None => run_simulation(config, RunArgs::default()).await,
    }
}

fn check_config(config: &AppConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    match config.validate() {
        Ok(()) => {
            println!("configuration OK");
            Ok(())
        }
        Err(errors) => {
            for e in &errors {
                eprintln!("  - {}", e);
            }
            Err(NexusError::InvalidConfig(errors))
        }
    }
}

async fn run_simulation(mut config: AppConfig, args: RunArgs) -> Result<()> {
    args.apply(&mut config);
    let _guard = init_logging(&config.logging);

    config.validate().map_err(NexusError::InvalidConfig)?;

    info!(
        project = %config.simulation.project_name,
        version = %config.simulation.version,
        run_id = %config.simulation.run_id,
        "initializing"
    );

    let universe = config.simulation.asset_universe.clone();
    let market: Box<dyn MarketSource> = match args.synthetic {
        Some(ticks) => {
            let seed = args.seed.unwrap_or(DEFAULT_SEED);
            info!(ticks, seed, "using synthetic market data");
            Box::new(MarketReplay::synthetic(&universe, ticks, seed)?)
        }
        None => Box::new(MarketReplay::from_csv_dir(&config.market.data_dir, &universe)?),
    };

    let recorder: Arc<dyn RunRecorder> = match &config.database.url {
        Some(url) => {
            let store = PostgresRecorder::connect(url, config.database.max_connections).await?;
            store.init_schema().await?;
            Arc::new(store)
        }
        None => {
            info!("no database configured, run will not be persisted");
            Arc::new(NullRecorder)
        }
    };

    let mut engine = SimulationEngine::new(config.clone(), market, recorder);

    if config.advisor.llm.enabled {
        let analyst = AnalystAdvisor::new(config.advisor.llm.clone())?;
        if analyst.is_configured() {
            info!(model = %config.advisor.llm.model, "LLM analyst enabled");
            engine = engine.with_analyst(Box::new(analyst));
        } else {
            warn!(
                env = %config.advisor.llm.api_key_env,
                "LLM analyst enabled but no API key found, running quant only"
            );
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, finishing current tick");
        let _ = shutdown_tx.send(true);
    });

    let summary = engine.run(shutdown_rx, args.max_ticks).await?;
    cli::print_summary(&summary, OutputMode::from_json_flag(args.json))?;
    Ok(())
}

/// Initialize tracing. The returned guard must live until exit so that the
/// file writer flushes.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},nexusquant=debug,sqlx=warn", config.level))
    });

    let stdout_layer = if config.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "nexusquant.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("logging already initialized: {}", e);
    }

    guard
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
