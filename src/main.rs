use alerter::{run_alerter_service, Notifier, NullNotifier, TelegramAlerter};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use database::{BotRepository, CredentialStore};
use engine::{EngineContext, InFlightLocks, LogRings, Supervisor, Warnings};
use exchange_client::clock::VenueClock;
use exchange_client::{ExchangeApi, RestClient, VenueProfile};
use market_data::SnapshotProvider;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(author, version, about = "Multi-strategy spot trading bot supervisor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the supervisor and the HTTP control surface.
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to a configuration file replacing config/default.toml.
    #[arg(long)]
    config: Option<String>,

    /// Run the engines without the HTTP control surface.
    #[arg(long)]
    no_server: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let settings = configuration::load_settings(args.config.as_deref())
        .context("failed to load configuration")?;
    let _log_guard = configuration::init_tracing(&settings.logging)
        .context("failed to initialise tracing")?;

    tracing::info!("helmsman starting");

    // Storage is load-bearing: refuse to trade without it. A failure here
    // exits non-zero.
    let pool = database::connect()
        .await
        .context("storage unreachable at startup")?;
    database::run_migrations(&pool)
        .await
        .context("storage migrations failed")?;
    let repo = BotRepository::new(pool.clone());
    let credentials = CredentialStore::new(pool);

    // Venue client with a process-wide synced clock.
    let clock = Arc::new(VenueClock::new());
    let profile = VenueProfile::from_settings(&settings.venues);
    tracing::info!(venue = profile.name, "exchange client configured");
    let exchange: Arc<dyn ExchangeApi> = Arc::new(
        RestClient::new(profile, Arc::clone(&clock)).context("failed to build exchange client")?,
    );
    if let Err(e) = exchange.server_time().await {
        tracing::warn!(error = %e, "initial clock sync failed; will retry before signing");
    }

    let market = Arc::new(SnapshotProvider::new(
        Arc::clone(&exchange),
        Arc::clone(&clock),
        settings.market.depth_limit,
    ));

    // Notifications: Telegram when configured, otherwise a null sink.
    let notifier: Arc<dyn Notifier> = match TelegramAlerter::new(&settings.telegram) {
        Some(alerter) => Arc::new(alerter),
        None => Arc::new(NullNotifier),
    };
    let (event_tx, event_rx) = broadcast::channel(256);
    tokio::spawn(run_alerter_service(Arc::clone(&notifier), event_rx));

    let ctx = Arc::new(EngineContext {
        repo,
        credentials,
        exchange,
        market,
        notifier,
        events: event_tx,
        locks: InFlightLocks::new(),
        rings: LogRings::new(),
        warnings: Warnings::default(),
    });

    let supervisor = Arc::new(Supervisor::new(
        ctx,
        settings.supervisor.clone(),
        settings.market.clone(),
    ));
    supervisor.boot().await.context("supervisor boot failed")?;

    if !args.no_server {
        let addr: SocketAddr = settings
            .server
            .bind
            .parse()
            .context("invalid server bind address")?;
        let server_supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            if let Err(e) = web_server::run_server(addr, server_supervisor).await {
                tracing::error!(error = %e, "control surface exited");
            }
        });
    }

    wait_for_shutdown_signal().await;
    tracing::info!("termination signal received, shutting down");
    supervisor.shutdown().await;
    tracing::info!("helmsman stopped");
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
