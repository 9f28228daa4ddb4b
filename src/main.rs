use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transfer_relay::adapters::PostgresTransferStore;
use transfer_relay::cli::{self, Cli, Commands, DbCommands, TxCommands, WalletCommands};
use transfer_relay::config::{Config, LogFormat};
use transfer_relay::middleware::request_logger::RequestLogging;
use transfer_relay::services::run_reconciler;
use transfer_relay::solana::SolanaRpcGateway;
use transfer_relay::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Tx(TxCommands::Refresh { tx_id }) => cli::handle_tx_refresh(&config, tx_id).await,
        Commands::Wallet(WalletCommands::Balance { address }) => {
            cli::handle_wallet_balance(&config, &address).await
        }
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::debug!(?config, "Loaded configuration");

    // Database pool
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let gateway = SolanaRpcGateway::from_config(&config);
    tracing::info!(
        network = %config.solana_network,
        rpc_url = %config.solana_rpc_url,
        commitment = %config.solana_commitment,
        signing_key = config.solana_private_key.is_some(),
        "Solana RPC gateway initialized"
    );

    let app_state = AppState::new(Arc::new(PostgresTransferStore::new(pool)), Arc::new(gateway))
        .with_request_logging(RequestLogging {
            log_body: config.log_request_body,
        });

    if let Some(secs) = config.reconcile_interval_secs {
        let orchestrator = app_state.orchestrator.as_ref().clone();
        tokio::spawn(run_reconciler(orchestrator, Duration::from_secs(secs.max(1))));
    }

    let app = create_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
