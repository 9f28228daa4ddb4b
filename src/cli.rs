use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::PostgresTransferStore;
use crate::config::{mask_password, Config};
use crate::ports::NetworkGateway;
use crate::services::TransactionOrchestrator;
use crate::solana::SolanaRpcGateway;

#[derive(Parser)]
#[command(name = "transfer-relay")]
#[command(about = "Transfer Relay - Solana transfer lifecycle service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Transfer management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Wallet inspection commands
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Refresh a transfer's confirmation state from the network
    Refresh {
        /// Transfer UUID
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Show the balance of an address
    Balance {
        /// Base58 wallet address
        #[arg(value_name = "ADDRESS")]
        address: String,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_tx_refresh(config: &Config, tx_id: Uuid) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config)
        .await
        .context("failed to connect to the database")?;
    let orchestrator = TransactionOrchestrator::new(
        Arc::new(PostgresTransferStore::new(pool)),
        Arc::new(SolanaRpcGateway::from_config(config)),
    );

    let record = orchestrator.refresh_status(tx_id).await?;

    tracing::info!(transfer_id = %tx_id, status = %record.lifecycle_status, "Transfer refreshed");
    println!("✓ Transfer {}", record.id);
    println!("  Status: {}", record.lifecycle_status);
    if let Some(state) = record.confirmation_state {
        println!("  Confirmation: {}", state);
    }
    if let Some(block) = record.block_reference {
        println!("  Slot: {}", block);
    }

    Ok(())
}

pub async fn handle_wallet_balance(config: &Config, address: &str) -> anyhow::Result<()> {
    let gateway = SolanaRpcGateway::from_config(config);
    let lamports = gateway.get_balance(address).await?;

    println!("Address: {}", address);
    println!("Network: {}", gateway.network_name());
    println!(
        "Balance: {} SOL ({} lamports)",
        crate::solana::units::to_major_unit(lamports),
        lamports
    );

    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Database Max Connections: {}", config.database_max_connections);
    println!("  Solana Network: {}", config.solana_network);
    println!("  Solana RPC URL: {}", config.solana_rpc_url);
    println!("  Solana Commitment: {}", config.solana_commitment);
    println!(
        "  Signing Key: {}",
        if config.solana_private_key.is_some() { "configured" } else { "not configured" }
    );
    println!("  RPC Timeout: {}s", config.rpc_timeout_secs);
    println!(
        "  Circuit Breaker: {} failures, {}s reset",
        config.circuit_breaker_threshold, config.circuit_breaker_reset_secs
    );
    match config.reconcile_interval_secs {
        Some(secs) => println!("  Reconciler: every {}s", secs),
        None => println!("  Reconciler: disabled"),
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}
