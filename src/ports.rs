//! Ports the orchestrator depends on: transfer persistence and the blockchain
//! network. Adapters live in `crate::adapters` and `crate::solana`.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{TransferFilter, TransferRecord};
use crate::solana::units::MIN_TRANSACTION_FEE;
use crate::solana::{GatewayError, TransferStatus, UnsignedTransfer};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("transfer {0} not found")]
    NotFound(Uuid),
    #[error("{0}")]
    Frozen(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record lock already released")]
    Released,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable storage of transfer records.
#[async_trait]
pub trait TransferStore: Send + Sync {
    async fn insert(&self, record: &TransferRecord) -> StoreResult<TransferRecord>;

    async fn get(&self, id: Uuid) -> StoreResult<TransferRecord>;

    /// Matching records, newest first.
    async fn list(&self, filter: &TransferFilter) -> StoreResult<Vec<TransferRecord>>;

    /// Takes an exclusive lock on one record. Other `lock` calls for the same
    /// id wait until the returned guard commits, deletes or is dropped.
    async fn lock(&self, id: Uuid) -> StoreResult<Box<dyn TransferLock>>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Exclusive hold on a single record. Dropping it without `commit` or
/// `delete` discards nothing and releases the lock.
#[async_trait]
pub trait TransferLock: Send {
    /// The record as read when the lock was taken, or as last committed.
    fn record(&self) -> &TransferRecord;

    /// Persists `next`, refreshing `updated_at`, and releases the lock.
    /// Rejects changes to fields frozen by a network signature.
    async fn commit(&mut self, next: TransferRecord) -> StoreResult<TransferRecord>;

    async fn delete(&mut self) -> StoreResult<()>;
}

/// Blockchain network access.
#[async_trait]
pub trait NetworkGateway: Send + Sync {
    fn network_name(&self) -> &str;

    /// Balance of `address` in lamports.
    async fn get_balance(&self, address: &str) -> Result<u64, GatewayError>;

    /// Fee charged for a single transfer, in lamports.
    fn estimate_fee(&self) -> u64 {
        MIN_TRANSACTION_FEE
    }

    fn build_transfer(
        &self,
        source: &str,
        destination: &str,
        amount: &BigDecimal,
    ) -> Result<UnsignedTransfer, GatewayError> {
        UnsignedTransfer::new(source, destination, amount)
    }

    /// Signs and broadcasts, returning the network signature.
    async fn submit(&self, transfer: &UnsignedTransfer) -> Result<String, GatewayError>;

    async fn query_status(&self, signature: &str) -> Result<TransferStatus, GatewayError>;
}
