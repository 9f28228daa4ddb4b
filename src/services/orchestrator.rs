//! Drives a transfer request through its lifecycle.
//!
//! Every write takes the per-record lock from the store first and releases it
//! only by committing the finished transition, so two callers can never both
//! pass the "not yet signed" check for the same record.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{ConfirmationState, LifecycleStatus, TransferFilter, TransferRecord};
use crate::error::AppError;
use crate::ports::{NetworkGateway, TransferLock, TransferStore};
use crate::services::credentials;
use crate::solana::{units, GatewayError};
use crate::validation;

/// Input of the create operation.
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub source_address: String,
    pub destination_address: String,
    pub secret: String,
    pub amount: BigDecimal,
}

/// Fields a client may change through an update.
#[derive(Debug, Clone, Default)]
pub struct TransferUpdate {
    pub status: Option<LifecycleStatus>,
    pub amount: Option<BigDecimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalletBalance {
    pub address: String,
    pub balance_minor: u64,
    pub balance_major: BigDecimal,
    pub network: String,
}

#[derive(Clone)]
pub struct TransactionOrchestrator {
    store: Arc<dyn TransferStore>,
    gateway: Arc<dyn NetworkGateway>,
}

impl TransactionOrchestrator {
    pub fn new(store: Arc<dyn TransferStore>, gateway: Arc<dyn NetworkGateway>) -> Self {
        Self { store, gateway }
    }

    pub fn store(&self) -> &Arc<dyn TransferStore> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<dyn NetworkGateway> {
        &self.gateway
    }

    /// Validates, persists as `pending`, then submits. The returned record is
    /// either `processing` with a signature, or the error is a business error
    /// and the stored record is `failed`.
    pub async fn create(&self, input: NewTransfer) -> Result<TransferRecord, AppError> {
        validation::validate_distinct_wallets(&input.source_address, &input.destination_address)?;
        validation::validate_wallet("wallet", &input.source_address)?;
        validation::validate_wallet("destinationWallet", &input.destination_address)?;
        validation::validate_positive_amount(&input.amount)?;
        validation::validate_secret(&input.secret)?;

        let fee = self.gateway.estimate_fee();
        let amount_minor = units::to_minor_unit(&input.amount)?;
        let balance = self.gateway.get_balance(&input.source_address).await?;

        let required = amount_minor.checked_add(fee);
        if required.map_or(true, |required| balance < required) {
            return Err(AppError::InsufficientFunds(format!(
                "Balance of {} is {} SOL, transfer needs {} SOL plus a {} SOL fee",
                input.source_address,
                units::to_major_unit(balance),
                input.amount,
                units::to_major_unit(fee)
            )));
        }

        let secret = input.secret;
        let credential_reference = tokio::task::spawn_blocking(move || {
            credentials::hash_secret(&secret)
        })
        .await
        .map_err(|e| AppError::Internal(format!("secret hashing task failed: {}", e)))??;

        let record = TransferRecord::new_pending(
            input.source_address,
            input.destination_address,
            input.amount,
            credential_reference,
            units::to_major_unit(fee),
            self.gateway.network_name().to_string(),
        );
        let record = self.store.insert(&record).await?;
        info!(
            transfer_id = %record.id,
            source = %record.source_address,
            destination = %record.destination_address,
            amount = %record.amount,
            "transfer created"
        );

        // a cancel or process call may have taken the record first
        let lock = self.store.lock(record.id).await?;
        lock.record()
            .check_submittable()
            .map_err(AppError::BusinessLogic)?;

        self.submit_locked(lock).await
    }

    pub async fn get(&self, id: Uuid) -> Result<TransferRecord, AppError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list(&self, filter: &TransferFilter) -> Result<Vec<TransferRecord>, AppError> {
        Ok(self.store.list(filter).await?)
    }

    pub async fn update(&self, id: Uuid, update: TransferUpdate) -> Result<TransferRecord, AppError> {
        if let Some(amount) = &update.amount {
            validation::validate_positive_amount(amount)?;
        }
        if let Some(status) = update.status {
            if !status.is_manually_assignable() {
                return Err(AppError::Validation(format!(
                    "status: '{}' cannot be assigned directly, use pending, processed, cancelled or failed",
                    status
                )));
            }
        }

        let mut lock = self.store.lock(id).await?;
        let current = lock.record();
        let mut next = current.clone();

        if let Some(amount) = update.amount {
            if amount != current.amount
                && (current.is_signed() || current.lifecycle_status != LifecycleStatus::Pending)
            {
                return Err(AppError::BusinessLogic(format!(
                    "Transfer {} amount can only change while pending and unsubmitted",
                    id
                )));
            }
            next.amount = amount;
        }

        if let Some(status) = update.status {
            if current.is_signed()
                && !matches!(status, LifecycleStatus::Processed | LifecycleStatus::Failed)
            {
                return Err(AppError::BusinessLogic(format!(
                    "Transfer {} was already submitted and can only be marked processed or failed",
                    id
                )));
            }
            next.lifecycle_status = status;
        }

        let updated = lock.commit(next).await?;
        info!(transfer_id = %id, status = %updated.lifecycle_status, "transfer updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut lock = self.store.lock(id).await?;
        if lock.record().is_signed() {
            return Err(AppError::BusinessLogic(format!(
                "Transfer {} was already sent to the network and cannot be deleted",
                id
            )));
        }

        lock.delete().await?;
        info!(transfer_id = %id, "transfer deleted");
        Ok(())
    }

    /// Submits a stored transfer that has not been signed yet.
    pub async fn submit(&self, id: Uuid) -> Result<TransferRecord, AppError> {
        let lock = self.store.lock(id).await?;
        lock.record()
            .check_submittable()
            .map_err(AppError::BusinessLogic)?;

        self.submit_locked(lock).await
    }

    /// Pulls the latest confirmation data for a signed transfer.
    pub async fn refresh_status(&self, id: Uuid) -> Result<TransferRecord, AppError> {
        let mut lock = self.store.lock(id).await?;
        let Some(signature) = lock.record().network_signature.clone() else {
            return Err(AppError::BusinessLogic(format!(
                "Transfer {} has no network signature yet",
                id
            )));
        };

        // connectivity errors leave the record untouched
        let status = self.gateway.query_status(&signature).await?;

        let mut next = lock.record().clone();
        if status.found {
            next.apply_confirmation(
                status.confirmation_state,
                status.block_reference,
                status.fee_lamports.map(units::to_major_unit),
            );
        } else {
            next.confirmation_state = Some(ConfirmationState::Pending);
        }

        let updated = lock.commit(next).await?;
        info!(
            transfer_id = %id,
            signature = %signature,
            found = status.found,
            confirmation = ?updated.confirmation_state,
            status = %updated.lifecycle_status,
            "transfer status refreshed"
        );
        Ok(updated)
    }

    pub async fn cancel(&self, id: Uuid) -> Result<TransferRecord, AppError> {
        let mut lock = self.store.lock(id).await?;
        lock.record()
            .check_cancellable()
            .map_err(AppError::BusinessLogic)?;

        let mut next = lock.record().clone();
        next.lifecycle_status = LifecycleStatus::Cancelled;

        let updated = lock.commit(next).await?;
        info!(transfer_id = %id, "transfer cancelled");
        Ok(updated)
    }

    pub async fn wallet_balance(&self, address: &str) -> Result<WalletBalance, AppError> {
        let balance_minor = self.gateway.get_balance(address).await?;

        Ok(WalletBalance {
            address: address.to_string(),
            balance_minor,
            balance_major: units::to_major_unit(balance_minor),
            network: self.gateway.network_name().to_string(),
        })
    }

    /// Builds, signs and broadcasts while holding the record lock, then
    /// commits either `processing` with the signature or `failed`.
    async fn submit_locked(&self, mut lock: Box<dyn TransferLock>) -> Result<TransferRecord, AppError> {
        let record = lock.record().clone();

        let outcome = match self.gateway.build_transfer(
            &record.source_address,
            &record.destination_address,
            &record.amount,
        ) {
            Ok(transfer) => self.gateway.submit(&transfer).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(signature) => self.record_signature(lock, &record, signature).await,
            Err(GatewayError::Unconfirmed { signature, reason }) => {
                // may still land; refresh settles it either way
                warn!(
                    transfer_id = %record.id,
                    signature = %signature,
                    error = %reason,
                    "broadcast unconfirmed, keeping signature"
                );
                self.record_signature(lock, &record, signature).await
            }
            Err(gateway_error) => {
                warn!(
                    transfer_id = %record.id,
                    error = %gateway_error,
                    "transfer submission failed"
                );
                let mut next = record.clone();
                next.mark_failed();
                lock.commit(next).await?;

                Err(AppError::BusinessLogic(format!(
                    "Transfer {} could not be submitted: {}",
                    record.id, gateway_error
                )))
            }
        }
    }

    async fn record_signature(
        &self,
        mut lock: Box<dyn TransferLock>,
        record: &TransferRecord,
        signature: String,
    ) -> Result<TransferRecord, AppError> {
        let mut next = record.clone();
        next.mark_submitted(signature.clone());

        match lock.commit(next).await {
            Ok(updated) => {
                info!(
                    transfer_id = %updated.id,
                    signature = %signature,
                    "transfer submitted"
                );
                Ok(updated)
            }
            Err(e) => {
                // broadcast already happened; keep the signature in the log
                tracing::error!(
                    transfer_id = %record.id,
                    signature = %signature,
                    error = %e,
                    "failed to record network signature"
                );
                Err(e.into())
            }
        }
    }
}
