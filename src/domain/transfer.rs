//! Transfer request domain entity.
//! Framework-agnostic representation of a transfer and its lifecycle.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const TRANSFER_KIND_SEND: &str = "send";

/// Local lifecycle of a transfer request.
///
/// `Submitting` only exists while a submission is in flight under the record
/// lock; it is never committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Pending,
    Submitting,
    Failed,
    Processing,
    Processed,
    Cancelled,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Pending => "pending",
            LifecycleStatus::Submitting => "submitting",
            LifecycleStatus::Failed => "failed",
            LifecycleStatus::Processing => "processing",
            LifecycleStatus::Processed => "processed",
            LifecycleStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses a client may assign directly through an update.
    pub fn is_manually_assignable(&self) -> bool {
        matches!(
            self,
            LifecycleStatus::Pending
                | LifecycleStatus::Processed
                | LifecycleStatus::Cancelled
                | LifecycleStatus::Failed
        )
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = String;

    /// Accepts the English labels and the legacy Portuguese ones.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendente" => Ok(LifecycleStatus::Pending),
            "submitting" => Ok(LifecycleStatus::Submitting),
            "failed" | "falhou" => Ok(LifecycleStatus::Failed),
            "processing" | "processando" => Ok(LifecycleStatus::Processing),
            "processed" | "processada" => Ok(LifecycleStatus::Processed),
            "cancelled" | "cancelada" => Ok(LifecycleStatus::Cancelled),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// Network-reported progress of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationState {
    Pending,
    Confirmed,
    Finalized,
    Failed,
}

impl ConfirmationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationState::Pending => "pending",
            ConfirmationState::Confirmed => "confirmed",
            ConfirmationState::Finalized => "finalized",
            ConfirmationState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfirmationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ConfirmationState::Pending),
            "confirmed" => Ok(ConfirmationState::Confirmed),
            "finalized" => Ok(ConfirmationState::Finalized),
            "failed" => Ok(ConfirmationState::Failed),
            other => Err(format!("unknown confirmation state '{}'", other)),
        }
    }
}

/// Domain entity representing a transfer request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub id: Uuid,
    pub source_address: String,
    pub destination_address: String,
    pub amount: BigDecimal,
    pub kind: String,
    pub credential_reference: String,
    pub lifecycle_status: LifecycleStatus,
    pub network_signature: Option<String>,
    pub confirmation_state: Option<ConfirmationState>,
    pub block_reference: Option<i64>,
    pub network_fee: Option<BigDecimal>,
    pub network_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransferRecord {
    pub fn new_pending(
        source_address: String,
        destination_address: String,
        amount: BigDecimal,
        credential_reference: String,
        network_fee: BigDecimal,
        network_name: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source_address,
            destination_address,
            amount,
            kind: TRANSFER_KIND_SEND.to_string(),
            credential_reference,
            lifecycle_status: LifecycleStatus::Pending,
            network_signature: None,
            confirmation_state: Some(ConfirmationState::Pending),
            block_reference: None,
            network_fee: Some(network_fee),
            network_name,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.network_signature.is_some()
    }

    /// Whether the record may be handed to the network now.
    pub fn check_submittable(&self) -> Result<(), String> {
        match self.lifecycle_status {
            LifecycleStatus::Processing | LifecycleStatus::Processed => {
                return Err(format!(
                    "Transfer {} is already {}",
                    self.id, self.lifecycle_status
                ))
            }
            LifecycleStatus::Cancelled => {
                return Err(format!("Transfer {} was cancelled", self.id))
            }
            _ => {}
        }

        if self.is_signed() {
            return Err(format!(
                "Transfer {} already carries a network signature",
                self.id
            ));
        }

        Ok(())
    }

    pub fn check_cancellable(&self) -> Result<(), String> {
        if self.is_signed() {
            return Err(format!(
                "Transfer {} was already sent to the network",
                self.id
            ));
        }
        if self.lifecycle_status != LifecycleStatus::Pending {
            return Err(format!(
                "Only pending transfers can be cancelled, transfer {} is {}",
                self.id, self.lifecycle_status
            ));
        }

        Ok(())
    }

    pub fn mark_submitted(&mut self, signature: String) {
        self.network_signature = Some(signature);
        self.lifecycle_status = LifecycleStatus::Processing;
        self.confirmation_state = Some(ConfirmationState::Pending);
    }

    pub fn mark_failed(&mut self) {
        self.lifecycle_status = LifecycleStatus::Failed;
    }

    /// Folds a network observation into the record. A confirmed or finalized
    /// transaction completes the transfer; a failed one fails it.
    pub fn apply_confirmation(
        &mut self,
        state: ConfirmationState,
        block_reference: Option<i64>,
        network_fee: Option<BigDecimal>,
    ) {
        self.confirmation_state = Some(state);
        self.block_reference = block_reference;
        if let Some(fee) = network_fee {
            self.network_fee = Some(fee);
        }

        match state {
            ConfirmationState::Confirmed | ConfirmationState::Finalized => {
                self.lifecycle_status = LifecycleStatus::Processed
            }
            ConfirmationState::Failed => self.lifecycle_status = LifecycleStatus::Failed,
            ConfirmationState::Pending => {}
        }
    }

    /// Once a signature exists, the transferred value and the parties are
    /// frozen and the signature itself never changes.
    pub fn check_frozen_fields(&self, next: &TransferRecord) -> Result<(), String> {
        let Some(signature) = &self.network_signature else {
            return Ok(());
        };

        if next.network_signature.as_ref() != Some(signature) {
            return Err(format!("Transfer {} signature is immutable", self.id));
        }
        if next.amount != self.amount {
            return Err(format!(
                "Transfer {} amount cannot change after submission",
                self.id
            ));
        }
        if next.source_address != self.source_address
            || next.destination_address != self.destination_address
        {
            return Err(format!(
                "Transfer {} addresses cannot change after submission",
                self.id
            ));
        }

        Ok(())
    }
}

/// Optional listing filters, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferFilter {
    pub source_address: Option<String>,
    pub destination_address: Option<String>,
    pub status: Option<LifecycleStatus>,
}

impl TransferFilter {
    pub fn with_status(status: LifecycleStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &TransferRecord) -> bool {
        self.source_address
            .as_ref()
            .map_or(true, |source| &record.source_address == source)
            && self
                .destination_address
                .as_ref()
                .map_or(true, |destination| &record.destination_address == destination)
            && self
                .status
                .map_or(true, |status| record.lifecycle_status == status)
    }
}
