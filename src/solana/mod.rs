pub mod address;
pub mod client;
pub mod transfer;
pub mod units;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::domain::ConfirmationState;

pub use address::AddressError;
pub use client::SolanaRpcGateway;
pub use transfer::{SignedTransfer, UnsignedTransfer};
pub use units::ConversionError;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidAddress(#[from] AddressError),
    #[error("{0}")]
    Conversion(#[from] ConversionError),
    #[error("network unreachable: {0}")]
    Connectivity(String),
    #[error("transaction rejected: {0}")]
    Submission(String),
    /// Signed and sent, but the node's answer was lost.
    #[error("broadcast of {signature} unconfirmed: {reason}")]
    Unconfirmed { signature: String, reason: String },
}

/// Commitment level used for reads and for preflight on broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(format!(
                "unknown commitment '{}', expected processed, confirmed or finalized",
                other
            )),
        }
    }
}

/// What the network knows about a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatus {
    pub found: bool,
    pub confirmation_state: ConfirmationState,
    pub block_reference: Option<i64>,
    pub fee_lamports: Option<u64>,
}

impl TransferStatus {
    pub fn not_found() -> Self {
        Self {
            found: false,
            confirmation_state: ConfirmationState::Pending,
            block_reference: None,
            fee_lamports: None,
        }
    }
}
