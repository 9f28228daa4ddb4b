#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use transfer_relay::adapters::InMemoryTransferStore;
use transfer_relay::domain::{ConfirmationState, TransferRecord};
use transfer_relay::ports::{NetworkGateway, TransferStore};
use transfer_relay::services::TransactionOrchestrator;
use transfer_relay::solana::{address, GatewayError, TransferStatus, UnsignedTransfer};

pub const ONE_SOL: u64 = 1_000_000_000;

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Accept,
    Reject(String),
    Unreachable,
    /// Signed and sent, but the reply was lost.
    Unconfirmed,
}

/// Scriptable network: balances, broadcast results and status reports are
/// set by the test.
pub struct FakeGateway {
    balance: Mutex<Option<u64>>,
    submit_outcome: Mutex<SubmitOutcome>,
    status: Mutex<Option<TransferStatus>>,
    submit_delay: Mutex<Duration>,
    submit_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn with_balance(lamports: u64) -> Self {
        Self {
            balance: Mutex::new(Some(lamports)),
            submit_outcome: Mutex::new(SubmitOutcome::Accept),
            status: Mutex::new(Some(TransferStatus::not_found())),
            submit_delay: Mutex::new(Duration::ZERO),
            submit_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_balance(&self, lamports: Option<u64>) {
        *self.balance.lock().unwrap() = lamports;
    }

    pub fn set_submit_outcome(&self, outcome: SubmitOutcome) {
        *self.submit_outcome.lock().unwrap() = outcome;
    }

    pub fn set_status(&self, status: Option<TransferStatus>) {
        *self.status.lock().unwrap() = status;
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = delay;
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkGateway for FakeGateway {
    fn network_name(&self) -> &str {
        "devnet"
    }

    async fn get_balance(&self, address: &str) -> Result<u64, GatewayError> {
        address::validate(address)?;
        let balance = *self.balance.lock().unwrap();
        balance.ok_or_else(|| GatewayError::Connectivity("connection refused".to_string()))
    }

    async fn submit(&self, transfer: &UnsignedTransfer) -> Result<String, GatewayError> {
        let call = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.submit_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.submit_outcome.lock().unwrap().clone();
        match outcome {
            SubmitOutcome::Accept => Ok(format!("sig-{}-{}", call, transfer.lamports)),
            SubmitOutcome::Reject(reason) => Err(GatewayError::Submission(reason)),
            SubmitOutcome::Unreachable => {
                Err(GatewayError::Connectivity("connection refused".to_string()))
            }
            SubmitOutcome::Unconfirmed => Err(GatewayError::Unconfirmed {
                signature: format!("sig-{}-{}", call, transfer.lamports),
                reason: "rpc call timed out".to_string(),
            }),
        }
    }

    async fn query_status(&self, _signature: &str) -> Result<TransferStatus, GatewayError> {
        let status = self.status.lock().unwrap().clone();
        status.ok_or_else(|| GatewayError::Connectivity("connection refused".to_string()))
    }
}

pub struct Harness {
    pub store: Arc<InMemoryTransferStore>,
    pub gateway: Arc<FakeGateway>,
    pub orchestrator: TransactionOrchestrator,
}

impl Harness {
    pub fn new(balance: u64) -> Self {
        let store = Arc::new(InMemoryTransferStore::new());
        let gateway = Arc::new(FakeGateway::with_balance(balance));
        let orchestrator = TransactionOrchestrator::new(store.clone(), gateway.clone());
        Self {
            store,
            gateway,
            orchestrator,
        }
    }

    /// Stores a pending, unsigned transfer without going through create.
    pub async fn seed_pending(&self, amount: &str) -> TransferRecord {
        let record = TransferRecord::new_pending(
            wallet(1),
            wallet(2),
            decimal(amount),
            "$argon2id$seeded".to_string(),
            decimal("0.000005"),
            "devnet".to_string(),
        );
        self.store.insert(&record).await.unwrap()
    }

    pub async fn seed_signed(&self, amount: &str) -> TransferRecord {
        let mut record = TransferRecord::new_pending(
            wallet(1),
            wallet(2),
            decimal(amount),
            "$argon2id$seeded".to_string(),
            decimal("0.000005"),
            "devnet".to_string(),
        );
        record.mark_submitted(format!("seeded-{}", record.id));
        self.store.insert(&record).await.unwrap()
    }
}

/// A valid base58 address derived from a single repeated byte.
pub fn wallet(seed: u8) -> String {
    address::encode(&[seed; 32])
}

pub fn decimal(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

pub fn confirmed(slot: i64, fee: u64) -> TransferStatus {
    TransferStatus {
        found: true,
        confirmation_state: ConfirmationState::Confirmed,
        block_reference: Some(slot),
        fee_lamports: Some(fee),
    }
}
