use async_trait::async_trait;
use base64::Engine;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config as BreakerConfig, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

use super::address;
use super::transfer::{self, UnsignedTransfer};
use super::{Commitment, GatewayError, TransferStatus};
use crate::config::Config;
use crate::domain::ConfirmationState;
use crate::ports::NetworkGateway;

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_RESET_TIMEOUT_SECS: u64 = 60;

/// Why a single JSON-RPC call did not produce a result.
#[derive(Debug)]
enum RpcFailure {
    /// The request never reached the node.
    Unreachable(String),
    Transport(String),
    Timeout(Duration),
    CircuitOpen,
    Rpc { code: i64, message: String },
}

impl RpcFailure {
    /// Only outages count against the circuit breaker; an RPC error object
    /// means the node is up and answered.
    fn is_outage(&self) -> bool {
        !matches!(self, RpcFailure::Rpc { .. })
    }
}

impl fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcFailure::Unreachable(msg) | RpcFailure::Transport(msg) => write!(f, "{}", msg),
            RpcFailure::Timeout(after) => write!(f, "rpc call timed out after {:?}", after),
            RpcFailure::CircuitOpen => write!(f, "rpc circuit breaker is open"),
            RpcFailure::Rpc { code, message } => write!(f, "rpc error {}: {}", code, message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct LatestBlockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
struct TransactionInfo {
    slot: Option<u64>,
    meta: Option<TransactionMeta>,
}

#[derive(Debug, Deserialize)]
struct TransactionMeta {
    err: Option<Value>,
    fee: Option<u64>,
}

/// JSON-RPC client for a Solana cluster.
///
/// Built once at startup and shared behind an `Arc`; every call goes through
/// the same circuit breaker and is bounded by `call_timeout`.
#[derive(Clone)]
pub struct SolanaRpcGateway {
    client: Client,
    rpc_url: String,
    network: String,
    commitment: Commitment,
    signing_key: Option<String>,
    call_timeout: Duration,
    circuit_breaker: Breaker,
}

impl SolanaRpcGateway {
    pub fn new(rpc_url: String, network: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        SolanaRpcGateway {
            client,
            rpc_url,
            network,
            commitment: Commitment::default(),
            signing_key: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            circuit_breaker: build_breaker(DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.solana_rpc_url.clone(), config.solana_network.clone())
            .with_commitment(config.solana_commitment)
            .with_signing_key(config.solana_private_key.clone())
            .with_call_timeout(Duration::from_secs(config.rpc_timeout_secs))
            .with_circuit_breaker(
                config.circuit_breaker_threshold,
                config.circuit_breaker_reset_secs,
            )
    }

    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn with_signing_key(mut self, signing_key: Option<String>) -> Self {
        self.signing_key = signing_key;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_circuit_breaker(mut self, failure_threshold: u32, reset_timeout_secs: u64) -> Self {
        self.circuit_breaker = build_breaker(failure_threshold, reset_timeout_secs);
        self
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    /// Signs `transfer` with `signing_key` and broadcasts it.
    pub async fn submit_with_key(
        &self,
        transfer: &UnsignedTransfer,
        signing_key: Option<&str>,
    ) -> Result<String, GatewayError> {
        let encoded = signing_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GatewayError::Submission("no signing key configured".to_string()))?;
        let key = transfer::parse_signing_key(encoded)?;

        if key.verifying_key().to_bytes() != transfer.from {
            return Err(GatewayError::Submission(format!(
                "signing key does not control source address {}",
                transfer.source
            )));
        }

        let blockhash = self.latest_blockhash().await?;
        let signed = transfer.sign(&key, &blockhash);
        let wire = base64::engine::general_purpose::STANDARD.encode(&signed.wire);

        let params = json!([
            wire,
            {
                "encoding": "base64",
                "skipPreflight": false,
                "preflightCommitment": self.commitment.as_str(),
            }
        ]);

        match self.rpc::<String>("sendTransaction", params).await {
            Ok(Some(signature)) if !signature.is_empty() => {
                tracing::info!(
                    signature = %signature,
                    source = %transfer.source,
                    destination = %transfer.destination,
                    lamports = transfer.lamports,
                    "transfer broadcast"
                );
                Ok(signature)
            }
            Ok(_) => Err(GatewayError::Submission(
                "network returned no signature".to_string(),
            )),
            Err(RpcFailure::Rpc { message, .. }) => Err(GatewayError::Submission(message)),
            Err(other @ (RpcFailure::Unreachable(_) | RpcFailure::CircuitOpen)) => {
                Err(GatewayError::Connectivity(other.to_string()))
            }
            // the node may have accepted it; the signature is the transaction id
            Err(other) => Err(GatewayError::Unconfirmed {
                signature: signed.signature_base58(),
                reason: other.to_string(),
            }),
        }
    }

    async fn latest_blockhash(&self) -> Result<[u8; 32], GatewayError> {
        let params = json!([{ "commitment": self.commitment.as_str() }]);
        let latest = self
            .rpc::<WithContext<LatestBlockhash>>("getLatestBlockhash", params)
            .await
            .map_err(|e| GatewayError::Connectivity(e.to_string()))?
            .ok_or_else(|| GatewayError::Connectivity("no blockhash returned".to_string()))?;

        let bytes = bs58::decode(&latest.value.blockhash)
            .into_vec()
            .map_err(|e| GatewayError::Connectivity(format!("malformed blockhash: {}", e)))?;
        <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| GatewayError::Connectivity("malformed blockhash length".to_string()))
    }

    async fn rpc<T>(&self, method: &'static str, params: Value) -> Result<Option<T>, RpcFailure>
    where
        T: DeserializeOwned + Send,
    {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let client = self.client.clone();
        let url = self.rpc_url.clone();
        let call_timeout = self.call_timeout;

        let call = async move {
            let attempt = async move {
                let response = client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_connect() {
                            RpcFailure::Unreachable(e.to_string())
                        } else {
                            RpcFailure::Transport(e.to_string())
                        }
                    })?;

                if !response.status().is_success() {
                    return Err(RpcFailure::Transport(format!(
                        "rpc endpoint returned HTTP {}",
                        response.status()
                    )));
                }

                let envelope = response
                    .json::<RpcEnvelope<T>>()
                    .await
                    .map_err(|e| RpcFailure::Transport(format!("malformed rpc response: {}", e)))?;

                match envelope.error {
                    Some(err) => Err(RpcFailure::Rpc {
                        code: err.code,
                        message: err.message,
                    }),
                    None => Ok(envelope.result),
                }
            };

            tokio::time::timeout(call_timeout, attempt)
                .await
                .unwrap_or(Err(RpcFailure::Timeout(call_timeout)))
        };

        tracing::debug!(method, "rpc call");
        let result = self
            .circuit_breaker
            .call_with(|failure: &RpcFailure| failure.is_outage(), call)
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(RpcFailure::CircuitOpen),
            Err(FailsafeError::Inner(failure)) => {
                tracing::warn!(method, error = %failure, "rpc call failed");
                Err(failure)
            }
        }
    }
}

#[async_trait]
impl NetworkGateway for SolanaRpcGateway {
    fn network_name(&self) -> &str {
        &self.network
    }

    async fn get_balance(&self, address: &str) -> Result<u64, GatewayError> {
        address::validate(address)?;

        let params = json!([address, { "commitment": self.commitment.as_str() }]);
        match self.rpc::<WithContext<u64>>("getBalance", params).await {
            Ok(Some(balance)) => Ok(balance.value),
            Ok(None) => Err(GatewayError::Connectivity(format!(
                "no balance returned for {}",
                address
            ))),
            Err(failure) => Err(GatewayError::Connectivity(failure.to_string())),
        }
    }

    async fn submit(&self, transfer: &UnsignedTransfer) -> Result<String, GatewayError> {
        self.submit_with_key(transfer, self.signing_key.as_deref()).await
    }

    async fn query_status(&self, signature: &str) -> Result<TransferStatus, GatewayError> {
        // getTransaction does not serve `processed` reads
        let read_commitment = self.commitment.max(Commitment::Confirmed);
        let params = json!([
            signature,
            {
                "commitment": read_commitment.as_str(),
                "encoding": "json",
                "maxSupportedTransactionVersion": 0,
            }
        ]);

        let info = self
            .rpc::<TransactionInfo>("getTransaction", params)
            .await
            .map_err(|e| GatewayError::Connectivity(e.to_string()))?;

        let Some(info) = info else {
            return Ok(TransferStatus::not_found());
        };

        let confirmation_state = match &info.meta {
            Some(meta) if meta.err.is_none() => {
                if self.commitment == Commitment::Finalized {
                    ConfirmationState::Finalized
                } else {
                    ConfirmationState::Confirmed
                }
            }
            Some(_) => ConfirmationState::Failed,
            None => ConfirmationState::Pending,
        };

        Ok(TransferStatus {
            found: true,
            confirmation_state,
            block_reference: info.slot.and_then(|slot| i64::try_from(slot).ok()),
            fee_lamports: info.meta.and_then(|meta| meta.fee),
        })
    }
}

fn build_breaker(failure_threshold: u32, reset_timeout_secs: u64) -> Breaker {
    // equal_jittered asserts a non-zero interval
    let reset_timeout_secs = reset_timeout_secs.max(1);
    let backoff = backoff::equal_jittered(
        Duration::from_secs(reset_timeout_secs),
        Duration::from_secs(reset_timeout_secs * 2),
    );
    let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
    BreakerConfig::new().failure_policy(policy).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_creation() {
        let gateway = SolanaRpcGateway::new(
            "https://api.devnet.solana.com".to_string(),
            "devnet".to_string(),
        );
        assert_eq!(gateway.rpc_url, "https://api.devnet.solana.com");
        assert_eq!(gateway.network_name(), "devnet");
        assert_eq!(gateway.commitment(), Commitment::Confirmed);
    }

    #[test]
    fn test_circuit_breaker_starts_closed() {
        let gateway = SolanaRpcGateway::new(
            "https://api.devnet.solana.com".to_string(),
            "devnet".to_string(),
        )
        .with_circuit_breaker(5, 30);
        assert_eq!(gateway.circuit_state(), "closed");
    }

    #[test]
    fn test_rpc_errors_do_not_count_as_outages() {
        assert!(RpcFailure::Unreachable("refused".into()).is_outage());
        assert!(RpcFailure::Transport("reset".into()).is_outage());
        assert!(RpcFailure::Timeout(Duration::from_secs(1)).is_outage());
        assert!(!RpcFailure::Rpc {
            code: -32002,
            message: "preflight failure".into()
        }
        .is_outage());
    }

    #[test]
    fn test_zero_reset_timeout_does_not_panic() {
        let gateway = SolanaRpcGateway::new("http://localhost:8899".into(), "devnet".into())
            .with_circuit_breaker(3, 0);
        assert_eq!(gateway.circuit_state(), "closed");
    }

    #[test]
    fn test_fee_estimate_is_flat_minimum() {
        let gateway = SolanaRpcGateway::new("http://localhost:8899".into(), "devnet".into());
        assert_eq!(gateway.estimate_fee(), super::super::units::MIN_TRANSACTION_FEE);
    }
}
