pub mod transactions;
pub mod wallets;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub network: String,
    pub store: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthStatus),
        (status = 503, description = "Service is unhealthy", body = HealthStatus)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let store_status = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the store");
            "disconnected"
        }
    };
    let healthy = store_status == "connected";

    let health_response = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: state.orchestrator.gateway().network_name().to_string(),
        store: store_status.to_string(),
    };

    // Return 503 if storage is down, 200 otherwise
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        transactions::create_transaction,
        transactions::list_transactions,
        transactions::get_transaction,
        transactions::update_transaction,
        transactions::delete_transaction,
        transactions::process_transaction,
        transactions::refresh_transaction_status,
        transactions::cancel_transaction,
        wallets::get_wallet_balance,
    ),
    components(schemas(
        HealthStatus,
        transactions::CreateTransferRequest,
        transactions::UpdateTransferRequest,
        transactions::TransferResponse,
        wallets::WalletBalanceResponse,
    )),
    tags(
        (name = "Transactions", description = "Transfer lifecycle"),
        (name = "Wallets", description = "On-chain balances"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;
