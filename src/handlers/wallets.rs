use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::services::WalletBalance;
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalanceResponse {
    pub address: String,
    /// Balance in SOL
    #[schema(value_type = String, example = "1.500000000")]
    pub balance_major: BigDecimal,
    /// Balance in lamports
    pub balance_minor: u64,
    pub network: String,
}

impl From<WalletBalance> for WalletBalanceResponse {
    fn from(balance: WalletBalance) -> Self {
        Self {
            address: balance.address,
            balance_major: balance.balance_major,
            balance_minor: balance.balance_minor,
            network: balance.network,
        }
    }
}

#[utoipa::path(
    get,
    path = "/wallets/{address}/balance",
    params(("address" = String, Path, description = "Base58 wallet address")),
    responses(
        (status = 200, description = "Current balance", body = WalletBalanceResponse),
        (status = 400, description = "Invalid address"),
        (status = 503, description = "Network unreachable")
    ),
    tag = "Wallets"
)]
pub async fn get_wallet_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let balance = state.orchestrator.wallet_balance(address.trim()).await?;
    Ok(Json(WalletBalanceResponse::from(balance)))
}
