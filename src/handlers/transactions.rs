use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{ConfirmationState, LifecycleStatus, TransferFilter, TransferRecord};
use crate::error::AppError;
use crate::services::{NewTransfer, TransferUpdate};
use crate::validation::{self, ALLOWED_TRANSFER_KINDS};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTransferRequest {
    /// Source wallet address
    #[schema(example = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T")]
    pub wallet: String,
    /// Hashed before storage, never returned
    pub secret: String,
    #[schema(example = "send")]
    pub kind: String,
    /// Amount in SOL, as a JSON string or number
    #[schema(value_type = String, example = "100.50")]
    pub amount: Value,
    pub destination_wallet: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTransferRequest {
    #[schema(example = "processed")]
    pub status: Option<String>,
    #[schema(value_type = Option<String>)]
    pub amount: Option<Value>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    pub source_address: Option<String>,
    pub destination_address: Option<String>,
    /// Lifecycle status; legacy Portuguese labels are accepted
    pub status: Option<String>,
}

/// A transfer as returned by the API. The credential reference is never exposed.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub id: Uuid,
    pub source_address: String,
    pub destination_address: String,
    #[schema(value_type = String, example = "100.50")]
    pub amount: BigDecimal,
    pub kind: String,
    #[schema(value_type = String, example = "processing")]
    pub status: LifecycleStatus,
    pub network_signature: Option<String>,
    #[schema(value_type = Option<String>, example = "confirmed")]
    pub confirmation_state: Option<ConfirmationState>,
    pub block_reference: Option<i64>,
    #[schema(value_type = Option<String>, example = "0.000005")]
    pub network_fee: Option<BigDecimal>,
    pub network_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TransferRecord> for TransferResponse {
    fn from(record: TransferRecord) -> Self {
        Self {
            id: record.id,
            source_address: record.source_address,
            destination_address: record.destination_address,
            amount: record.amount,
            kind: record.kind,
            status: record.lifecycle_status,
            network_signature: record.network_signature,
            confirmation_state: record.confirmation_state,
            block_reference: record.block_reference,
            network_fee: record.network_fee,
            network_name: record.network_name,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/transactions",
    request_body = CreateTransferRequest,
    responses(
        (status = 201, description = "Transfer created and submitted", body = TransferResponse),
        (status = 400, description = "Validation, business rule, address or balance failure"),
        (status = 503, description = "Network unreachable")
    ),
    tag = "Transactions"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    payload: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let kind = validation::sanitize_string(&payload.kind);
    validation::validate_enum("kind", &kind, ALLOWED_TRANSFER_KINDS)?;

    let input = NewTransfer {
        source_address: validation::sanitize_string(&payload.wallet),
        destination_address: validation::sanitize_string(&payload.destination_wallet),
        secret: payload.secret,
        amount: parse_amount(&payload.amount)?,
    };

    let record = state.orchestrator.create(input).await?;
    Ok((StatusCode::CREATED, Json(TransferResponse::from(record))))
}

#[utoipa::path(
    get,
    path = "/transactions",
    params(ListQuery),
    responses(
        (status = 200, description = "Matching transfers, newest first", body = [TransferResponse]),
        (status = 400, description = "Unknown status filter")
    ),
    tag = "Transactions"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;

    let status = query
        .status
        .as_deref()
        .map(parse_status)
        .transpose()?;
    let filter = TransferFilter {
        source_address: query.source_address.filter(|s| !s.is_empty()),
        destination_address: query.destination_address.filter(|s| !s.is_empty()),
        status,
    };

    let records = state.orchestrator.list(&filter).await?;
    let body: Vec<TransferResponse> = records.into_iter().map(TransferResponse::from).collect();
    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/transactions/{id}",
    params(("id" = Uuid, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Transfer found", body = TransferResponse),
        (status = 404, description = "Transfer not found")
    ),
    tag = "Transactions"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = transfer_id(id)?;
    let record = state.orchestrator.get(id).await?;
    Ok(Json(TransferResponse::from(record)))
}

#[utoipa::path(
    put,
    path = "/transactions/{id}",
    params(("id" = Uuid, Path, description = "Transfer id")),
    request_body = UpdateTransferRequest,
    responses(
        (status = 200, description = "Transfer updated", body = TransferResponse),
        (status = 400, description = "Invalid field or forbidden transition"),
        (status = 404, description = "Transfer not found")
    ),
    tag = "Transactions"
)]
pub async fn update_transaction(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateTransferRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = transfer_id(id)?;
    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let update = TransferUpdate {
        status: payload.status.as_deref().map(parse_status).transpose()?,
        amount: payload.amount.as_ref().map(parse_amount).transpose()?,
    };

    let record = state.orchestrator.update(id, update).await?;
    Ok(Json(TransferResponse::from(record)))
}

#[utoipa::path(
    delete,
    path = "/transactions/{id}",
    params(("id" = Uuid, Path, description = "Transfer id")),
    responses(
        (status = 204, description = "Transfer deleted"),
        (status = 400, description = "Transfer already sent to the network"),
        (status = 404, description = "Transfer not found")
    ),
    tag = "Transactions"
)]
pub async fn delete_transaction(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = transfer_id(id)?;
    state.orchestrator.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/transactions/{id}/process",
    params(("id" = Uuid, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Transfer submitted", body = TransferResponse),
        (status = 400, description = "Transfer not submittable or submission failed"),
        (status = 404, description = "Transfer not found")
    ),
    tag = "Transactions"
)]
pub async fn process_transaction(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = transfer_id(id)?;
    let record = state.orchestrator.submit(id).await?;
    Ok(Json(TransferResponse::from(record)))
}

#[utoipa::path(
    get,
    path = "/transactions/{id}/status",
    params(("id" = Uuid, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Status refreshed from the network", body = TransferResponse),
        (status = 400, description = "Transfer has no network signature"),
        (status = 404, description = "Transfer not found"),
        (status = 503, description = "Network unreachable")
    ),
    tag = "Transactions"
)]
pub async fn refresh_transaction_status(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = transfer_id(id)?;
    let record = state.orchestrator.refresh_status(id).await?;
    Ok(Json(TransferResponse::from(record)))
}

#[utoipa::path(
    post,
    path = "/transactions/{id}/cancel",
    params(("id" = Uuid, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Transfer cancelled", body = TransferResponse),
        (status = 400, description = "Transfer cannot be cancelled"),
        (status = 404, description = "Transfer not found")
    ),
    tag = "Transactions"
)]
pub async fn cancel_transaction(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = transfer_id(id)?;
    let record = state.orchestrator.cancel(id).await?;
    Ok(Json(TransferResponse::from(record)))
}

/// A malformed id cannot name any stored transfer.
fn transfer_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    id.map(|Path(id)| id)
        .map_err(|_| AppError::NotFound("Transfer not found".to_string()))
}

fn parse_status(raw: &str) -> Result<LifecycleStatus, AppError> {
    LifecycleStatus::from_str(raw).map_err(|e| AppError::Validation(format!("status: {}", e)))
}

/// Accepts `"100.50"` and `100.50`. Numbers go through their JSON text so no
/// binary float rounding reaches the amount.
fn parse_amount(raw: &Value) -> Result<BigDecimal, AppError> {
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => {
            return Err(AppError::Validation(
                "amount: must be a decimal number".to_string(),
            ))
        }
    };

    BigDecimal::from_str(&text)
        .map_err(|_| AppError::Validation(format!("amount: '{}' is not a decimal number", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_and_number_amounts() {
        assert_eq!(
            parse_amount(&json!("100.50")).unwrap(),
            BigDecimal::from_str("100.50").unwrap()
        );
        assert_eq!(
            parse_amount(&json!(0.1)).unwrap(),
            BigDecimal::from_str("0.1").unwrap()
        );
        assert!(parse_amount(&json!("ten")).is_err());
        assert!(parse_amount(&json!(true)).is_err());
    }

    #[test]
    fn create_body_rejects_unknown_fields() {
        let body = json!({
            "wallet": "a",
            "secret": "abcd",
            "kind": "send",
            "amount": "1",
            "destinationWallet": "b",
            "memo": "extra"
        });
        assert!(serde_json::from_value::<CreateTransferRequest>(body).is_err());
    }

    #[test]
    fn response_omits_credential_reference() {
        let record = TransferRecord::new_pending(
            "a".to_string(),
            "b".to_string(),
            BigDecimal::from(1),
            "$argon2id$secret-hash".to_string(),
            BigDecimal::from(0),
            "devnet".to_string(),
        );
        let rendered = serde_json::to_value(TransferResponse::from(record)).unwrap();

        assert_eq!(rendered["status"], "pending");
        assert_eq!(rendered["confirmationState"], "pending");
        assert!(rendered.get("credentialReference").is_none());
        assert!(!rendered.to_string().contains("argon2"));
    }
}
