use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ports::StoreError;
use crate::solana::{AddressError, ConversionError, GatewayError};
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Business rule violated: {0}")]
    BusinessLogic(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Network connectivity error: {0}")]
    NetworkConnectivity(String),

    #[error("Transaction submission failed: {0}")]
    TransactionSubmission(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::BusinessLogic(_)
            | AppError::InvalidAddress(_)
            | AppError::InsufficientFunds(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NetworkConnectivity(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::TransactionSubmission(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable category name rendered in the `error` field of the response body.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "ValidationError",
            AppError::BusinessLogic(_) => "BusinessLogicError",
            AppError::NotFound(_) => "NotFoundError",
            AppError::InvalidAddress(_) => "InvalidAddress",
            AppError::InsufficientFunds(_) => "InsufficientFunds",
            AppError::NetworkConnectivity(_) => "NetworkConnectivityError",
            AppError::TransactionSubmission(_) => "TransactionSubmissionError",
            AppError::Database(_) | AppError::Internal(_) => "InternalError",
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::BusinessLogic(msg)
            | AppError::NotFound(msg)
            | AppError::InvalidAddress(msg)
            | AppError::InsufficientFunds(msg)
            | AppError::NetworkConnectivity(msg)
            | AppError::TransactionSubmission(msg) => msg.clone(),
            AppError::Database(_) | AppError::Internal(_) => {
                "An unexpected error occurred".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": self.category(),
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<AddressError> for AppError {
    fn from(err: AddressError) -> Self {
        AppError::InvalidAddress(err.to_string())
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidAddress(e) => AppError::InvalidAddress(e.to_string()),
            GatewayError::Conversion(e) => AppError::Validation(e.to_string()),
            GatewayError::Connectivity(msg) => AppError::NetworkConnectivity(msg),
            GatewayError::Submission(msg) => AppError::TransactionSubmission(msg),
            err @ GatewayError::Unconfirmed { .. } => AppError::NetworkConnectivity(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::NotFound(format!("Transfer {} not found", id)),
            StoreError::Frozen(msg) => AppError::BusinessLogic(msg),
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Released => AppError::Internal("record lock already released".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status_code() {
        let error = AppError::NotFound("Resource not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_connectivity_error_status_code() {
        let error = AppError::NetworkConnectivity("rpc down".to_string());
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_submission_error_status_code() {
        let error = AppError::TransactionSubmission("rejected".to_string());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_database_error_status_code() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_gateway_errors_map_to_taxonomy() {
        let err: AppError = GatewayError::Connectivity("timeout".into()).into();
        assert!(matches!(err, AppError::NetworkConnectivity(_)));

        let err: AppError = GatewayError::Submission("no key".into()).into();
        assert!(matches!(err, AppError::TransactionSubmission(_)));

        let err: AppError = GatewayError::Unconfirmed {
            signature: "5sig".into(),
            reason: "timed out".into(),
        }
        .into();
        assert!(matches!(err, AppError::NetworkConnectivity(_)));
    }

    #[tokio::test]
    async fn test_not_found_error_response() {
        let response = AppError::NotFound("Transfer 1 not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"], "NotFoundError");
        assert_eq!(body["message"], "Transfer 1 not found");
    }

    #[tokio::test]
    async fn test_internal_error_does_not_leak_details() {
        let response =
            AppError::Internal("connection string postgres://u:p@h".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "InternalError");
        assert_eq!(body["message"], "An unexpected error occurred");
    }
}
