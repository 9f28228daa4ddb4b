pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod solana;
pub mod utils;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{transactions, wallets, ApiDoc};
use crate::middleware::request_logger::{request_logger_middleware, RequestLogging};
use crate::ports::{NetworkGateway, TransferStore};
use crate::services::TransactionOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TransactionOrchestrator>,
    pub store: Arc<dyn TransferStore>,
    pub request_logging: RequestLogging,
}

impl AppState {
    pub fn new(store: Arc<dyn TransferStore>, gateway: Arc<dyn NetworkGateway>) -> Self {
        Self {
            orchestrator: Arc::new(TransactionOrchestrator::new(store.clone(), gateway)),
            store,
            request_logging: RequestLogging::default(),
        }
    }

    pub fn with_request_logging(mut self, request_logging: RequestLogging) -> Self {
        self.request_logging = request_logging;
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/transactions",
            post(transactions::create_transaction).get(transactions::list_transactions),
        )
        .route(
            "/transactions/:id",
            get(transactions::get_transaction)
                .put(transactions::update_transaction)
                .delete(transactions::delete_transaction),
        )
        .route("/transactions/:id/process", post(transactions::process_transaction))
        .route("/transactions/:id/status", get(transactions::refresh_transaction_status))
        .route("/transactions/:id/cancel", post(transactions::cancel_transaction))
        .route("/wallets/:address/balance", get(wallets::get_wallet_balance))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn_with_state(
            state.request_logging,
            request_logger_middleware,
        ))
        .layer(cors)
        .with_state(state)
}
