pub mod credentials;
pub mod orchestrator;
pub mod reconciler;

pub use orchestrator::{NewTransfer, TransactionOrchestrator, TransferUpdate, WalletBalance};
pub use reconciler::run_reconciler;
