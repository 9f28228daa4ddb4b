pub mod memory_transfer_store;
pub mod postgres_transfer_store;

pub use memory_transfer_store::InMemoryTransferStore;
pub use postgres_transfer_store::PostgresTransferStore;
