pub mod transfer;

pub use transfer::{
    ConfirmationState, LifecycleStatus, TransferFilter, TransferRecord, TRANSFER_KIND_SEND,
};
