use bigdecimal::BigDecimal;
use std::fmt;

use crate::solana::{address, units};

pub const WALLET_MAX_LEN: usize = 100;
pub const SECRET_MIN_LEN: usize = 4;
pub const ALLOWED_TRANSFER_KINDS: &[&str] = &["send"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_min_len(field: &'static str, value: &str, min_len: usize) -> ValidationResult {
    if value.chars().count() < min_len {
        return Err(ValidationError::new(
            field,
            format!("must be at least {} characters", min_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

/// Checks the length bounds of a wallet field and then its address encoding.
/// Address failures are reported as validation failures of `field`.
pub fn validate_wallet(field: &'static str, wallet: &str) -> ValidationResult {
    validate_required(field, wallet)?;
    validate_max_len(field, wallet, WALLET_MAX_LEN)?;

    address::validate(wallet).map_err(|e| ValidationError::new(field, e.reason))
}

pub fn validate_distinct_wallets(source: &str, destination: &str) -> ValidationResult {
    if source == destination {
        return Err(ValidationError::new(
            "destinationWallet",
            "source and destination wallets must differ",
        ));
    }

    Ok(())
}

/// Amount must be above zero and a whole number of lamports.
pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }
    units::to_minor_unit(amount).map_err(|e| ValidationError::new("amount", e.to_string()))?;

    Ok(())
}

pub fn validate_secret(secret: &str) -> ValidationResult {
    validate_required("secret", secret)?;
    validate_min_len("secret", secret, SECRET_MIN_LEN)
}
