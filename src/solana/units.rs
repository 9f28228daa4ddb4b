//! SOL <-> lamports conversion on exact decimals.

use bigdecimal::{BigDecimal, ToPrimitive};
use thiserror::Error;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
pub const DECIMALS: i64 = 9;

/// Flat fee charged for a single-signature transfer, in lamports.
pub const MIN_TRANSACTION_FEE: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("amount must not be negative")]
    Negative,
    #[error("amount exceeds the representable lamport range")]
    Overflow,
    #[error("amount has more than 9 decimal places")]
    TooPrecise,
}

/// Converts a SOL amount to lamports. Fractions of a lamport are rejected.
pub fn to_minor_unit(major: &BigDecimal) -> Result<u64, ConversionError> {
    if major < &BigDecimal::from(0) {
        return Err(ConversionError::Negative);
    }

    let exact = major.with_scale(DECIMALS);
    if &exact != major {
        return Err(ConversionError::TooPrecise);
    }

    let lamports = exact * BigDecimal::from(LAMPORTS_PER_SOL);
    lamports.to_u64().ok_or(ConversionError::Overflow)
}

pub fn to_major_unit(minor: u64) -> BigDecimal {
    BigDecimal::new(minor.into(), DECIMALS)
}
