//! Address rules for Solana accounts: base58 text encoding of a 32-byte
//! ed25519 public key.

use thiserror::Error;

pub const ADDRESS_MIN_LEN: usize = 32;
pub const ADDRESS_MAX_LEN: usize = 44;
pub const PUBKEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct AddressError {
    pub reason: String,
}

impl AddressError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub fn validate(address: &str) -> Result<(), AddressError> {
    decode(address).map(|_| ())
}

/// Validates `address` and returns the public key bytes it encodes.
pub fn decode(address: &str) -> Result<[u8; PUBKEY_LEN], AddressError> {
    if address.is_empty() {
        return Err(AddressError::new("address must not be empty"));
    }

    let len = address.chars().count();
    if !(ADDRESS_MIN_LEN..=ADDRESS_MAX_LEN).contains(&len) {
        return Err(AddressError::new(format!(
            "address must be between {} and {} characters, got {}",
            ADDRESS_MIN_LEN, ADDRESS_MAX_LEN, len
        )));
    }

    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| AddressError::new(format!("address is not valid base58: {}", e)))?;

    <[u8; PUBKEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
        AddressError::new(format!(
            "decoded address must be {} bytes, got {}",
            PUBKEY_LEN,
            bytes.len()
        ))
    })
}

pub fn encode(pubkey: &[u8; PUBKEY_LEN]) -> String {
    bs58::encode(pubkey).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_known_program_ids() {
        assert!(validate("11111111111111111111111111111111").is_ok());
        assert!(validate("Vote111111111111111111111111111111111111111").is_ok());
        assert!(validate("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA").is_ok());
    }

    #[test]
    fn rejects_empty_address() {
        let err = validate("").unwrap_err();
        assert!(err.reason.contains("empty"));
    }

    #[test]
    fn rejects_out_of_range_length() {
        assert!(validate("1111").is_err());
        assert!(validate(&"1".repeat(45)).is_err());
    }

    #[test]
    fn rejects_non_base58_characters() {
        // '0', 'O', 'I' and 'l' are outside the base58 alphabet
        let err = validate("0OIl111111111111111111111111111111").unwrap_err();
        assert!(err.reason.contains("base58"));
    }

    #[test]
    fn rejects_wrong_decoded_length() {
        // 33 leading '1's decode to 33 zero bytes
        let err = validate(&"1".repeat(33)).unwrap_err();
        assert!(err.reason.contains("32 bytes"));
    }

    #[test]
    fn encode_is_inverse_of_decode() {
        let key = [9u8; PUBKEY_LEN];
        let text = encode(&key);
        assert_eq!(decode(&text).unwrap(), key);
    }
}
