//! Legacy-format System Program transfer: message layout, signing and
//! wire encoding.

use bigdecimal::BigDecimal;
use ed25519_dalek::{Signer, SigningKey};

use super::address::{self, PUBKEY_LEN};
use super::units;
use super::GatewayError;

pub const SIGNATURE_LEN: usize = 64;
const SYSTEM_PROGRAM_ID: [u8; PUBKEY_LEN] = [0u8; PUBKEY_LEN];
const SYSTEM_TRANSFER_INSTRUCTION: u32 = 2;

/// A transfer of `lamports` from `from` to `to`, not yet bound to a blockhash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransfer {
    pub source: String,
    pub destination: String,
    pub from: [u8; PUBKEY_LEN],
    pub to: [u8; PUBKEY_LEN],
    pub lamports: u64,
}

/// A signed transaction ready for `sendTransaction`.
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub signature: [u8; SIGNATURE_LEN],
    pub wire: Vec<u8>,
}

impl SignedTransfer {
    pub fn signature_base58(&self) -> String {
        bs58::encode(self.signature).into_string()
    }
}

impl UnsignedTransfer {
    pub fn new(source: &str, destination: &str, amount: &BigDecimal) -> Result<Self, GatewayError> {
        let from = address::decode(source)?;
        let to = address::decode(destination)?;
        let lamports = units::to_minor_unit(amount)?;

        Ok(Self {
            source: source.to_string(),
            destination: destination.to_string(),
            from,
            to,
            lamports,
        })
    }

    /// Serializes the message that the fee payer signs.
    ///
    /// Account order is `[from (signer, writable), to (writable), system program
    /// (readonly)]`, so the header is `[1, 0, 1]`.
    pub fn message_bytes(&self, recent_blockhash: &[u8; 32]) -> Vec<u8> {
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(&SYSTEM_TRANSFER_INSTRUCTION.to_le_bytes());
        data.extend_from_slice(&self.lamports.to_le_bytes());

        let mut msg = Vec::with_capacity(3 + 1 + 3 * PUBKEY_LEN + 32 + 1 + 1 + 3 + 1 + data.len());
        msg.extend_from_slice(&[1, 0, 1]);

        encode_compact_u16(&mut msg, 3);
        msg.extend_from_slice(&self.from);
        msg.extend_from_slice(&self.to);
        msg.extend_from_slice(&SYSTEM_PROGRAM_ID);

        msg.extend_from_slice(recent_blockhash);

        encode_compact_u16(&mut msg, 1);
        msg.push(2);
        encode_compact_u16(&mut msg, 2);
        msg.extend_from_slice(&[0, 1]);
        encode_compact_u16(&mut msg, data.len() as u16);
        msg.extend_from_slice(&data);

        msg
    }

    pub fn sign(&self, key: &SigningKey, recent_blockhash: &[u8; 32]) -> SignedTransfer {
        let message = self.message_bytes(recent_blockhash);
        let signature = key.sign(&message).to_bytes();

        let mut wire = Vec::with_capacity(1 + SIGNATURE_LEN + message.len());
        encode_compact_u16(&mut wire, 1);
        wire.extend_from_slice(&signature);
        wire.extend_from_slice(&message);

        SignedTransfer { signature, wire }
    }
}

/// Decodes a signing keypair given either as base58 text of the 64 keypair
/// bytes or as the JSON byte array written by `solana-keygen`.
pub fn parse_signing_key(encoded: &str) -> Result<SigningKey, GatewayError> {
    let encoded = encoded.trim();
    let bytes = if encoded.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(encoded)
            .map_err(|e| GatewayError::Submission(format!("signing key is not a byte array: {}", e)))?
    } else {
        bs58::decode(encoded)
            .into_vec()
            .map_err(|e| GatewayError::Submission(format!("signing key is not valid base58: {}", e)))?
    };

    let keypair = <[u8; 64]>::try_from(bytes.as_slice()).map_err(|_| {
        GatewayError::Submission(format!(
            "signing key must be 64 bytes, got {}",
            bytes.len()
        ))
    })?;

    SigningKey::from_keypair_bytes(&keypair)
        .map_err(|e| GatewayError::Submission(format!("signing key is inconsistent: {}", e)))
}

fn encode_compact_u16(buf: &mut Vec<u8>, mut value: u16) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};
    use std::str::FromStr;

    fn test_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn transfer_from(key: &SigningKey) -> UnsignedTransfer {
        let source = address::encode(&key.verifying_key().to_bytes());
        UnsignedTransfer::new(
            &source,
            "Vote111111111111111111111111111111111111111",
            &BigDecimal::from_str("1.5").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn compact_u16_encoding() {
        let mut buf = Vec::new();
        encode_compact_u16(&mut buf, 0x7f);
        assert_eq!(buf, vec![0x7f]);

        buf.clear();
        encode_compact_u16(&mut buf, 0x80);
        assert_eq!(buf, vec![0x80, 0x01]);

        buf.clear();
        encode_compact_u16(&mut buf, 0x3fff);
        assert_eq!(buf, vec![0xff, 0x7f]);
    }

    #[test]
    fn builds_transfer_in_lamports() {
        let transfer = transfer_from(&test_key());
        assert_eq!(transfer.lamports, 1_500_000_000);
    }

    #[test]
    fn rejects_invalid_destination() {
        let err = UnsignedTransfer::new(
            "11111111111111111111111111111111",
            "not-an-address",
            &BigDecimal::from(1),
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidAddress(_)));
    }

    #[test]
    fn message_layout() {
        let transfer = transfer_from(&test_key());
        let blockhash = [3u8; 32];
        let msg = transfer.message_bytes(&blockhash);

        assert_eq!(&msg[..3], &[1, 0, 1]);
        assert_eq!(msg[3], 3);
        assert_eq!(&msg[4..36], &transfer.from);
        assert_eq!(&msg[36..68], &transfer.to);
        assert_eq!(&msg[68..100], &[0u8; 32]);
        assert_eq!(&msg[100..132], &blockhash);
        // one instruction, program index 2, accounts [0, 1], 12 data bytes
        assert_eq!(&msg[132..138], &[1, 2, 2, 0, 1, 12]);
        assert_eq!(&msg[138..142], &2u32.to_le_bytes());
        assert_eq!(&msg[142..150], &1_500_000_000u64.to_le_bytes());
        assert_eq!(msg.len(), 150);
    }

    #[test]
    fn signature_verifies_against_message() {
        let key = test_key();
        let transfer = transfer_from(&key);
        let blockhash = [5u8; 32];
        let signed = transfer.sign(&key, &blockhash);

        assert_eq!(signed.wire[0], 1);
        assert_eq!(&signed.wire[1..65], &signed.signature);

        let message = &signed.wire[65..];
        assert_eq!(message, transfer.message_bytes(&blockhash).as_slice());
        let signature = Signature::from_bytes(&signed.signature);
        assert!(key.verifying_key().verify(message, &signature).is_ok());
    }

    #[test]
    fn parses_base58_and_json_keypairs() {
        let key = test_key();
        let keypair = key.to_keypair_bytes();

        let from_b58 = parse_signing_key(&bs58::encode(keypair).into_string()).unwrap();
        assert_eq!(from_b58.to_bytes(), key.to_bytes());

        let json = serde_json::to_string(&keypair.to_vec()).unwrap();
        let from_json = parse_signing_key(&json).unwrap();
        assert_eq!(from_json.to_bytes(), key.to_bytes());
    }

    #[test]
    fn rejects_malformed_keypairs() {
        assert!(parse_signing_key("0OIl").is_err());
        assert!(parse_signing_key(&bs58::encode([1u8; 32]).into_string()).is_err());

        // secret half does not match public half
        let mut keypair = test_key().to_keypair_bytes();
        keypair[40] ^= 0xff;
        assert!(parse_signing_key(&bs58::encode(keypair).into_string()).is_err());
    }
}
