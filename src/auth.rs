//! Sender Authentication
//!
//! Provides:
//! - SS58 sender parsing
//! - Sr25519 signature verification over raw payload bytes
//! - Transaction hash derivation for accepted submissions

use sha2::{Digest, Sha256};
use sp_core::crypto::Ss58Codec;
use sp_core::sr25519::{Public, Signature};
use tracing::debug;

/// Sr25519 signatures are always 64 bytes
pub const SIGNATURE_LEN: usize = 64;

/// Wrapping applied by polkadot.js `signRaw` before signing
const BYTES_PREFIX: &[u8] = b"<Bytes>";
const BYTES_SUFFIX: &[u8] = b"</Bytes>";

// ============================================================================
// SS58 VALIDATION
// ============================================================================

/// Encoded length bounds for an SS58 address of a 32-byte key
const SS58_MIN_LEN: usize = 40;
const SS58_MAX_LEN: usize = 60;

/// Decode a sender address into its sr25519 public key
pub fn parse_sender(sender: &str) -> Option<Public> {
    if !(SS58_MIN_LEN..=SS58_MAX_LEN).contains(&sender.len()) {
        return None;
    }
    match Public::from_ss58check(sender) {
        Ok(public_key) => Some(public_key),
        Err(e) => {
            debug!("Failed to parse SS58 sender: {:?}", e);
            None
        }
    }
}

pub fn is_valid_sender(sender: &str) -> bool {
    parse_sender(sender).is_some()
}

// ============================================================================
// SIGNATURE VERIFICATION
// ============================================================================

/// Verify an sr25519 signature produced by `sender` over `message`.
///
/// A signature over the `<Bytes>`-wrapped message is accepted as well, since
/// browser wallets wrap raw payloads that way before signing.
///
/// # Arguments
/// * `sender` - SS58-encoded public key
/// * `message` - The exact bytes that were signed
/// * `signature` - Raw signature bytes (64 bytes)
pub fn verify_signature(sender: &str, message: &[u8], signature: &[u8]) -> bool {
    let Some(public_key) = parse_sender(sender) else {
        return false;
    };

    let sig_array: [u8; SIGNATURE_LEN] = match signature.try_into() {
        Ok(arr) => arr,
        Err(_) => {
            debug!(
                "Invalid signature length: {} (expected {})",
                signature.len(),
                SIGNATURE_LEN
            );
            return false;
        }
    };
    let signature = Signature::from_raw(sig_array);

    use sp_core::Pair;
    if sp_core::sr25519::Pair::verify(&signature, message, &public_key) {
        return true;
    }

    let wrapped = [BYTES_PREFIX, message, BYTES_SUFFIX].concat();
    let is_valid = sp_core::sr25519::Pair::verify(&signature, &wrapped, &public_key);

    if !is_valid {
        debug!(
            "Signature verification failed for {} byte payload with sender {}",
            message.len(),
            &sender[..16.min(sender.len())]
        );
    }

    is_valid
}

// ============================================================================
// TRANSACTION HASH
// ============================================================================

/// Hex-encoded sha256 over `payload || signature`
pub fn transaction_hash(payload: &[u8], signature: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.update(signature);
    hex::encode(hasher.finalize())
}
