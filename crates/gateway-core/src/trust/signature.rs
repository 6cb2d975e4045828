use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Verifies a hex-encoded ed25519 `signature` over `message` for a hex public key.
///
/// Both hex strings may carry a `0x` prefix. Any decoding failure yields `false`.
#[must_use]
pub fn verify_ed25519(identity: &str, message: &[u8], signature: &str) -> bool {
    let Some(key_bytes) = decode_fixed::<32>(identity) else {
        return false;
    };
    let Some(sig_bytes) = decode_fixed::<64>(signature) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };

    key.verify(message, &Signature::from_bytes(&sig_bytes)).is_ok()
}

fn decode_fixed<const N: usize>(value: &str) -> Option<[u8; N]> {
    let trimmed = value.trim();
    let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(hex_str).ok()?;
    bytes.try_into().ok()
}
