//! Detached manifest signatures.
//!
//! The signed message is the 32-byte SHA-256 digest of the exact manifest
//! bytes; the signature is a raw 64-byte ed25519 signature over it.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::{AttestError, AttestResult};

/// Length of a raw signature file.
pub const SIGNATURE_LEN: usize = Signature::BYTE_SIZE;

fn message_digest(manifest_bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(manifest_bytes).into()
}

/// Sign manifest bytes.
pub fn sign_manifest(manifest_bytes: &[u8], key: &SigningKey) -> Vec<u8> {
    key.sign(&message_digest(manifest_bytes)).to_bytes().to_vec()
}

/// Verify a detached signature over manifest bytes.
///
/// Any failure (wrong length, wrong key, altered bytes) is a crypto error;
/// there is no partial validity.
pub fn verify_manifest(
    manifest_bytes: &[u8],
    signature: &[u8],
    key: &VerifyingKey,
) -> AttestResult<()> {
    let signature = Signature::from_slice(signature).map_err(|_| {
        AttestError::crypto(format!(
            "signature verification failed: malformed signature ({} bytes, expected {SIGNATURE_LEN})",
            signature.len()
        ))
    })?;

    key.verify(&message_digest(manifest_bytes), &signature)
        .map_err(|_| {
            AttestError::crypto(
                "signature verification failed: manifest was altered or signed with a different key",
            )
        })
}

/// Generate a fresh signing key.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut rand::thread_rng())
}

/// Key id: `sha256:<hex>` of the SPKI DER encoding.
pub fn key_id(key: &VerifyingKey) -> AttestResult<String> {
    use pkcs8::EncodePublicKey;

    let doc = key
        .to_public_key_der()
        .map_err(|e| AttestError::config(format!("failed to encode public key: {e}")))?;
    Ok(format!("sha256:{}", hex::encode(Sha256::digest(doc.as_bytes()))))
}
