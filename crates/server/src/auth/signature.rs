//! OpenPGP clear-signature verification of the authorization document.

use std::path::Path;

use pgp::crypto::hash::HashAlgorithm;
use pgp::composed::cleartext::CleartextSignedMessage;
use pgp::{Deserializable, SignedPublicKey, StandaloneSignature};
use tracing::{debug, info, warn};

use super::error::SignatureError;

/// Only signatures over SHA-512 are accepted
pub const REQUIRED_HASH: HashAlgorithm = HashAlgorithm::SHA2_512;

/// Text that passed signature verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayload {
    pub plaintext: Vec<u8>,
    /// User IDs of the key that produced the signature
    pub signers: Vec<String>,
}

/// Checks a signed payload and returns its authenticated text
pub trait PayloadVerifier: Send + Sync {
    fn verify(&self, payload: &[u8]) -> Result<VerifiedPayload, SignatureError>;
}

/// Verifies clear-signed messages against a fixed trusted keyring
pub struct PgpVerifier {
    keys: Vec<SignedPublicKey>,
}

impl PgpVerifier {
    /// Load trusted keys from an ASCII-armored keyring
    pub fn from_armored(armored: &str) -> Result<Self, SignatureError> {
        let (parsed, _headers) = SignedPublicKey::from_string_many(armored)
            .map_err(|e| SignatureError::Keyring(e.to_string()))?;

        let mut keys = Vec::new();
        for key in parsed {
            let key = key.map_err(|e| SignatureError::Keyring(e.to_string()))?;
            key.verify()
                .map_err(|e| SignatureError::Keyring(format!("bad self-signature: {}", e)))?;

            for identity in user_ids(&key) {
                info!(identity = %identity, "Loaded trusted signer identity");
            }
            keys.push(key);
        }

        if keys.is_empty() {
            return Err(SignatureError::Keyring("no public keys found".to_string()));
        }

        debug!(key_count = keys.len(), "Trusted keyring loaded");
        Ok(Self { keys })
    }

    /// Load trusted keys from an armored keyring file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SignatureError> {
        let path = path.as_ref();
        let armored = std::fs::read_to_string(path)
            .map_err(|e| SignatureError::Keyring(format!("{}: {}", path.display(), e)))?;
        Self::from_armored(&armored)
    }

    /// Number of trusted primary keys
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Find the trusted key (primary or subkey) that made a signature
    fn find_signer<'a>(
        &'a self,
        msg: &'a CleartextSignedMessage,
    ) -> Option<(&'a SignedPublicKey, &'a StandaloneSignature)> {
        for key in &self.keys {
            if let Ok(sig) = msg.verify(key) {
                return Some((key, sig));
            }
            for subkey in &key.public_subkeys {
                if let Ok(sig) = msg.verify(subkey) {
                    return Some((key, sig));
                }
            }
        }
        None
    }
}

impl PayloadVerifier for PgpVerifier {
    fn verify(&self, payload: &[u8]) -> Result<VerifiedPayload, SignatureError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| SignatureError::Malformed(format!("payload is not UTF-8: {}", e)))?;

        let (msg, _headers) = CleartextSignedMessage::from_string(text)
            .map_err(|e| SignatureError::Malformed(e.to_string()))?;

        let (key, sig) = self.find_signer(&msg).ok_or_else(|| {
            SignatureError::Invalid("no trusted key verifies the signature".to_string())
        })?;

        let hash = sig.signature.config.hash_alg;
        if hash != REQUIRED_HASH {
            warn!(hash = ?hash, "Rejecting signature with weak hash algorithm");
            return Err(SignatureError::Invalid(format!(
                "hash algorithm {:?} is not accepted, {:?} required",
                hash, REQUIRED_HASH
            )));
        }

        let signers = user_ids(key);
        for identity in &signers {
            info!(identity = %identity, "Found trusted identity in received payload");
        }
        info!("Received payload has been verified and approved");

        Ok(VerifiedPayload {
            plaintext: msg.signed_text().into_bytes(),
            signers,
        })
    }
}

fn user_ids(key: &SignedPublicKey) -> Vec<String> {
    key.details
        .users
        .iter()
        .map(|user| user.id.id().to_string())
        .collect()
}

impl std::fmt::Debug for PgpVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgpVerifier")
            .field("keys", &self.keys.len())
            .finish()
    }
}
