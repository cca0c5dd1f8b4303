//! Request signature checks.
//!
//! Clients sign `"{client_ip}:{path}:{hostname}"` with HMAC-SHA256 over the
//! shared sign token and send the lower-case hex digest as `sign`.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::trace;

type HmacSha256 = Hmac<Sha256>;

/// Hex length of an HMAC-SHA256 digest
pub const SIGNATURE_HEX_LEN: usize = 64;

/// Message separator
const SEPARATOR: u8 = b':';

/// Signs and verifies request messages with the shared secret
#[derive(Clone)]
pub struct HmacAuthenticator {
    keyed: HmacSha256,
}

impl HmacAuthenticator {
    /// Key the authenticator with the shared sign token
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            keyed: HmacSha256::new_from_slice(secret.as_ref())?,
        })
    }

    /// Join `parts` with `:` into a message buffer of initial capacity `size_hint`
    ///
    /// Returns `None` when either the size hint or the part list is empty.
    pub fn build_message(size_hint: usize, parts: &[&str]) -> Option<Vec<u8>> {
        if size_hint == 0 || parts.is_empty() {
            return None;
        }

        let mut message = Vec::with_capacity(size_hint);
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                message.push(SEPARATOR);
            }
            message.extend_from_slice(part.as_bytes());
        }
        Some(message)
    }

    /// Canonical message for a request
    pub fn request_message(client_ip: &str, path: &str, hostname: &str) -> Vec<u8> {
        let size = client_ip.len() + path.len() + hostname.len() + 2;
        Self::build_message(size, &[client_ip, path, hostname]).unwrap_or_default()
    }

    /// Lower-case hex HMAC-SHA256 of `message`
    pub fn sign(&self, message: &[u8]) -> String {
        let mut mac = self.keyed.clone();
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Compare `provided_hex` against the expected signature of `message`
    ///
    /// Returns the expected hex together with the verdict. The comparison
    /// runs in constant time.
    pub fn verify(&self, message: &[u8], provided_hex: &[u8]) -> (String, bool) {
        let expected = self.sign(message);
        let ok: bool = expected.as_bytes().ct_eq(provided_hex).into();
        if !ok {
            trace!(expected = %expected, "Request signature mismatch");
        }
        (expected, ok)
    }
}

impl fmt::Debug for HmacAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacAuthenticator")
            .field("secret", &"<redacted>")
            .finish()
    }
}
