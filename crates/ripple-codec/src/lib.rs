/// Ripple codec boundary
///
/// Message bodies pass through a `BodyCodec` before they are written to the
/// store and after they are read back. The store itself never sees plaintext
/// and log sites use `redact` instead of the body.
///
/// Two implementations ship: `Base64Codec`, a visible placeholder that
/// proves the round trip without key management, and `AesGcmCodec`,
/// AES-256-GCM with a random nonce prepended to the base64-armored output.
pub mod aes;
pub mod base64;

pub use aes::AesGcmCodec;
pub use base64::Base64Codec;

use anyhow::Result;

/// Placeholder substituted for message bodies in logs.
pub const REDACTED_BODY: &str = "[MESSAGE_CONTENT]";

/// Encrypt/decrypt/redact contract applied around message bodies.
/// `decrypt(encrypt(x)) == x` must hold for every input, including the
/// empty string and non-ASCII text.
pub trait BodyCodec: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;

    fn decrypt(&self, ciphertext: &str) -> Result<String>;

    /// Redact a message body for safe logging — no plaintext in logs.
    fn redact(&self, _body: &str) -> &'static str {
        REDACTED_BODY
    }
}
