use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::BodyCodec;

/// Placeholder codec: plain base64, no keys.
/// Useful for development and tests where the visible encoding proves the
/// encrypt/decrypt boundary is wired without key-management complexity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Codec;

impl BodyCodec for Base64Codec {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(BASE64.encode(plaintext.as_bytes()))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let bytes = BASE64
            .decode(ciphertext)
            .context("body is not valid base64")?;
        String::from_utf8(bytes).context("decoded body is not valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::REDACTED_BODY;

    #[test]
    fn roundtrip() {
        let codec = Base64Codec;
        for input in ["", "Hey, how are you?", "héllo wörld 日本語 🚀"] {
            let encrypted = codec.encrypt(input).unwrap();
            if !input.is_empty() {
                assert_ne!(encrypted, input);
            }
            assert_eq!(codec.decrypt(&encrypted).unwrap(), input);
        }
    }

    #[test]
    fn garbage_input_fails() {
        let codec = Base64Codec;
        assert!(codec.decrypt("!!! not base64 !!!").is_err());
    }

    #[test]
    fn redact_is_fixed_placeholder() {
        let codec = Base64Codec;
        assert_eq!(codec.redact("super secret"), REDACTED_BODY);
        assert_eq!(codec.redact(""), REDACTED_BODY);
    }
}
