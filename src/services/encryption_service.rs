//! Credential vault: AES-256-GCM encryption of connection secrets at rest.
//!
//! The wire format is `iv:authTag:ciphertext`, each segment hex-encoded. The
//! authentication tag is bound to a fixed application AAD, so envelopes lifted
//! from another deployment of the cipher fail closed instead of yielding
//! plaintext.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use thiserror::Error;

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// Fixed additional-authenticated-data tag identifying this application.
const ENVELOPE_AAD: &[u8] = b"apiwatch.credentials.v1";

#[derive(Error, Debug)]
pub enum EncryptionError {
    #[error("Encryption key must be a 32-byte hex string")]
    InvalidKey,
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),
}

fn cipher_from_hex_key(key_hex: &str) -> Result<Aes256Gcm, EncryptionError> {
    let key_bytes = hex::decode(key_hex).map_err(|_| EncryptionError::InvalidKey)?;
    if key_bytes.len() != 32 {
        return Err(EncryptionError::InvalidKey);
    }
    Ok(Aes256Gcm::new(key_bytes.as_slice().into()))
}

/// Encrypts `plain_text` into an `iv:authTag:ciphertext` envelope.
pub fn encrypt(plain_text: &str, key_hex: &str) -> Result<String, EncryptionError> {
    let cipher = cipher_from_hex_key(key_hex)?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut sealed = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plain_text.as_bytes(),
                aad: ENVELOPE_AAD,
            },
        )
        .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

    // aes-gcm appends the 16-byte tag to the ciphertext; the envelope keeps
    // the segments separate.
    let tag = sealed.split_off(sealed.len() - TAG_SIZE);

    Ok(format!(
        "{}:{}:{}",
        hex::encode(nonce),
        hex::encode(tag),
        hex::encode(sealed)
    ))
}

/// Decrypts an `iv:authTag:ciphertext` envelope. Any malformed envelope
/// (wrong segment count, bad hex, wrong segment sizes) or failed tag check
/// fails closed; no partial plaintext is ever returned.
pub fn decrypt(envelope: &str, key_hex: &str) -> Result<String, EncryptionError> {
    let cipher = cipher_from_hex_key(key_hex)?;

    let segments: Vec<&str> = envelope.split(':').collect();
    if segments.len() != 3 {
        return Err(EncryptionError::MalformedEnvelope(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let nonce_bytes = hex::decode(segments[0])
        .map_err(|_| EncryptionError::MalformedEnvelope("iv segment is not valid hex".into()))?;
    let tag = hex::decode(segments[1])
        .map_err(|_| EncryptionError::MalformedEnvelope("tag segment is not valid hex".into()))?;
    let ciphertext = hex::decode(segments[2]).map_err(|_| {
        EncryptionError::MalformedEnvelope("ciphertext segment is not valid hex".into())
    })?;

    if nonce_bytes.len() != NONCE_SIZE {
        return Err(EncryptionError::MalformedEnvelope(format!(
            "iv must be {NONCE_SIZE} bytes"
        )));
    }
    if tag.len() != TAG_SIZE {
        return Err(EncryptionError::MalformedEnvelope(format!(
            "auth tag must be {TAG_SIZE} bytes"
        )));
    }

    let nonce = Nonce::from_slice(&nonce_bytes);
    let mut sealed = ciphertext;
    sealed.extend_from_slice(&tag);

    let decrypted = cipher
        .decrypt(
            nonce,
            Payload {
                msg: &sealed,
                aad: ENVELOPE_AAD,
            },
        )
        .map_err(|e| EncryptionError::DecryptionFailed(e.to_string()))?;

    String::from_utf8(decrypted)
        .map_err(|e| EncryptionError::DecryptionFailed(format!("invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plain_text = r#"{"type":"bearer","token":"sk-secret"}"#;

        let envelope = encrypt(plain_text, KEY).unwrap();
        assert_eq!(envelope.split(':').count(), 3);

        let decrypted = decrypt(&envelope, KEY).unwrap();
        assert_eq!(plain_text, decrypted);
    }

    #[test]
    fn test_decrypt_with_wrong_key() {
        let other_key = "f1e1d1c1b1a191817161514131211101f0e0d0c0b0a090807060504030201000";
        let envelope = encrypt("secret", KEY).unwrap();

        assert!(matches!(
            decrypt(&envelope, other_key),
            Err(EncryptionError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_wrong_segment_count_fails_closed() {
        for envelope in ["", "aabb", "aa:bb", "aa:bb:cc:dd"] {
            assert!(matches!(
                decrypt(envelope, KEY),
                Err(EncryptionError::MalformedEnvelope(_))
            ));
        }
    }

    #[test]
    fn test_tampered_segments_fail_closed() {
        let envelope = encrypt("secret", KEY).unwrap();
        let segments: Vec<&str> = envelope.split(':').collect();

        // Tag from a different envelope.
        let other = encrypt("secret", KEY).unwrap();
        let other_tag = other.split(':').nth(1).unwrap();
        let swapped = format!("{}:{}:{}", segments[0], other_tag, segments[2]);
        assert!(decrypt(&swapped, KEY).is_err());

        // Truncated tag.
        let truncated = format!("{}:{}:{}", segments[0], &segments[1][..8], segments[2]);
        assert!(matches!(
            decrypt(&truncated, KEY),
            Err(EncryptionError::MalformedEnvelope(_))
        ));

        // Non-hex ciphertext.
        let garbage = format!("{}:{}:zz-not-hex", segments[0], segments[1]);
        assert!(matches!(
            decrypt(&garbage, KEY),
            Err(EncryptionError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(matches!(
            encrypt("test", "1234"),
            Err(EncryptionError::InvalidKey)
        ));
        assert!(matches!(
            decrypt("aa:bb:cc", "not-a-hex-string"),
            Err(EncryptionError::InvalidKey)
        ));
    }
}
