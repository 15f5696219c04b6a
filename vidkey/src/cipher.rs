//! Decryption of the authenticated envelope returned by the video url endpoint.

use aes_gcm::{
    Aes256Gcm, AesGcm, Key, Nonce,
    aead::{Aead, KeyInit, consts::U16},
    aes::Aes256,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Length of the AES-256 key.
pub const KEY_LEN: usize = 32;
/// Length of the GCM authentication tag appended to the ciphertext.
pub const TAG_LEN: usize = 16;

type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Reasons an envelope could not be opened.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unsupported IV size: expected 12 or 16 bytes, got {0} bytes")]
    InvalidIvSize(usize),

    #[error("ciphertext too short: {0} bytes cannot hold a 16 byte tag")]
    TooShort(usize),

    /// Tag mismatch. No plaintext is released.
    #[error("authentication tag mismatch")]
    Authentication,

    #[error("plaintext is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("plaintext is not json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encrypted body of the video url endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Base64 ciphertext with the tag in its trailing 16 bytes.
    #[serde(rename = "data")]
    pub ciphertext: String,
    /// Base64 initialization vector.
    pub iv: String,
}

impl EncryptedEnvelope {
    /// Pick the envelope out of an upstream body, if it carries one.
    pub fn from_body(body: &Value) -> Option<Self> {
        Some(Self {
            ciphertext: body.get("data")?.as_str()?.to_owned(),
            iv: body.get("iv")?.as_str()?.to_owned(),
        })
    }
}

/// Opens upstream envelopes.
///
/// Callers only see this trait so the key source can change without touching them.
pub trait PayloadCipher: Send + Sync {
    fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Value, CipherError>;
}

/// AES-256-GCM under a single key derived from a fixed passphrase.
#[derive(Clone)]
pub struct StaticKeyCipher {
    key: [u8; KEY_LEN],
}

impl StaticKeyCipher {
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self {
            key: derive_key(passphrase),
        }
    }

    /// Encrypt `document` the same way upstream does.
    pub fn seal(&self, document: &Value, iv: &[u8]) -> Result<EncryptedEnvelope, CipherError> {
        let plaintext = serde_json::to_vec(document)?;
        let ciphertext = match iv.len() {
            12 => Aes256Gcm::new(&Key::<Aes256Gcm>::from(self.key))
                .encrypt(Nonce::from_slice(iv), plaintext.as_ref()),
            16 => Aes256Gcm16::new(&Key::<Aes256Gcm16>::from(self.key))
                .encrypt(Nonce::<U16>::from_slice(iv), plaintext.as_ref()),
            x => return Err(CipherError::InvalidIvSize(x)),
        }
        .map_err(|_| CipherError::Authentication)?;

        Ok(EncryptedEnvelope {
            ciphertext: encode_base64(ciphertext),
            iv: encode_base64(iv),
        })
    }
}

impl std::fmt::Debug for StaticKeyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeyCipher").finish_non_exhaustive()
    }
}

impl PayloadCipher for StaticKeyCipher {
    fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Value, CipherError> {
        let ciphertext = decode_base64(&envelope.ciphertext)?;
        let iv = decode_base64(&envelope.iv)?;

        if ciphertext.len() < TAG_LEN {
            return Err(CipherError::TooShort(ciphertext.len()));
        }

        // aes-gcm expects `ciphertext || tag`, which is the upstream layout
        let plaintext = match iv.len() {
            12 => Aes256Gcm::new(&Key::<Aes256Gcm>::from(self.key))
                .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref()),
            16 => Aes256Gcm16::new(&Key::<Aes256Gcm16>::from(self.key))
                .decrypt(Nonce::<U16>::from_slice(&iv), ciphertext.as_ref()),
            x => return Err(CipherError::InvalidIvSize(x)),
        }
        .map_err(|_| CipherError::Authentication)?;

        Ok(serde_json::from_str(&String::from_utf8(plaintext)?)?)
    }
}

/// Copy the passphrase bytes into a zeroed 32 byte buffer, truncating longer input.
pub fn derive_key(passphrase: &str) -> [u8; KEY_LEN] {
    let bytes = passphrase.as_bytes();
    let len = bytes.len().min(KEY_LEN);
    let mut key = [0u8; KEY_LEN];
    key[..len].copy_from_slice(&bytes[..len]);
    key
}

fn decode_base64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(input)
}

fn encode_base64<T: AsRef<[u8]>>(input: T) -> String {
    base64::engine::general_purpose::STANDARD.encode(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PASSPHRASE: &str = "unit-test-passphrase";
    const IV: [u8; 12] = [7; 12];

    fn document() -> Value {
        json!({
            "success": true,
            "data": {
                "url": "https://cdn.example.com/v/1/master.mpd",
                "signedUrl": "?sig=abc&exp=1",
                "isCmaf": false
            }
        })
    }

    #[test]
    fn test_derive_key_pads_with_zeros() {
        let key = derive_key("abc");
        assert_eq!(&key[..3], b"abc");
        assert!(key[3..].iter().all(|&x| x == 0));
    }

    #[test]
    fn test_derive_key_truncates() {
        let long = "x".repeat(40);
        assert_eq!(derive_key(&long), [b'x'; KEY_LEN]);
    }

    #[test]
    fn test_round_trip() {
        let cipher = StaticKeyCipher::from_passphrase(PASSPHRASE);
        let envelope = cipher.seal(&document(), &IV).unwrap();
        assert_eq!(cipher.decrypt(&envelope).unwrap(), document());
    }

    #[test]
    fn test_round_trip_16_byte_iv() {
        let cipher = StaticKeyCipher::from_passphrase(PASSPHRASE);
        let envelope = cipher.seal(&document(), &[3; 16]).unwrap();
        assert_eq!(cipher.decrypt(&envelope).unwrap(), document());
    }

    #[test]
    fn test_any_flipped_byte_fails_closed() {
        let cipher = StaticKeyCipher::from_passphrase(PASSPHRASE);
        let envelope = cipher.seal(&document(), &IV).unwrap();
        let raw = decode_base64(&envelope.ciphertext).unwrap();

        // covers every ciphertext byte and every tag byte
        for i in 0..raw.len() {
            let mut tampered = raw.clone();
            tampered[i] ^= 0x01;
            let envelope = EncryptedEnvelope {
                ciphertext: encode_base64(&tampered),
                iv: envelope.iv.clone(),
            };
            assert!(matches!(
                cipher.decrypt(&envelope),
                Err(CipherError::Authentication)
            ));
        }
    }

    #[test]
    fn test_wrong_passphrase() {
        let envelope = StaticKeyCipher::from_passphrase(PASSPHRASE)
            .seal(&document(), &IV)
            .unwrap();
        let result = StaticKeyCipher::from_passphrase("other").decrypt(&envelope);
        assert!(matches!(result, Err(CipherError::Authentication)));
    }

    #[test]
    fn test_bad_base64() {
        let cipher = StaticKeyCipher::from_passphrase(PASSPHRASE);
        let envelope = EncryptedEnvelope {
            ciphertext: "***".to_owned(),
            iv: encode_base64(IV),
        };
        assert!(matches!(
            cipher.decrypt(&envelope),
            Err(CipherError::Base64(_))
        ));
    }

    #[test]
    fn test_short_ciphertext() {
        let cipher = StaticKeyCipher::from_passphrase(PASSPHRASE);
        let envelope = EncryptedEnvelope {
            ciphertext: encode_base64([0u8; 4]),
            iv: encode_base64(IV),
        };
        assert!(matches!(
            cipher.decrypt(&envelope),
            Err(CipherError::TooShort(4))
        ));
    }

    #[test]
    fn test_unsupported_iv() {
        let cipher = StaticKeyCipher::from_passphrase(PASSPHRASE);
        let envelope = EncryptedEnvelope {
            ciphertext: encode_base64([0u8; 32]),
            iv: encode_base64([0u8; 5]),
        };
        assert!(matches!(
            cipher.decrypt(&envelope),
            Err(CipherError::InvalidIvSize(5))
        ));
    }

    #[test]
    fn test_envelope_from_body() {
        let body = json!({ "data": "YWJj", "iv": "ZGVm" });
        let envelope = EncryptedEnvelope::from_body(&body).unwrap();
        assert_eq!(envelope.ciphertext, "YWJj");
        assert!(EncryptedEnvelope::from_body(&json!({ "data": "x" })).is_none());
    }
}
