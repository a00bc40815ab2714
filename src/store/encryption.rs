use crate::model::EngineError;
use aes::Aes256;
use base64::Engine as _;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use rand::RngCore;
use sha2::{Digest, Sha256};

type Aes256Ctr = Ctr128BE<Aes256>;

const IV_LEN: usize = 16;

/// Symmetric encryption for stored configs.
///
/// Wire format: `base64(iv || ciphertext)` under AES-256-CTR with a random
/// 16-byte IV. The configured salt is appended to the plaintext before
/// encryption and verified after decryption; a salt mismatch means the
/// ciphertext was not produced with this key material and is treated as a
/// decryption failure.
#[derive(Clone)]
pub struct DataEncryption {
    key: [u8; 32],
    salt: String,
}

impl DataEncryption {
    /// Key and salt must both be non-empty. There is no sane default for
    /// either, so absence is a hard construction error surfaced at startup.
    pub fn new(key: &str, salt: &str) -> Result<Self, EngineError> {
        if key.is_empty() {
            return Err(EngineError::encryption("Encryption key must not be empty"));
        }
        if salt.is_empty() {
            return Err(EngineError::encryption("Encryption salt must not be empty"));
        }

        Ok(Self {
            key: Sha256::digest(key.as_bytes()).into(),
            salt: salt.to_string(),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, EngineError> {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut data = format!("{}{}", plaintext, self.salt).into_bytes();
        let mut cipher = Aes256Ctr::new(&self.key.into(), &iv.into());
        cipher.apply_keystream(&mut data);

        let mut payload = Vec::with_capacity(IV_LEN + data.len());
        payload.extend_from_slice(&iv);
        payload.extend_from_slice(&data);

        Ok(base64::engine::general_purpose::STANDARD.encode(payload))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, EngineError> {
        let payload = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| EngineError::encryption("Stored value is not valid base64"))?;

        if payload.len() < IV_LEN {
            return Err(EngineError::encryption("Stored value is too short"));
        }

        let (iv, ciphertext) = payload.split_at(IV_LEN);
        let mut iv_bytes = [0u8; IV_LEN];
        iv_bytes.copy_from_slice(iv);

        let mut data = ciphertext.to_vec();
        let mut cipher = Aes256Ctr::new(&self.key.into(), &iv_bytes.into());
        cipher.apply_keystream(&mut data);

        let decrypted = String::from_utf8(data)
            .map_err(|_| EngineError::encryption("Decrypted value is not valid UTF-8"))?;

        let stripped = decrypted
            .strip_suffix(&self.salt)
            .ok_or_else(|| EngineError::encryption("Decrypted value failed salt verification"))?;

        Ok(stripped.to_string())
    }
}

impl std::fmt::Debug for DataEncryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataEncryption(<key material>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryption() -> DataEncryption {
        DataEncryption::new("test-key", "test-salt").unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_round_trips_exactly() {
        let enc = encryption();
        for plaintext in ["x", "hello world", "{\"configs\":[]}", "unicode: ʦ₪"] {
            let ciphertext = enc.encrypt(plaintext).unwrap();
            assert_ne!(ciphertext, plaintext);
            assert_eq!(enc.decrypt(&ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_each_encryption_uses_a_fresh_iv() {
        let enc = encryption();
        let a = enc.encrypt("same input").unwrap();
        let b = enc.encrypt("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_salt_verification() {
        let ciphertext = encryption().encrypt("secret").unwrap();
        let other = DataEncryption::new("different-key", "test-salt").unwrap();
        assert!(other.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn test_garbage_input_is_an_error_not_a_panic() {
        let enc = encryption();
        assert!(enc.decrypt("not base64 !!!").is_err());
        assert!(enc.decrypt("c2hvcnQ=").is_err());
    }

    #[test]
    fn test_empty_key_or_salt_is_refused() {
        assert!(DataEncryption::new("", "salt").is_err());
        assert!(DataEncryption::new("key", "").is_err());
    }
}
