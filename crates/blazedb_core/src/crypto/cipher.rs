//! Optional AES-256-GCM payload encryption.

use crate::crypto::derive::DerivedKey;
use crate::error::{CoreError, CoreResult};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

/// GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Length-prefix bytes in the sealed envelope.
const LEN_PREFIX: usize = 4;

/// Encrypts page payloads before framing and decrypts them after.
///
/// The sealed envelope is
/// `len (u32 LE) || nonce (12) || ciphertext || tag (16)` where `len`
/// counts everything after the prefix. The explicit length makes the
/// page store's trailing-zero trim reversible: re-padding with zeros and
/// slicing `len` bytes recovers the exact ciphertext.
pub struct PayloadCipher {
    cipher: Aes256Gcm,
}

impl PayloadCipher {
    /// Creates a cipher from the derived key.
    #[must_use]
    pub fn new(key: &DerivedKey) -> Self {
        // infallible: a DerivedKey is always exactly the AES-256 key size
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Seals `plaintext` into the length-prefixed envelope.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::Crypto`] on cipher failure.
    pub fn seal(&self, plaintext: &[u8]) -> CoreResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CoreError::crypto("payload encryption failed"))?;

        let body_len = NONCE_SIZE + ciphertext.len();
        let mut sealed = Vec::with_capacity(LEN_PREFIX + body_len);
        sealed.extend_from_slice(&(body_len as u32).to_le_bytes());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend(ciphertext);
        Ok(sealed)
    }

    /// Opens a sealed envelope back into plaintext.
    ///
    /// Accepts trailing padding after the declared length.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::Crypto`] on truncated envelopes, wrong
    /// keys, or tampered ciphertext.
    pub fn open(&self, sealed: &[u8]) -> CoreResult<Vec<u8>> {
        if sealed.len() < LEN_PREFIX {
            return Err(CoreError::crypto("sealed payload shorter than its prefix"));
        }
        let body_len =
            u32::from_le_bytes([sealed[0], sealed[1], sealed[2], sealed[3]]) as usize;
        if body_len < NONCE_SIZE + TAG_SIZE {
            return Err(CoreError::crypto("sealed payload too short"));
        }
        let body = sealed
            .get(LEN_PREFIX..LEN_PREFIX + body_len)
            .ok_or_else(|| CoreError::crypto("sealed payload truncated"))?;

        let nonce = Nonce::from_slice(&body[..NONCE_SIZE]);
        self.cipher
            .decrypt(nonce, &body[NONCE_SIZE..])
            .map_err(|_| CoreError::crypto("payload decryption failed"))
    }
}

impl std::fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCipher")
            .field("cipher", &"Aes256Gcm")
            .finish()
    }
}
