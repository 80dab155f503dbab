//! Password-to-key derivation.

use crate::error::{CoreError, CoreResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Derived key size in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// PBKDF2 iteration count.
pub const KDF_ITERATIONS: u32 = 10_000;

/// Process-wide derivation salt.
pub const KDF_SALT: &[u8] = b"AshPileSalt";

/// Minimum accepted password length in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

type HmacSha256 = Hmac<Sha256>;

/// A key derived from a password.
///
/// Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the key bytes.
    ///
    /// Never log or persist the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derives a key from `password`.
///
/// PBKDF2-HMAC-SHA256 with [`KDF_ITERATIONS`] iterations over
/// [`KDF_SALT`], producing [`KEY_SIZE`] bytes. Passwords shorter than
/// [`MIN_PASSWORD_LEN`] characters are rejected before any file is
/// touched.
///
/// # Errors
///
/// Fails with [`CoreError::PasswordTooWeak`] for short passwords.
pub fn derive_key(password: &str) -> CoreResult<DerivedKey> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::PasswordTooWeak {
            min: MIN_PASSWORD_LEN,
        });
    }

    Ok(DerivedKey {
        bytes: pbkdf2_hmac_sha256(password.as_bytes(), KDF_SALT, KDF_ITERATIONS),
    })
}

/// PBKDF2 (RFC 8018) for a single SHA-256-sized output block.
///
/// One block suffices because the output length equals the HMAC output
/// length: F(P, S, c, 1) = U1 xor U2 xor ... xor Uc.
fn pbkdf2_hmac_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; KEY_SIZE] {
    let mac = |data: &[u8]| -> [u8; KEY_SIZE] {
        // HMAC accepts keys of any length
        let mut hmac = <HmacSha256 as Mac>::new_from_slice(password)
            .expect("HMAC accepts any key length");
        hmac.update(data);
        hmac.finalize().into_bytes().into()
    };

    let mut salted = Vec::with_capacity(salt.len() + 4);
    salted.extend_from_slice(salt);
    salted.extend_from_slice(&1u32.to_be_bytes());

    let mut u = mac(&salted);
    let mut output = u;
    for _ in 1..iterations {
        u = mac(&u);
        for (out, byte) in output.iter_mut().zip(u.iter()) {
            *out ^= byte;
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_passwords_are_rejected() {
        assert!(matches!(
            derive_key("123"),
            Err(CoreError::PasswordTooWeak { min: 8 })
        ));
        assert!(matches!(
            derive_key("seven77"),
            Err(CoreError::PasswordTooWeak { .. })
        ));
        assert!(derive_key("eight888").is_ok());
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_key("correct horse battery").unwrap();
        let b = derive_key("correct horse battery").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_passwords_differ() {
        let a = derive_key("password-one").unwrap();
        let b = derive_key("password-two").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn pbkdf2_rfc6070_style_vector() {
        // PBKDF2-HMAC-SHA256(P="password", S="salt", c=1, dkLen=32)
        // from the published SHA-256 test vectors
        let dk = pbkdf2_hmac_sha256(b"password", b"salt", 1);
        let expected: [u8; 32] = [
            0x12, 0x0f, 0xb6, 0xcf, 0xfc, 0xf8, 0xb3, 0x2c, 0x43, 0xe7, 0x22, 0x52, 0x56, 0xc4,
            0xf8, 0x37, 0xa8, 0x65, 0x48, 0xc9, 0x2c, 0xcc, 0x35, 0x48, 0x08, 0x05, 0x98, 0x7c,
            0xb7, 0x0b, 0xe1, 0x7b,
        ];
        assert_eq!(dk, expected);
    }

    #[test]
    fn pbkdf2_two_iterations_vector() {
        let dk = pbkdf2_hmac_sha256(b"password", b"salt", 2);
        let expected: [u8; 32] = [
            0xae, 0x4d, 0x0c, 0x95, 0xaf, 0x6b, 0x46, 0xd3, 0x2d, 0x0a, 0xdf, 0xf9, 0x28, 0xf0,
            0x6d, 0xd0, 0x2a, 0x30, 0x3f, 0x8e, 0xf3, 0xc2, 0x51, 0xdf, 0xd6, 0xe2, 0xd8, 0x5a,
            0x95, 0x47, 0x4c, 0x43,
        ];
        assert_eq!(dk, expected);
    }

    #[test]
    fn debug_redacts_bytes() {
        let key = derive_key("long enough password").unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
    }
}
