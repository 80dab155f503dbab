//! Key-tag sidecar.
//!
//! A small file adjacent to the page file holding a keyed MAC of a fixed
//! salt. The first opener creates it; every later opener verifies it.
//! A mismatch puts the store into a key-mismatch state in which all
//! reads and writes fail until the database is reopened with the right
//! password.

use crate::crypto::derive::DerivedKey;
use crate::error::CoreResult;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fs;
use std::path::Path;

/// Fixed salt the key tag authenticates.
pub const TAG_SALT: &[u8] = b"blazedb-key-tag-v1";

/// Size of the tag in bytes.
pub const TAG_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Whether the opener's key matches the file's binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Tag created or verified; operations proceed.
    Verified,
    /// Tag present but built with a different key; every operation fails.
    Mismatch,
}

/// Computes the tag for `key`.
#[must_use]
pub fn compute_tag(key: &DerivedKey) -> [u8; TAG_SIZE] {
    let mut hmac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .expect("HMAC accepts any key length");
    hmac.update(TAG_SALT);
    hmac.finalize().into_bytes().into()
}

/// Creates or verifies the key tag at `path`.
///
/// Absent file: the tag is written (first opener) and the state is
/// `Verified`. Present file: the stored tag is compared against the
/// one computed from `key`.
///
/// # Errors
///
/// Fails on I/O error.
pub fn check_or_create(path: &Path, key: &DerivedKey) -> CoreResult<KeyState> {
    let expected = compute_tag(key);

    match fs::read(path) {
        Ok(stored) => {
            // constant-time comparison via the MAC verifier
            let mut hmac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
                .expect("HMAC accepts any key length");
            hmac.update(TAG_SALT);
            if hmac.verify_slice(&stored).is_ok() {
                Ok(KeyState::Verified)
            } else {
                Ok(KeyState::Mismatch)
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            fs::write(path, expected)?;
            Ok(KeyState::Verified)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derive::derive_key;
    use tempfile::tempdir;

    #[test]
    fn first_opener_creates_the_tag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.keytag");
        let key = derive_key("first opener key").unwrap();

        assert!(!path.exists());
        assert_eq!(check_or_create(&path, &key).unwrap(), KeyState::Verified);
        assert!(path.exists());
    }

    #[test]
    fn same_key_verifies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.keytag");
        let key = derive_key("stable password").unwrap();

        check_or_create(&path, &key).unwrap();
        let again = derive_key("stable password").unwrap();
        assert_eq!(check_or_create(&path, &again).unwrap(), KeyState::Verified);
    }

    #[test]
    fn different_key_mismatches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.keytag");

        let original = derive_key("original password").unwrap();
        check_or_create(&path, &original).unwrap();

        let wrong = derive_key("a wrong password").unwrap();
        assert_eq!(check_or_create(&path, &wrong).unwrap(), KeyState::Mismatch);
    }

    #[test]
    fn tampered_tag_mismatches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.keytag");
        let key = derive_key("tamper target").unwrap();

        check_or_create(&path, &key).unwrap();
        let mut tag = fs::read(&path).unwrap();
        tag[0] ^= 0xFF;
        fs::write(&path, tag).unwrap();

        assert_eq!(check_or_create(&path, &key).unwrap(), KeyState::Mismatch);
    }
}
