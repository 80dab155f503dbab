//! Key derivation and optional payload encryption.
//!
//! Opening a database derives a 256-bit key from the password with
//! PBKDF2-HMAC-SHA256 and binds the page file to that key through the
//! key-tag sidecar (see [`keytag`]). Payload encryption is an optional
//! layer on top: when enabled it runs between document serialization and
//! page framing, so the framing header stays plaintext and `stats` keeps
//! working on encrypted stores.

mod cipher;
mod derive;
pub mod keytag;

pub use cipher::PayloadCipher;
pub use derive::{derive_key, DerivedKey, KDF_ITERATIONS, KDF_SALT, KEY_SIZE, MIN_PASSWORD_LEN};
pub use keytag::KeyState;
