//! Client-side envelope encryption for the vault: key derivation from a master passphrase,
//! authenticated encryption of short item values, and a streaming cipher adapter for file
//! bodies.
//!
//! Keys never touch disk. A [`Key`] is held only for the lifetime of the command that needs it.

mod aead;
mod error;
mod kdf;
mod stream;

pub use aead::{decrypt, decrypt_string, encrypt, encrypt_string};
pub use error::CryptoError;
pub use kdf::Key;
pub use stream::{DecryptWriter, EncryptReader, IV_LEN};
