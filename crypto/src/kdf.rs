use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A 256-bit symmetric key derived from the user's master passphrase.
///
/// Lives only in process memory for the duration of a command; never persisted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; 32]);

impl Key {
	pub(crate) fn bytes(&self) -> &[u8; 32] {
		&self.0
	}

	/// Derives the item-encryption key from a master passphrase.
	///
	/// `derive_key(m) == derive_key(m)` for any `m`; distinct passphrases yield distinct keys
	/// with overwhelming probability. Plain SHA-256 per the design notes; a production system
	/// should prefer a password-based KDF (Argon2/scrypt) here instead.
	pub fn derive(master_passphrase: &str) -> Self {
		let mut hasher = Sha256::new();
		hasher.update(master_passphrase.as_bytes());
		let digest = hasher.finalize();
		Key(digest.into())
	}
}

impl std::fmt::Debug for Key {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("Key(..)")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn derive_is_deterministic() {
		let a = Key::derive("hunter2");
		let b = Key::derive("hunter2");
		assert_eq!(a.bytes(), b.bytes());
	}

	#[test]
	fn distinct_passphrases_diverge() {
		let a = Key::derive("hunter2");
		let b = Key::derive("hunter3");
		assert_ne!(a.bytes(), b.bytes());
	}
}
