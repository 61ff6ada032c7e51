use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::CryptoError;
use crate::kdf::Key;

const NONCE_LEN: usize = 12;

/// Seals `plaintext` under `key` with a fresh random nonce, returning `nonce || sealed`.
pub fn encrypt(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
	let cipher = Aes256Gcm::new_from_slice(key.bytes()).map_err(|_| CryptoError::Aead)?;
	let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
	let sealed = cipher.encrypt(&nonce, plaintext).map_err(|_| CryptoError::Aead)?;

	let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
	out.extend_from_slice(&nonce);
	out.extend_from_slice(&sealed);
	Ok(out)
}

/// Opens a `nonce || sealed` blob produced by [`encrypt`].
pub fn decrypt(key: &Key, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
	if ciphertext.len() < NONCE_LEN {
		return Err(CryptoError::ShortCiphertext);
	}
	let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_LEN);
	let nonce = Nonce::from_slice(nonce_bytes);

	let cipher = Aes256Gcm::new_from_slice(key.bytes()).map_err(|_| CryptoError::Aead)?;
	cipher.decrypt(nonce, sealed).map_err(|_| CryptoError::Aead)
}

/// Encrypts a string value, returning `base64(nonce || sealed)` for storage in a string field.
pub fn encrypt_string(key: &Key, plaintext: &str) -> Result<String, CryptoError> {
	let sealed = encrypt(key, plaintext.as_bytes())?;
	Ok(BASE64.encode(sealed))
}

/// Decrypts a `base64(nonce || sealed)` string field back to plaintext.
pub fn decrypt_string(key: &Key, ciphertext: &str) -> Result<String, CryptoError> {
	let raw = BASE64.decode(ciphertext)?;
	let plaintext = decrypt(key, &raw)?;
	String::from_utf8(plaintext).map_err(|_| CryptoError::Aead)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips() {
		let key = Key::derive("correct horse battery staple");
		let sealed = encrypt_string(&key, "hunter2").unwrap();
		assert_eq!(decrypt_string(&key, &sealed).unwrap(), "hunter2");
	}

	#[test]
	fn short_ciphertext_rejected() {
		let key = Key::derive("k");
		let err = decrypt(&key, b"short").unwrap_err();
		assert!(matches!(err, CryptoError::ShortCiphertext));
	}

	#[test]
	fn tampering_is_detected() {
		let key = Key::derive("k");
		let mut sealed = encrypt(&key, b"hello world").unwrap();
		let last = sealed.len() - 1;
		sealed[last] ^= 0xff;
		assert!(matches!(decrypt(&key, &sealed), Err(CryptoError::Aead)));
	}

	#[test]
	fn wrong_key_fails() {
		let key_a = Key::derive("a");
		let key_b = Key::derive("b");
		let sealed = encrypt(&key_a, b"secret").unwrap();
		assert!(matches!(decrypt(&key_b, &sealed), Err(CryptoError::Aead)));
	}
}
