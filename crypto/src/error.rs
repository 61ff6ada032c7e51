use thiserror::Error;

/// Failures from key derivation, AEAD sealing/opening, or the streaming cipher adapters.
#[derive(Debug, Error)]
pub enum CryptoError {
	/// Ciphertext shorter than the nonce/IV prefix it's supposed to carry.
	#[error("ciphertext too short")]
	ShortCiphertext,

	/// AEAD seal or open failed (wrong key, tampered data, or bad nonce).
	#[error("authenticated encryption operation failed")]
	Aead,

	/// Ciphertext string wasn't valid base64.
	#[error("invalid base64 ciphertext: {0}")]
	Encoding(#[from] base64::DecodeError),

	/// Underlying IO error while streaming a file body through a cipher adapter.
	#[error("io error during streaming encryption: {0}")]
	Io(#[from] std::io::Error),
}
