//! The local agent's error type, covering the local cache, the RPC transport, and the crypto
//! layer in one enum so usecase code has a single `Result` to thread through.

use thiserror::Error;

/// Failures from the local agent: its SQLite cache, the RPC transport, or the crypto layer.
#[derive(Debug, Error)]
pub enum ClientError {
	/// A row was expected locally but did not exist.
	#[error("no local row named {0:?}")]
	NotFound(String),

	/// `create`/`create_many` was called against a name that already has a non-deleted row.
	#[error("local row {0:?} already exists")]
	AlreadyExists(String),

	/// No session is stored, or the stored session lacks a field the caller needs.
	#[error("no active session")]
	NoSession,

	/// The master passphrase the user entered does not match the stored hash.
	#[error("master passphrase did not match")]
	WrongMasterPassphrase,

	/// The local SQLite cache failed.
	#[error("local store error: {0}")]
	Sqlite(#[from] rusqlite::Error),

	/// Key derivation, AEAD, or the streaming cipher adapters failed.
	#[error("crypto error: {0}")]
	Crypto(#[from] vault_crypto::CryptoError),

	/// The server rejected the request or returned a non-success status.
	#[error("server error: {0}")]
	Server(#[from] api::error::VaultError),

	/// Transport-level failure talking to the server (connect, read, write).
	#[error("transport error: {0}")]
	Transport(String),

	/// The server's response body could not be decoded as the expected message type.
	#[error("malformed response: {0}")]
	Decode(String),
}
