//! Streamed file upload/download, plus list/delete against the server's file metadata (the
//! local mirror is refreshed from `GetList` on demand rather than reconciled through the
//! version/conflict algebra — see [`SqliteStore::replace_files`]).
//!
//! Chunking and encryption both happen off the async runtime's reactor thread: the plaintext
//! source is an ordinary blocking [`std::io::Read`]/[`std::io::Write`] (a file, typically),
//! so the read/encrypt/chunk loop runs inside [`tokio::task::spawn_blocking`] and only the
//! already-framed bytes cross into async code.

use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use api::types::FileChunk;
use vault_crypto::{DecryptWriter, EncryptReader, Key};

use crate::error::ClientError;
use crate::local_store::SqliteStore;
use crate::rpc::RpcClient;

/// Each chunk carries at most this many bytes of (already-encrypted) payload, matching the
/// server's re-chunking size.
const CHUNK_SIZE: usize = 1024;
const UPLOAD_CHANNEL_DEPTH: usize = 16;

/// File upload/download/list/delete.
pub struct NotesUseCase {
	local: Arc<SqliteStore>,
	rpc: RpcClient,
}

impl NotesUseCase {
	/// Builds a usecase over the given local cache and RPC transport.
	pub fn new(local: Arc<SqliteStore>, rpc: RpcClient) -> Self {
		Self { local, rpc }
	}

	/// Encrypts `reader`'s bytes under `key` and streams them to the server as a new file at
	/// `bucket`/`name`, carrying `meta` on the first chunk.
	pub async fn upload_note<R>(
		&self, key: &Key, token: &str, bucket: &str, name: &str, meta: &str, reader: R,
	) -> Result<(), ClientError>
	where
		R: Read + Send + 'static,
	{
		let (tx, rx) = mpsc::channel::<FileChunk>(UPLOAD_CHANNEL_DEPTH);

		let key = key.clone();
		let bucket_owned = bucket.to_string();
		let name_owned = name.to_string();
		let meta_owned = meta.to_string();
		let feed = tokio::task::spawn_blocking(move || -> Result<(), ClientError> {
			let mut encrypted = EncryptReader::new(&key, reader);
			let mut buffer = [0u8; CHUNK_SIZE];
			let mut first = true;

			loop {
				let n = encrypted.read(&mut buffer).map_err(|e| ClientError::Transport(e.to_string()))?;
				if n == 0 {
					if first {
						let header_only = FileChunk {
							filename: name_owned.clone(),
							bucket: bucket_owned.clone(),
							meta: meta_owned.clone(),
							data: Bytes::new(),
						};
						let _ = tx.blocking_send(header_only);
					}
					break;
				}

				let mut chunk = FileChunk {
					filename: String::new(),
					bucket: String::new(),
					meta: String::new(),
					data: Bytes::copy_from_slice(&buffer[..n]),
				};
				if first {
					chunk.filename = name_owned.clone();
					chunk.bucket = bucket_owned.clone();
					chunk.meta = meta_owned.clone();
					first = false;
				}
				if tx.blocking_send(chunk).is_err() {
					break;
				}
			}
			Ok(())
		});

		let upload = self.rpc.upload(token, rx).await;
		feed.await.map_err(|e| ClientError::Transport(e.to_string()))??;
		let response = upload?;
		if response.success {
			Ok(())
		} else {
			Err(ClientError::Transport("server did not confirm the upload".to_string()))
		}
	}

	/// Streams `bucket`/`name` from the server, decrypts it under `key`, and writes the
	/// plaintext to `writer`.
	pub async fn download_note<W>(
		&self, key: &Key, token: &str, bucket: &str, name: &str, writer: W,
	) -> Result<(), ClientError>
	where
		W: Write + Send + 'static,
	{
		let mut chunks = self.rpc.download(token, bucket, name).await?;
		let key = key.clone();

		let (tx, rx) = std::sync::mpsc::channel::<Option<Bytes>>();
		let drain = tokio::task::spawn_blocking(move || -> Result<(), ClientError> {
			let mut decrypted = DecryptWriter::new(&key, writer);
			while let Ok(Some(data)) = rx.recv() {
				decrypted.write_all(&data).map_err(|e| ClientError::Transport(e.to_string()))?;
			}
			decrypted.flush().map_err(|e| ClientError::Transport(e.to_string()))
		});

		while let Some(item) = chunks.recv().await {
			let data = item?;
			if tx.send(Some(data)).is_err() {
				break;
			}
		}
		let _ = tx.send(None);

		drain.await.map_err(|e| ClientError::Transport(e.to_string()))?
	}

	/// Lists locally cached file metadata for a bucket.
	pub async fn get_notes(&self, bucket: &str) -> Result<Vec<api::types::FileInfo>, ClientError> {
		self.local.list_files(bucket).await
	}

	/// Refreshes the local mirror of a bucket's file list from the server.
	pub async fn refresh_notes(&self, token: &str, bucket: &str) -> Result<(), ClientError> {
		let response = self.rpc.list_files(token, bucket).await?;
		self.local.replace_files(bucket, response.files).await
	}

	/// Deletes on the server, then marks the local mirror row soft-deleted.
	pub async fn delete_note(&self, token: &str, bucket: &str, name: &str) -> Result<(), ClientError> {
		self.rpc.delete_file(token, bucket, name).await?;
		self.local.soft_delete_file(bucket, name).await
	}
}
