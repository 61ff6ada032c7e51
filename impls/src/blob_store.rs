use api::error::VaultError;
use api::store::{BlobStore, ByteStream};
use async_trait::async_trait;
use futures_util::stream::try_unfold;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// A filesystem-backed [`BlobStore`]. Objects live at `root/bucket/name`.
///
/// Writes go through a temp-file-then-rename sequence inside the destination bucket
/// directory so a concurrent reader never observes a partially written object; there is no
/// in-place mutation of an existing blob.
pub struct FsBlobStore {
	root: PathBuf,
}

impl FsBlobStore {
	/// Creates a store rooted at `root`, creating the directory if it does not already exist.
	pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
		let root = root.into();
		std::fs::create_dir_all(&root)?;
		Ok(Self { root })
	}

	fn bucket_dir(&self, bucket: &str) -> PathBuf {
		self.root.join(bucket)
	}

	fn object_path(&self, bucket: &str, name: &str) -> PathBuf {
		self.bucket_dir(bucket).join(name)
	}
}

#[async_trait]
impl BlobStore for FsBlobStore {
	async fn put(
		&self, bucket: &str, name: &str, mut body: Box<dyn Read + Send>,
	) -> Result<u64, VaultError> {
		let dir = self.bucket_dir(bucket);
		let dest = self.object_path(bucket, name);
		tokio::task::spawn_blocking(move || -> io::Result<u64> {
			std::fs::create_dir_all(&dir)?;
			let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
			let mut written: u64 = 0;
			let mut buf = [0u8; CHUNK_SIZE];
			loop {
				let n = body.read(&mut buf)?;
				if n == 0 {
					break;
				}
				tmp.write_all(&buf[..n])?;
				written += n as u64;
			}
			tmp.flush()?;
			tmp.persist(&dest).map_err(|e| e.error)?;
			Ok(written)
		})
		.await
		.map_err(|e| VaultError::InternalServerError(e.to_string()))?
		.map_err(|e| VaultError::InternalServerError(e.to_string()))
	}

	async fn get(&self, bucket: &str, name: &str) -> Result<ByteStream, VaultError> {
		let path = self.object_path(bucket, name);
		let file = tokio::fs::File::open(&path).await.map_err(|e| {
			if e.kind() == io::ErrorKind::NotFound {
				VaultError::NoSuchItemError(format!("{bucket}/{name}"))
			} else {
				VaultError::InternalServerError(e.to_string())
			}
		})?;

		let stream = try_unfold(file, |mut file| async move {
			let mut buf = vec![0u8; CHUNK_SIZE];
			let n = file.read(&mut buf).await?;
			if n == 0 {
				Ok(None)
			} else {
				buf.truncate(n);
				Ok(Some((buf, file)))
			}
		});
		Ok(Box::pin(stream))
	}

	async fn delete(&self, bucket: &str, name: &str) -> Result<(), VaultError> {
		let path = self.object_path(bucket, name);
		match tokio::fs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(VaultError::InternalServerError(e.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures_util::StreamExt;

	async fn collect(mut stream: ByteStream) -> Vec<u8> {
		let mut out = Vec::new();
		while let Some(chunk) = stream.next().await {
			out.extend_from_slice(&chunk.unwrap());
		}
		out
	}

	#[tokio::test]
	async fn put_then_get_round_trips_bytes() {
		let dir = tempfile::tempdir().unwrap();
		let store = FsBlobStore::new(dir.path()).unwrap();
		let body = Box::new(io::Cursor::new(b"hello vault".to_vec()));
		let written = store.put("notes", "f1", body).await.unwrap();
		assert_eq!(written, 11);

		let got = collect(store.get("notes", "f1").await.unwrap()).await;
		assert_eq!(got, b"hello vault");
	}

	#[tokio::test]
	async fn get_missing_object_is_no_such_item() {
		let dir = tempfile::tempdir().unwrap();
		let store = FsBlobStore::new(dir.path()).unwrap();
		assert!(matches!(store.get("notes", "missing").await, Err(VaultError::NoSuchItemError(_))));
	}

	#[tokio::test]
	async fn delete_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let store = FsBlobStore::new(dir.path()).unwrap();
		store.delete("notes", "never-existed").await.unwrap();

		let body = Box::new(io::Cursor::new(b"x".to_vec()));
		store.put("notes", "f1", body).await.unwrap();
		store.delete("notes", "f1").await.unwrap();
		store.delete("notes", "f1").await.unwrap();
		assert!(matches!(store.get("notes", "f1").await, Err(VaultError::NoSuchItemError(_))));
	}

	#[tokio::test]
	async fn put_overwrites_existing_object_atomically() {
		let dir = tempfile::tempdir().unwrap();
		let store = FsBlobStore::new(dir.path()).unwrap();
		store.put("notes", "f1", Box::new(io::Cursor::new(b"first".to_vec()))).await.unwrap();
		store.put("notes", "f1", Box::new(io::Cursor::new(b"second".to_vec()))).await.unwrap();
		let got = collect(store.get("notes", "f1").await.unwrap()).await;
		assert_eq!(got, b"second");
	}
}
