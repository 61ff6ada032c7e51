use std::path::Path;
use std::sync::Arc;

use api::error::VaultError;
use api::store::LocalItemStore;
use api::types::{CardItem, FileInfo, PasswordItem, UploadStatus};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::error::ClientError;
use crate::session::ClientSession;

const LOGIN_KEY: &str = "login";
const MASTER_PASS_KEY: &str = "master_password";
const AUTH_TOKEN_KEY: &str = "auth_token";

fn sqlite_err(e: rusqlite::Error) -> VaultError {
	VaultError::InternalServerError(e.to_string())
}

/// The local agent's SQLite-backed cache: item rows staged for offline reads and pre-sync
/// comparison, plus a mirror of the server's file metadata.
///
/// A single connection behind a [`tokio::sync::Mutex`] is enough here, the same way
/// `PostgresStore` serializes through one connection: the local cache has exactly one writer
/// (this process) and no row-level contention to speak of.
pub struct SqliteStore {
	conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
	/// Opens (creating if necessary) the SQLite file at `path` and applies pending migrations.
	pub async fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
		let conn = Connection::open(path)?;
		crate::migrations::run(&conn)?;
		Ok(Self { conn: Arc::new(Mutex::new(conn)) })
	}

	/// Opens an in-memory store, used by tests and by callers that want a throwaway cache.
	pub async fn open_in_memory() -> Result<Self, ClientError> {
		let conn = Connection::open_in_memory()?;
		crate::migrations::run(&conn)?;
		Ok(Self { conn: Arc::new(Mutex::new(conn)) })
	}
}

#[async_trait]
impl LocalItemStore<PasswordItem> for SqliteStore {
	async fn list(&self) -> Result<Vec<PasswordItem>, VaultError> {
		let guard = self.conn.lock().await;
		let mut stmt = guard
			.prepare("SELECT name, meta, version, is_deleted, encrypted_pass FROM passwords")
			.map_err(sqlite_err)?;
		let rows = stmt
			.query_map([], |r| {
				Ok(PasswordItem {
					name: r.get(0)?,
					meta: r.get(1)?,
					version: r.get(2)?,
					deleted: r.get::<_, i64>(3)? != 0,
					value: r.get(4)?,
				})
			})
			.map_err(sqlite_err)?
			.collect::<Result<Vec<_>, _>>()
			.map_err(sqlite_err)?;
		Ok(rows)
	}

	async fn get_by_name(&self, name: &str) -> Result<PasswordItem, VaultError> {
		let guard = self.conn.lock().await;
		guard
			.query_row(
				"SELECT name, meta, version, is_deleted, encrypted_pass FROM passwords \
				 WHERE name = ?1 AND is_deleted = 0",
				params![name],
				|r| {
					Ok(PasswordItem {
						name: r.get(0)?,
						meta: r.get(1)?,
						version: r.get(2)?,
						deleted: r.get::<_, i64>(3)? != 0,
						value: r.get(4)?,
					})
				},
			)
			.optional()
			.map_err(sqlite_err)?
			.ok_or_else(|| VaultError::NoSuchItemError(name.to_string()))
	}

	async fn exists(&self, name: &str) -> Result<bool, VaultError> {
		let guard = self.conn.lock().await;
		let found: Option<i64> = guard
			.query_row(
				"SELECT 1 FROM passwords WHERE name = ?1 AND is_deleted = 0",
				params![name],
				|r| r.get(0),
			)
			.optional()
			.map_err(sqlite_err)?;
		Ok(found.is_some())
	}

	async fn create(&self, item: PasswordItem) -> Result<(), VaultError> {
		if LocalItemStore::<PasswordItem>::exists(self, &item.name).await? {
			return Err(VaultError::AlreadyExistsError(item.name));
		}
		let guard = self.conn.lock().await;
		guard
			.execute(
				"INSERT INTO passwords (name, encrypted_pass, meta, version, is_deleted) \
				 VALUES (?1, ?2, ?3, ?4, ?5) \
				 ON CONFLICT(name) DO UPDATE SET \
				 encrypted_pass = excluded.encrypted_pass, meta = excluded.meta, \
				 version = excluded.version, is_deleted = excluded.is_deleted",
				params![item.name, item.value, item.meta, item.version, item.deleted as i64],
			)
			.map_err(sqlite_err)?;
		Ok(())
	}

	async fn create_many(&self, items: Vec<PasswordItem>) -> Result<(), VaultError> {
		let mut guard = self.conn.lock().await;
		let txn = guard.transaction().map_err(sqlite_err)?;
		for item in items {
			txn.execute(
				"INSERT INTO passwords (name, encrypted_pass, meta, version, is_deleted) \
				 VALUES (?1, ?2, ?3, ?4, ?5) \
				 ON CONFLICT(name) DO UPDATE SET \
				 encrypted_pass = excluded.encrypted_pass, meta = excluded.meta, \
				 version = excluded.version, is_deleted = excluded.is_deleted",
				params![item.name, item.value, item.meta, item.version, item.deleted as i64],
			)
			.map_err(sqlite_err)?;
		}
		txn.commit().map_err(sqlite_err)?;
		Ok(())
	}

	async fn update(&self, item: PasswordItem) -> Result<(), VaultError> {
		let guard = self.conn.lock().await;
		guard
			.execute(
				"UPDATE passwords SET encrypted_pass = ?1, meta = ?2, version = ?3, is_deleted = ?4 \
				 WHERE name = ?5",
				params![item.value, item.meta, item.version, item.deleted as i64, item.name],
			)
			.map_err(sqlite_err)?;
		Ok(())
	}

	async fn soft_delete(&self, name: &str) -> Result<(), VaultError> {
		let guard = self.conn.lock().await;
		guard
			.execute("UPDATE passwords SET is_deleted = 1 WHERE name = ?1", params![name])
			.map_err(sqlite_err)?;
		Ok(())
	}

	async fn hard_delete(&self, name: &str) -> Result<(), VaultError> {
		let guard = self.conn.lock().await;
		guard.execute("DELETE FROM passwords WHERE name = ?1", params![name]).map_err(sqlite_err)?;
		Ok(())
	}
}

#[async_trait]
impl LocalItemStore<CardItem> for SqliteStore {
	async fn list(&self) -> Result<Vec<CardItem>, VaultError> {
		let guard = self.conn.lock().await;
		let mut stmt = guard
			.prepare(
				"SELECT name, meta, version, is_deleted, cardholder_name, number_encrypted, \
				 cvv_encrypted, expiration_date FROM cards",
			)
			.map_err(sqlite_err)?;
		let rows = stmt
			.query_map([], |r| {
				Ok(CardItem {
					name: r.get(0)?,
					meta: r.get(1)?,
					version: r.get(2)?,
					deleted: r.get::<_, i64>(3)? != 0,
					cardholder_name: r.get(4)?,
					number: r.get(5)?,
					cvv: r.get(6)?,
					expiration_date: r.get(7)?,
				})
			})
			.map_err(sqlite_err)?
			.collect::<Result<Vec<_>, _>>()
			.map_err(sqlite_err)?;
		Ok(rows)
	}

	async fn get_by_name(&self, name: &str) -> Result<CardItem, VaultError> {
		let guard = self.conn.lock().await;
		guard
			.query_row(
				"SELECT name, meta, version, is_deleted, cardholder_name, number_encrypted, \
				 cvv_encrypted, expiration_date FROM cards WHERE name = ?1 AND is_deleted = 0",
				params![name],
				|r| {
					Ok(CardItem {
						name: r.get(0)?,
						meta: r.get(1)?,
						version: r.get(2)?,
						deleted: r.get::<_, i64>(3)? != 0,
						cardholder_name: r.get(4)?,
						number: r.get(5)?,
						cvv: r.get(6)?,
						expiration_date: r.get(7)?,
					})
				},
			)
			.optional()
			.map_err(sqlite_err)?
			.ok_or_else(|| VaultError::NoSuchItemError(name.to_string()))
	}

	async fn exists(&self, name: &str) -> Result<bool, VaultError> {
		let guard = self.conn.lock().await;
		let found: Option<i64> = guard
			.query_row("SELECT 1 FROM cards WHERE name = ?1 AND is_deleted = 0", params![name], |r| {
				r.get(0)
			})
			.optional()
			.map_err(sqlite_err)?;
		Ok(found.is_some())
	}

	async fn create(&self, item: CardItem) -> Result<(), VaultError> {
		if LocalItemStore::<CardItem>::exists(self, &item.name).await? {
			return Err(VaultError::AlreadyExistsError(item.name));
		}
		let guard = self.conn.lock().await;
		guard
			.execute(
				"INSERT INTO cards (name, cardholder_name, number_encrypted, cvv_encrypted, \
				 expiration_date, meta, version, is_deleted) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
				 ON CONFLICT(name) DO UPDATE SET \
				 cardholder_name = excluded.cardholder_name, number_encrypted = excluded.number_encrypted, \
				 cvv_encrypted = excluded.cvv_encrypted, expiration_date = excluded.expiration_date, \
				 meta = excluded.meta, version = excluded.version, is_deleted = excluded.is_deleted",
				params![
					item.name,
					item.cardholder_name,
					item.number,
					item.cvv,
					item.expiration_date,
					item.meta,
					item.version,
					item.deleted as i64
				],
			)
			.map_err(sqlite_err)?;
		Ok(())
	}

	async fn create_many(&self, items: Vec<CardItem>) -> Result<(), VaultError> {
		let mut guard = self.conn.lock().await;
		let txn = guard.transaction().map_err(sqlite_err)?;
		for item in items {
			txn.execute(
				"INSERT INTO cards (name, cardholder_name, number_encrypted, cvv_encrypted, \
				 expiration_date, meta, version, is_deleted) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
				 ON CONFLICT(name) DO UPDATE SET \
				 cardholder_name = excluded.cardholder_name, number_encrypted = excluded.number_encrypted, \
				 cvv_encrypted = excluded.cvv_encrypted, expiration_date = excluded.expiration_date, \
				 meta = excluded.meta, version = excluded.version, is_deleted = excluded.is_deleted",
				params![
					item.name,
					item.cardholder_name,
					item.number,
					item.cvv,
					item.expiration_date,
					item.meta,
					item.version,
					item.deleted as i64
				],
			)
			.map_err(sqlite_err)?;
		}
		txn.commit().map_err(sqlite_err)?;
		Ok(())
	}

	async fn update(&self, item: CardItem) -> Result<(), VaultError> {
		let guard = self.conn.lock().await;
		guard
			.execute(
				"UPDATE cards SET cardholder_name = ?1, number_encrypted = ?2, cvv_encrypted = ?3, \
				 expiration_date = ?4, meta = ?5, version = ?6, is_deleted = ?7 WHERE name = ?8",
				params![
					item.cardholder_name,
					item.number,
					item.cvv,
					item.expiration_date,
					item.meta,
					item.version,
					item.deleted as i64,
					item.name
				],
			)
			.map_err(sqlite_err)?;
		Ok(())
	}

	async fn soft_delete(&self, name: &str) -> Result<(), VaultError> {
		let guard = self.conn.lock().await;
		guard.execute("UPDATE cards SET is_deleted = 1 WHERE name = ?1", params![name]).map_err(sqlite_err)?;
		Ok(())
	}

	async fn hard_delete(&self, name: &str) -> Result<(), VaultError> {
		let guard = self.conn.lock().await;
		guard.execute("DELETE FROM cards WHERE name = ?1", params![name]).map_err(sqlite_err)?;
		Ok(())
	}
}

impl SqliteStore {
	/// Lists the local mirror of a bucket's file metadata, excluding soft-deleted rows.
	pub async fn list_files(&self, bucket: &str) -> Result<Vec<FileInfo>, ClientError> {
		let guard = self.conn.lock().await;
		let mut stmt = guard.prepare(
			"SELECT name, meta, bucket, size, upload_status FROM files \
			 WHERE bucket = ?1 AND is_deleted = 0",
		)?;
		let rows = stmt
			.query_map(params![bucket], |r| {
				let status: i64 = r.get(4)?;
				Ok(FileInfo {
					name: r.get(0)?,
					meta: r.get(1)?,
					version: 0,
					deleted: false,
					bucket: r.get(2)?,
					size: r.get(3)?,
					upload_status: if status == UploadStatus::Done as i64 {
						UploadStatus::Done as i32
					} else {
						UploadStatus::Pending as i32
					},
				})
			})?
			.collect::<Result<Vec<_>, _>>()?;
		Ok(rows)
	}

	/// Overwrites the local mirror of a bucket's file list with exactly what the server
	/// returned, since file metadata does not go through the version/conflict algebra that
	/// passwords and cards do.
	pub async fn replace_files(&self, bucket: &str, files: Vec<FileInfo>) -> Result<(), ClientError> {
		let mut guard = self.conn.lock().await;
		let txn = guard.transaction()?;
		txn.execute("DELETE FROM files WHERE bucket = ?1", params![bucket])?;
		for file in files {
			txn.execute(
				"INSERT INTO files (bucket, name, size, meta, upload_status, is_deleted) \
				 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
				params![file.bucket, file.name, file.size, file.meta, file.upload_status as i64],
			)?;
		}
		txn.commit()?;
		Ok(())
	}

	/// Marks a file soft-deleted in the local mirror.
	pub async fn soft_delete_file(&self, bucket: &str, name: &str) -> Result<(), ClientError> {
		let guard = self.conn.lock().await;
		guard.execute(
			"UPDATE files SET is_deleted = 1 WHERE bucket = ?1 AND name = ?2",
			params![bucket, name],
		)?;
		Ok(())
	}

	/// Reads the current session, if any key has ever been written. Missing keys come back
	/// as empty strings rather than an error, tolerating a partially-populated table.
	pub async fn get_session(&self) -> Result<ClientSession, ClientError> {
		let guard = self.conn.lock().await;
		let read = |key: &str| -> Result<String, ClientError> {
			guard
				.query_row("SELECT value FROM session WHERE key = ?1", params![key], |r| r.get(0))
				.optional()
				.map(|v: Option<String>| v.unwrap_or_default())
				.map_err(ClientError::from)
		};
		Ok(ClientSession {
			login: read(LOGIN_KEY)?,
			master_password_hash: read(MASTER_PASS_KEY)?,
			auth_token: read(AUTH_TOKEN_KEY)?,
		})
	}

	/// Persists a session, overwriting any previous values for all three keys.
	pub async fn set_session(&self, session: &ClientSession) -> Result<(), ClientError> {
		let mut guard = self.conn.lock().await;
		let txn = guard.transaction()?;
		txn.execute(
			"INSERT INTO session (key, value) VALUES (?1, ?2) \
			 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
			params![LOGIN_KEY, session.login],
		)?;
		txn.execute(
			"INSERT INTO session (key, value) VALUES (?1, ?2) \
			 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
			params![MASTER_PASS_KEY, session.master_password_hash],
		)?;
		txn.execute(
			"INSERT INTO session (key, value) VALUES (?1, ?2) \
			 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
			params![AUTH_TOKEN_KEY, session.auth_token],
		)?;
		txn.commit()?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn password(name: &str, version: i64, deleted: bool) -> PasswordItem {
		PasswordItem { name: name.to_string(), meta: String::new(), version, deleted, value: "ct".to_string() }
	}

	#[tokio::test]
	async fn create_then_get_by_name_round_trips() {
		let store = SqliteStore::open_in_memory().await.unwrap();
		LocalItemStore::<PasswordItem>::create(&store, password("s1", 1, false)).await.unwrap();

		let fetched = LocalItemStore::<PasswordItem>::get_by_name(&store, "s1").await.unwrap();
		assert_eq!(fetched.version, 1);
	}

	#[tokio::test]
	async fn get_by_name_on_missing_row_is_not_found() {
		let store = SqliteStore::open_in_memory().await.unwrap();
		let err = LocalItemStore::<PasswordItem>::get_by_name(&store, "missing").await.unwrap_err();
		assert!(matches!(err, VaultError::NoSuchItemError(_)));
	}

	#[tokio::test]
	async fn create_many_then_list_returns_every_row_including_deleted() {
		let store = SqliteStore::open_in_memory().await.unwrap();
		LocalItemStore::<PasswordItem>::create_many(
			&store,
			vec![password("a", 1, false), password("b", 2, true)],
		)
		.await
		.unwrap();

		let all = LocalItemStore::<PasswordItem>::list(&store).await.unwrap();
		assert_eq!(all.len(), 2);
	}

	#[tokio::test]
	async fn update_is_a_blind_overwrite() {
		let store = SqliteStore::open_in_memory().await.unwrap();
		LocalItemStore::<PasswordItem>::create(&store, password("s1", 1, false)).await.unwrap();
		LocalItemStore::<PasswordItem>::update(&store, password("s1", 5, false)).await.unwrap();

		let fetched = LocalItemStore::<PasswordItem>::get_by_name(&store, "s1").await.unwrap();
		assert_eq!(fetched.version, 5);
	}

	#[tokio::test]
	async fn soft_delete_then_hard_delete_removes_the_row() {
		let store = SqliteStore::open_in_memory().await.unwrap();
		LocalItemStore::<PasswordItem>::create(&store, password("s1", 1, false)).await.unwrap();
		LocalItemStore::<PasswordItem>::soft_delete(&store, "s1").await.unwrap();
		assert!(!LocalItemStore::<PasswordItem>::exists(&store, "s1").await.unwrap());

		LocalItemStore::<PasswordItem>::hard_delete(&store, "s1").await.unwrap();
		let all = LocalItemStore::<PasswordItem>::list(&store).await.unwrap();
		assert!(all.is_empty());
	}

	#[tokio::test]
	async fn replace_files_overwrites_the_bucket_mirror() {
		let store = SqliteStore::open_in_memory().await.unwrap();
		store
			.replace_files(
				"notes",
				vec![FileInfo {
					name: "n1".to_string(),
					meta: String::new(),
					version: 0,
					deleted: false,
					bucket: "notes".to_string(),
					size: 2048,
					upload_status: UploadStatus::Done as i32,
				}],
			)
			.await
			.unwrap();

		let files = store.list_files("notes").await.unwrap();
		assert_eq!(files.len(), 1);
		assert_eq!(files[0].size, 2048);
	}

	#[tokio::test]
	async fn session_round_trips_and_defaults_to_empty_before_any_write() {
		let store = SqliteStore::open_in_memory().await.unwrap();
		let empty = store.get_session().await.unwrap();
		assert!(!empty.is_present());

		let session = ClientSession {
			login: "alice".to_string(),
			master_password_hash: "hash".to_string(),
			auth_token: "jwt".to_string(),
		};
		store.set_session(&session).await.unwrap();

		let fetched = store.get_session().await.unwrap();
		assert_eq!(fetched, session);
	}
}
