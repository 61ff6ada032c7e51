use api::error::VaultError;
use api::store::{FileStore, ItemStore, UpdateOutcome, UserStore};
use api::types::{CardItem, FileInfo, PasswordItem, UploadStatus};
use async_trait::async_trait;
pub use native_tls::Certificate;
use postgres_native_tls::MakeTlsConnector;
use std::io;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};

fn db_err(e: tokio_postgres::Error) -> VaultError {
	VaultError::InternalServerError(e.to_string())
}

fn upload_status_from_row(value: i16) -> UploadStatus {
	if value == UploadStatus::Done as i16 {
		UploadStatus::Done
	} else {
		UploadStatus::Pending
	}
}

/// A [PostgreSQL](https://www.postgresql.org/) backed implementation of the vault's
/// server-side item, file, and user stores.
///
/// Queries are serialized through a single connection behind a mutex rather than a pool;
/// correctness under concurrent writers comes from row-level `FOR UPDATE` locking inside
/// each transaction, not from connection parallelism.
pub struct PostgresStore {
	client: Mutex<Client>,
}

impl PostgresStore {
	async fn connect_with<T>(dsn: &str, tls: T) -> Result<Self, io::Error>
	where
		T: tokio_postgres::tls::MakeTlsConnect<tokio_postgres::Socket> + Send + 'static,
		T::Stream: Send,
		T::TlsConnect: Send,
		<T::TlsConnect as tokio_postgres::tls::TlsConnect<tokio_postgres::Socket>>::Future: Send,
	{
		let (client, connection) = tokio_postgres::connect(dsn, tls)
			.await
			.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
		tokio::spawn(async move {
			if let Err(e) = connection.await {
				log::error!("postgres connection error: {e}");
			}
		});
		crate::migrations::run(&client)
			.await
			.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
		Ok(Self { client: Mutex::new(client) })
	}

	/// Connects over a plaintext TCP connection and runs pending migrations.
	pub async fn connect_plaintext(dsn: &str) -> Result<Self, io::Error> {
		Self::connect_with(dsn, NoTls).await
	}

	/// Connects with TLS, optionally trusting an additional CA certificate beyond the
	/// system roots, and runs pending migrations.
	pub async fn connect_tls(
		dsn: &str, additional_ca: Option<Certificate>,
	) -> Result<Self, io::Error> {
		let mut builder = native_tls::TlsConnector::builder();
		if let Some(cert) = additional_ca {
			builder.add_root_certificate(cert);
		}
		let connector =
			builder.build().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
		Self::connect_with(dsn, MakeTlsConnector::new(connector)).await
	}
}

#[async_trait]
impl UserStore for PostgresStore {
	async fn create_user(&self, login: &str, password: &str) -> Result<i64, VaultError> {
		let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
			.map_err(|e| VaultError::InternalServerError(e.to_string()))?;
		let guard = self.client.lock().await;
		let row = guard
			.query_one(
				"INSERT INTO users (login, password_hash) VALUES ($1, $2) RETURNING id",
				&[&login, &hash],
			)
			.await
			.map_err(|e| VaultError::AlreadyExistsError(format!("login already taken: {e}")))?;
		Ok(row.get(0))
	}

	async fn verify_user(&self, login: &str, password: &str) -> Result<i64, VaultError> {
		let guard = self.client.lock().await;
		let row = guard
			.query_opt("SELECT id, password_hash FROM users WHERE login = $1", &[&login])
			.await
			.map_err(db_err)?
			.ok_or_else(|| VaultError::AuthError("invalid login or password".to_string()))?;
		let id: i64 = row.get(0);
		let hash: String = row.get(1);
		if bcrypt::verify(password, &hash).unwrap_or(false) {
			Ok(id)
		} else {
			Err(VaultError::AuthError("invalid login or password".to_string()))
		}
	}
}

#[async_trait]
impl ItemStore<PasswordItem> for PostgresStore {
	async fn update_by_name(
		&self, user_id: i64, name: &str,
		updater: Box<dyn FnOnce(Option<PasswordItem>) -> UpdateOutcome<PasswordItem> + Send>,
	) -> Result<UpdateOutcome<PasswordItem>, VaultError> {
		let mut guard = self.client.lock().await;
		let txn = guard.transaction().await.map_err(db_err)?;
		let row = txn
			.query_opt(
				"SELECT name, meta, version, is_deleted, encrypted_pass FROM passwords \
				 WHERE user_id = $1 AND name = $2 FOR UPDATE",
				&[&user_id, &name],
			)
			.await
			.map_err(db_err)?;
		let current = row.map(|r| PasswordItem {
			name: r.get(0),
			meta: r.get(1),
			version: r.get(2),
			deleted: r.get(3),
			value: r.get(4),
		});

		let outcome = updater(current);
		match &outcome {
			UpdateOutcome::Write(item) => {
				txn.execute(
					"INSERT INTO passwords (user_id, name, encrypted_pass, meta, version, is_deleted) \
					 VALUES ($1, $2, $3, $4, $5, $6) \
					 ON CONFLICT (user_id, name) DO UPDATE SET \
					 encrypted_pass = $3, meta = $4, version = $5, is_deleted = $6",
					&[&user_id, &item.name, &item.value, &item.meta, &item.version, &item.deleted],
				)
				.await
				.map_err(db_err)?;
				txn.commit().await.map_err(db_err)?;
			},
			UpdateOutcome::NoChange => {
				txn.commit().await.map_err(db_err)?;
			},
			UpdateOutcome::Reject(_) => {
				txn.rollback().await.map_err(db_err)?;
			},
		}
		Ok(outcome)
	}

	async fn insert(&self, user_id: i64, item: PasswordItem) -> Result<(), VaultError> {
		let guard = self.client.lock().await;
		guard
			.execute(
				"INSERT INTO passwords (user_id, name, encrypted_pass, meta, version, is_deleted) \
				 VALUES ($1, $2, $3, $4, $5, $6)",
				&[&user_id, &item.name, &item.value, &item.meta, &item.version, &item.deleted],
			)
			.await
			.map_err(|e| VaultError::AlreadyExistsError(format!("item already exists: {e}")))?;
		Ok(())
	}

	async fn list(&self, user_id: i64) -> Result<Vec<PasswordItem>, VaultError> {
		let guard = self.client.lock().await;
		let rows = guard
			.query(
				"SELECT name, meta, version, is_deleted, encrypted_pass FROM passwords \
				 WHERE user_id = $1 AND is_deleted = false",
				&[&user_id],
			)
			.await
			.map_err(db_err)?;
		Ok(rows
			.into_iter()
			.map(|r| PasswordItem {
				name: r.get(0),
				meta: r.get(1),
				version: r.get(2),
				deleted: r.get(3),
				value: r.get(4),
			})
			.collect())
	}

	async fn soft_delete(&self, user_id: i64, name: &str) -> Result<(), VaultError> {
		let guard = self.client.lock().await;
		guard
			.execute(
				"UPDATE passwords SET is_deleted = true WHERE user_id = $1 AND name = $2",
				&[&user_id, &name],
			)
			.await
			.map_err(db_err)?;
		Ok(())
	}
}

#[async_trait]
impl ItemStore<CardItem> for PostgresStore {
	async fn update_by_name(
		&self, user_id: i64, name: &str,
		updater: Box<dyn FnOnce(Option<CardItem>) -> UpdateOutcome<CardItem> + Send>,
	) -> Result<UpdateOutcome<CardItem>, VaultError> {
		let mut guard = self.client.lock().await;
		let txn = guard.transaction().await.map_err(db_err)?;
		let row = txn
			.query_opt(
				"SELECT name, meta, version, is_deleted, cardholder_name, number_encrypted, \
				 cvv_encrypted, expiration_date FROM cards WHERE user_id = $1 AND name = $2 FOR UPDATE",
				&[&user_id, &name],
			)
			.await
			.map_err(db_err)?;
		let current = row.map(|r| CardItem {
			name: r.get(0),
			meta: r.get(1),
			version: r.get(2),
			deleted: r.get(3),
			cardholder_name: r.get(4),
			number: r.get(5),
			cvv: r.get(6),
			expiration_date: r.get(7),
		});

		let outcome = updater(current);
		match &outcome {
			UpdateOutcome::Write(item) => {
				txn.execute(
					"INSERT INTO cards (user_id, name, cardholder_name, number_encrypted, \
					 cvv_encrypted, expiration_date, meta, version, is_deleted) \
					 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
					 ON CONFLICT (user_id, name) DO UPDATE SET \
					 cardholder_name = $3, number_encrypted = $4, cvv_encrypted = $5, \
					 expiration_date = $6, meta = $7, version = $8, is_deleted = $9",
					&[
						&user_id,
						&item.name,
						&item.cardholder_name,
						&item.number,
						&item.cvv,
						&item.expiration_date,
						&item.meta,
						&item.version,
						&item.deleted,
					],
				)
				.await
				.map_err(db_err)?;
				txn.commit().await.map_err(db_err)?;
			},
			UpdateOutcome::NoChange => {
				txn.commit().await.map_err(db_err)?;
			},
			UpdateOutcome::Reject(_) => {
				txn.rollback().await.map_err(db_err)?;
			},
		}
		Ok(outcome)
	}

	async fn insert(&self, user_id: i64, item: CardItem) -> Result<(), VaultError> {
		let guard = self.client.lock().await;
		guard
			.execute(
				"INSERT INTO cards (user_id, name, cardholder_name, number_encrypted, \
				 cvv_encrypted, expiration_date, meta, version, is_deleted) \
				 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
				&[
					&user_id,
					&item.name,
					&item.cardholder_name,
					&item.number,
					&item.cvv,
					&item.expiration_date,
					&item.meta,
					&item.version,
					&item.deleted,
				],
			)
			.await
			.map_err(|e| VaultError::AlreadyExistsError(format!("item already exists: {e}")))?;
		Ok(())
	}

	async fn list(&self, user_id: i64) -> Result<Vec<CardItem>, VaultError> {
		let guard = self.client.lock().await;
		let rows = guard
			.query(
				"SELECT name, meta, version, is_deleted, cardholder_name, number_encrypted, \
				 cvv_encrypted, expiration_date FROM cards WHERE user_id = $1 AND is_deleted = false",
				&[&user_id],
			)
			.await
			.map_err(db_err)?;
		Ok(rows
			.into_iter()
			.map(|r| CardItem {
				name: r.get(0),
				meta: r.get(1),
				version: r.get(2),
				deleted: r.get(3),
				cardholder_name: r.get(4),
				number: r.get(5),
				cvv: r.get(6),
				expiration_date: r.get(7),
			})
			.collect())
	}

	async fn soft_delete(&self, user_id: i64, name: &str) -> Result<(), VaultError> {
		let guard = self.client.lock().await;
		guard
			.execute(
				"UPDATE cards SET is_deleted = true WHERE user_id = $1 AND name = $2",
				&[&user_id, &name],
			)
			.await
			.map_err(db_err)?;
		Ok(())
	}
}

/// Sentinel `size` for a `pending` row that has never had a committed upload — distinguishes
/// "brand new, nothing to fall back to" from "re-upload of an existing file" so that
/// [`FileStore::abort_upload`] and [`FileStore::recover_pending_uploads`] know whether to
/// delete the row or restore it to `done`. Real blob sizes are never negative.
const NO_PRIOR_UPLOAD: i64 = -1;

#[async_trait]
impl FileStore for PostgresStore {
	async fn begin_upload(
		&self, user_id: i64, bucket: &str, name: &str, meta: &str,
	) -> Result<(), VaultError> {
		let mut guard = self.client.lock().await;
		let txn = guard.transaction().await.map_err(db_err)?;
		let existing = txn
			.query_opt(
				"SELECT upload_status FROM files WHERE user_id = $1 AND bucket = $2 AND name = $3 \
				 FOR UPDATE",
				&[&user_id, &bucket, &name],
			)
			.await
			.map_err(db_err)?;
		if let Some(row) = &existing {
			let status: i16 = row.get(0);
			if upload_status_from_row(status) == UploadStatus::Pending {
				txn.rollback().await.map_err(db_err)?;
				return Err(VaultError::ConflictError(format!(
					"upload already in progress for {bucket}/{name}"
				)));
			}
		}
		// meta/size are only ever written by complete_upload; on conflict we leave them as
		// they were so abort_upload/recover_pending_uploads can restore the prior done row.
		txn.execute(
			"INSERT INTO files (user_id, bucket, name, meta, size, upload_status, is_deleted) \
			 VALUES ($1, $2, $3, $4, $5, $6, false) \
			 ON CONFLICT (user_id, bucket, name) DO UPDATE SET upload_status = $6",
			&[&user_id, &bucket, &name, &meta, &NO_PRIOR_UPLOAD, &(UploadStatus::Pending as i16)],
		)
		.await
		.map_err(db_err)?;
		txn.commit().await.map_err(db_err)
	}

	async fn complete_upload(
		&self, user_id: i64, bucket: &str, name: &str, size: i64, meta: &str,
	) -> Result<(), VaultError> {
		let guard = self.client.lock().await;
		guard
			.execute(
				"UPDATE files SET size = $1, meta = $2, upload_status = $3 \
				 WHERE user_id = $4 AND bucket = $5 AND name = $6",
				&[&size, &meta, &(UploadStatus::Done as i16), &user_id, &bucket, &name],
			)
			.await
			.map_err(db_err)?;
		Ok(())
	}

	async fn abort_upload(&self, user_id: i64, bucket: &str, name: &str) -> Result<(), VaultError> {
		let mut guard = self.client.lock().await;
		let txn = guard.transaction().await.map_err(db_err)?;
		txn.execute(
			"UPDATE files SET upload_status = $1 \
			 WHERE user_id = $2 AND bucket = $3 AND name = $4 AND upload_status = $5 AND size <> $6",
			&[
				&(UploadStatus::Done as i16),
				&user_id,
				&bucket,
				&name,
				&(UploadStatus::Pending as i16),
				&NO_PRIOR_UPLOAD,
			],
		)
		.await
		.map_err(db_err)?;
		txn.execute(
			"DELETE FROM files WHERE user_id = $1 AND bucket = $2 AND name = $3 \
			 AND upload_status = $4 AND size = $5",
			&[&user_id, &bucket, &name, &(UploadStatus::Pending as i16), &NO_PRIOR_UPLOAD],
		)
		.await
		.map_err(db_err)?;
		txn.commit().await.map_err(db_err)
	}

	async fn get(&self, user_id: i64, bucket: &str, name: &str) -> Result<FileInfo, VaultError> {
		let guard = self.client.lock().await;
		let row = guard
			.query_opt(
				"SELECT name, meta, bucket, size, upload_status FROM files \
				 WHERE user_id = $1 AND bucket = $2 AND name = $3 \
				 AND upload_status = $4 AND is_deleted = false",
				&[&user_id, &bucket, &name, &(UploadStatus::Done as i16)],
			)
			.await
			.map_err(db_err)?
			.ok_or_else(|| VaultError::NoSuchItemError(format!("{bucket}/{name}")))?;
		let status: i16 = row.get(4);
		Ok(FileInfo {
			name: row.get(0),
			meta: row.get(1),
			version: 0,
			deleted: false,
			bucket: row.get(2),
			size: row.get(3),
			upload_status: upload_status_from_row(status) as i32,
		})
	}

	async fn list(&self, user_id: i64, bucket: &str) -> Result<Vec<FileInfo>, VaultError> {
		let guard = self.client.lock().await;
		let rows = guard
			.query(
				"SELECT name, meta, bucket, size, upload_status FROM files \
				 WHERE user_id = $1 AND bucket = $2 AND upload_status = $3 AND is_deleted = false",
				&[&user_id, &bucket, &(UploadStatus::Done as i16)],
			)
			.await
			.map_err(db_err)?;
		Ok(rows
			.into_iter()
			.map(|row| {
				let status: i16 = row.get(4);
				FileInfo {
					name: row.get(0),
					meta: row.get(1),
					version: 0,
					deleted: false,
					bucket: row.get(2),
					size: row.get(3),
					upload_status: upload_status_from_row(status) as i32,
				}
			})
			.collect())
	}

	async fn soft_delete(&self, user_id: i64, bucket: &str, name: &str) -> Result<(), VaultError> {
		let guard = self.client.lock().await;
		guard
			.execute(
				"UPDATE files SET is_deleted = true WHERE user_id = $1 AND bucket = $2 AND name = $3",
				&[&user_id, &bucket, &name],
			)
			.await
			.map_err(db_err)?;
		Ok(())
	}

	async fn recover_pending_uploads(&self) -> Result<u64, VaultError> {
		let mut guard = self.client.lock().await;
		let txn = guard.transaction().await.map_err(db_err)?;
		let restored = txn
			.execute(
				"UPDATE files SET upload_status = $1 WHERE upload_status = $2 AND size <> $3",
				&[&(UploadStatus::Done as i16), &(UploadStatus::Pending as i16), &NO_PRIOR_UPLOAD],
			)
			.await
			.map_err(db_err)?;
		let removed = txn
			.execute(
				"DELETE FROM files WHERE upload_status = $1 AND size = $2",
				&[&(UploadStatus::Pending as i16), &NO_PRIOR_UPLOAD],
			)
			.await
			.map_err(db_err)?;
		txn.commit().await.map_err(db_err)?;
		Ok(restored + removed)
	}
}
