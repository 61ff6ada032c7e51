//! Add/update/list/delete flows for password items: local-first writes, pushed to the
//! server opportunistically and reconciled through [`crate::sync`] on demand.
//!
//! A transport failure talking to the server is treated as "offline, apply locally and let
//! the next bulk sync catch the server up" rather than as a hard failure. A conflict the
//! server *did* respond with, by contrast, is never silently resolved.

use std::sync::Arc;

use api::item::{Conflict, ConflictKind};
use api::store::LocalItemStore;
use api::types::{PasswordConflict, PasswordItem};
use vault_crypto::Key;

use crate::error::ClientError;
use crate::local_store::SqliteStore;
use crate::rpc::RpcClient;
use crate::sync::{apply_plan, plan_sync, PushOutcome, SyncReport};

fn conflict_from_pb(
	pb: PasswordConflict, incoming: PasswordItem,
) -> Result<Conflict<PasswordItem>, ClientError> {
	let actual = pb.actual.ok_or_else(|| ClientError::Decode("conflict missing actual item".into()))?;
	let kind = if pb.kind == api::types::ItemConflictKind::Deleted as i32 {
		ConflictKind::Deleted
	} else {
		ConflictKind::Diff
	};
	Ok(Conflict { kind, incoming, actual })
}

/// Password add/update/list/delete against the local cache and the server, plus bulk sync.
pub struct PasswordsUseCase {
	local: Arc<SqliteStore>,
	rpc: RpcClient,
}

impl PasswordsUseCase {
	/// Builds a usecase over the given local cache and RPC transport.
	pub fn new(local: Arc<SqliteStore>, rpc: RpcClient) -> Self {
		Self { local, rpc }
	}

	/// Encrypts `plaintext_password` under `key`, pushes it to the server as a new item at
	/// version 1, and writes it locally. Fails with [`ClientError::AlreadyExists`] if a
	/// non-deleted row with the same name already exists locally.
	pub async fn add_new_password(
		&self, key: &Key, token: &str, name: &str, meta: &str, plaintext_password: &str,
	) -> Result<(), ClientError> {
		if LocalItemStore::<PasswordItem>::exists(self.local.as_ref(), name).await? {
			return Err(ClientError::AlreadyExists(name.to_string()));
		}

		let value = vault_crypto::encrypt_string(key, plaintext_password)?;
		let item = PasswordItem { name: name.to_string(), meta: meta.to_string(), version: 1, deleted: false, value };

		match self.rpc.sync_password(token, item.clone()).await {
			Ok(resp) if resp.success => {
				LocalItemStore::<PasswordItem>::create(self.local.as_ref(), item).await.map_err(ClientError::from)
			},
			Ok(resp) => {
				let conflict = resp
					.conflict
					.ok_or_else(|| ClientError::Decode("unsuccessful sync missing conflict".into()))?;
				Err(ClientError::Server(conflict_server_error(conflict_from_pb(conflict, item)?)))
			},
			Err(_) => {
				LocalItemStore::<PasswordItem>::create(self.local.as_ref(), item).await.map_err(ClientError::from)
			},
		}
	}

	/// Pushes an updated item (caller-supplied version, usually the local version plus one)
	/// to the server, writing it locally on success or on a network failure.
	pub async fn update_password(
		&self, token: &str, item: PasswordItem,
	) -> Result<(), ClientError> {
		match self.rpc.sync_password(token, item.clone()).await {
			Ok(resp) if resp.success => {
				LocalItemStore::<PasswordItem>::update(self.local.as_ref(), item).await.map_err(ClientError::from)
			},
			Ok(resp) => {
				let conflict = resp
					.conflict
					.ok_or_else(|| ClientError::Decode("unsuccessful sync missing conflict".into()))?;
				Err(ClientError::Server(conflict_server_error(conflict_from_pb(conflict, item)?)))
			},
			Err(_) => {
				LocalItemStore::<PasswordItem>::update(self.local.as_ref(), item).await.map_err(ClientError::from)
			},
		}
	}

	/// Decrypts and returns a single password by name from the local cache.
	pub async fn get_password_by_name(&self, key: &Key, name: &str) -> Result<(PasswordItem, String), ClientError> {
		let item = LocalItemStore::<PasswordItem>::get_by_name(self.local.as_ref(), name).await?;
		let plaintext = vault_crypto::decrypt_string(key, &item.value)?;
		Ok((item, plaintext))
	}

	/// Lists every locally cached password, still encrypted.
	pub async fn get_list(&self) -> Result<Vec<PasswordItem>, ClientError> {
		Ok(LocalItemStore::<PasswordItem>::list(self.local.as_ref()).await?)
	}

	/// Deletes on the server, then hard-deletes the local row. If the server call fails the
	/// local row is soft-deleted instead, so the next bulk sync reconciles it as a
	/// tombstone rather than leaving it looking untouched.
	pub async fn delete_password(&self, token: &str, name: &str) -> Result<(), ClientError> {
		match self.rpc.delete_password(token, name).await {
			Ok(_) => {
				LocalItemStore::<PasswordItem>::hard_delete(self.local.as_ref(), name).await?;
				Ok(())
			},
			Err(e) => {
				LocalItemStore::<PasswordItem>::soft_delete(self.local.as_ref(), name).await?;
				Err(e)
			},
		}
	}

	/// Fetches the server's full password list and reconciles it against the local cache,
	/// per the bulk-sync algebra.
	pub async fn bulk_sync(&self, token: &str) -> Result<SyncReport<PasswordItem>, ClientError> {
		let server_items = self.rpc.list_passwords(token).await?.items;
		let local_items = LocalItemStore::<PasswordItem>::list(self.local.as_ref()).await?;
		let plan = plan_sync(server_items, local_items, |i| i.name.as_str(), |a, b| {
			a.name == b.name && a.meta == b.meta && a.value == b.value && a.version == b.version
		});

		let rpc = self.rpc.clone();
		let token = token.to_string();
		let push = move |item: PasswordItem| {
			let rpc = rpc.clone();
			let token = token.clone();
			async move {
				let resp = rpc.sync_password(&token, item.clone()).await?;
				if resp.success {
					Ok(PushOutcome::Accepted)
				} else {
					let conflict = resp
						.conflict
						.ok_or_else(|| ClientError::Decode("unsuccessful sync missing conflict".into()))?;
					Ok(PushOutcome::Conflict(conflict_from_pb(conflict, item)?))
				}
			}
		};

		Ok(apply_plan(Arc::clone(&self.local), plan, push).await)
	}
}

fn conflict_server_error(conflict: Conflict<PasswordItem>) -> api::error::VaultError {
	api::error::VaultError::ConflictError(format!(
		"password {:?} conflicts with server version {} ({:?})",
		conflict.actual.name, conflict.actual.version, conflict.kind
	))
}
