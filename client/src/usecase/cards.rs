//! Add/update/list/delete flows for payment cards — the same push-then-write-locally shape
//! as [`crate::usecase::passwords`], with the card number and CVV each encrypted as their own
//! AEAD string per spec, and `cardholder_name`/`expiration_date` left in the clear.

use std::sync::Arc;

use api::item::{Conflict, ConflictKind};
use api::store::LocalItemStore;
use api::types::{CardConflict, CardItem};
use vault_crypto::Key;

use crate::error::ClientError;
use crate::local_store::SqliteStore;
use crate::rpc::RpcClient;
use crate::sync::{apply_plan, plan_sync, PushOutcome, SyncReport};

fn conflict_from_pb(pb: CardConflict, incoming: CardItem) -> Result<Conflict<CardItem>, ClientError> {
	let actual = pb.actual.ok_or_else(|| ClientError::Decode("conflict missing actual item".into()))?;
	let kind = if pb.kind == api::types::ItemConflictKind::Deleted as i32 {
		ConflictKind::Deleted
	} else {
		ConflictKind::Diff
	};
	Ok(Conflict { kind, incoming, actual })
}

fn conflict_server_error(conflict: Conflict<CardItem>) -> api::error::VaultError {
	api::error::VaultError::ConflictError(format!(
		"card {:?} conflicts with server version {} ({:?})",
		conflict.actual.name, conflict.actual.version, conflict.kind
	))
}

/// Plaintext fields needed to add or update a card; the number and CVV are encrypted right
/// before either crosses into a [`CardItem`].
pub struct PlaintextCard<'a> {
	/// Unique per (user, kind).
	pub name: &'a str,
	/// Plaintext metadata.
	pub meta: &'a str,
	/// Plaintext; the name printed on the card.
	pub cardholder_name: &'a str,
	/// Plaintext card number, encrypted before it leaves this module.
	pub number: &'a str,
	/// Plaintext CVV, encrypted before it leaves this module.
	pub cvv: &'a str,
	/// Plaintext, `MM/YY`.
	pub expiration_date: &'a str,
}

/// Card add/update/list/delete against the local cache and the server, plus bulk sync.
pub struct CardsUseCase {
	local: Arc<SqliteStore>,
	rpc: RpcClient,
}

impl CardsUseCase {
	/// Builds a usecase over the given local cache and RPC transport.
	pub fn new(local: Arc<SqliteStore>, rpc: RpcClient) -> Self {
		Self { local, rpc }
	}

	/// Encrypts the card's number and CVV under `key`, pushes it to the server as a new
	/// item at version 1, and writes it locally.
	pub async fn add_new_card(&self, key: &Key, token: &str, card: PlaintextCard<'_>) -> Result<(), ClientError> {
		if LocalItemStore::<CardItem>::exists(self.local.as_ref(), card.name).await? {
			return Err(ClientError::AlreadyExists(card.name.to_string()));
		}

		let item = CardItem {
			name: card.name.to_string(),
			meta: card.meta.to_string(),
			version: 1,
			deleted: false,
			cardholder_name: card.cardholder_name.to_string(),
			number: vault_crypto::encrypt_string(key, card.number)?,
			cvv: vault_crypto::encrypt_string(key, card.cvv)?,
			expiration_date: card.expiration_date.to_string(),
		};

		match self.rpc.sync_card(token, item.clone()).await {
			Ok(resp) if resp.success => {
				LocalItemStore::<CardItem>::create(self.local.as_ref(), item).await.map_err(ClientError::from)
			},
			Ok(resp) => {
				let conflict = resp
					.conflict
					.ok_or_else(|| ClientError::Decode("unsuccessful sync missing conflict".into()))?;
				Err(ClientError::Server(conflict_server_error(conflict_from_pb(conflict, item)?)))
			},
			Err(_) => {
				LocalItemStore::<CardItem>::create(self.local.as_ref(), item).await.map_err(ClientError::from)
			},
		}
	}

	/// Pushes an updated card item, writing it locally on success or on a network failure.
	pub async fn update_card(&self, token: &str, item: CardItem) -> Result<(), ClientError> {
		match self.rpc.sync_card(token, item.clone()).await {
			Ok(resp) if resp.success => {
				LocalItemStore::<CardItem>::update(self.local.as_ref(), item).await.map_err(ClientError::from)
			},
			Ok(resp) => {
				let conflict = resp
					.conflict
					.ok_or_else(|| ClientError::Decode("unsuccessful sync missing conflict".into()))?;
				Err(ClientError::Server(conflict_server_error(conflict_from_pb(conflict, item)?)))
			},
			Err(_) => {
				LocalItemStore::<CardItem>::update(self.local.as_ref(), item).await.map_err(ClientError::from)
			},
		}
	}

	/// Decrypts the number and CVV of a single locally cached card.
	pub async fn get_card_by_name(
		&self, key: &Key, name: &str,
	) -> Result<(CardItem, String, String), ClientError> {
		let item = LocalItemStore::<CardItem>::get_by_name(self.local.as_ref(), name).await?;
		let number = vault_crypto::decrypt_string(key, &item.number)?;
		let cvv = vault_crypto::decrypt_string(key, &item.cvv)?;
		Ok((item, number, cvv))
	}

	/// Lists every locally cached card, still encrypted.
	pub async fn get_list(&self) -> Result<Vec<CardItem>, ClientError> {
		Ok(LocalItemStore::<CardItem>::list(self.local.as_ref()).await?)
	}

	/// Deletes on the server, then hard-deletes the local row. If the server call fails the
	/// local row is soft-deleted instead, so the next bulk sync reconciles it as a
	/// tombstone rather than leaving it looking untouched.
	pub async fn delete_card(&self, token: &str, name: &str) -> Result<(), ClientError> {
		match self.rpc.delete_card(token, name).await {
			Ok(_) => {
				LocalItemStore::<CardItem>::hard_delete(self.local.as_ref(), name).await?;
				Ok(())
			},
			Err(e) => {
				LocalItemStore::<CardItem>::soft_delete(self.local.as_ref(), name).await?;
				Err(e)
			},
		}
	}

	/// Fetches the server's full card list and reconciles it against the local cache.
	pub async fn bulk_sync(&self, token: &str) -> Result<SyncReport<CardItem>, ClientError> {
		let server_items = self.rpc.list_cards(token).await?.items;
		let local_items = LocalItemStore::<CardItem>::list(self.local.as_ref()).await?;
		let plan = plan_sync(server_items, local_items, |i| i.name.as_str(), |a, b| {
			a.name == b.name
				&& a.meta == b.meta
				&& a.version == b.version
				&& a.cardholder_name == b.cardholder_name
				&& a.number == b.number
				&& a.cvv == b.cvv
				&& a.expiration_date == b.expiration_date
		});

		let rpc = self.rpc.clone();
		let token = token.to_string();
		let push = move |item: CardItem| {
			let rpc = rpc.clone();
			let token = token.clone();
			async move {
				let resp = rpc.sync_card(&token, item.clone()).await?;
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
