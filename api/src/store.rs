use crate::error::VaultError;
use crate::item::{Reconciliation, SyncEntity};
use async_trait::async_trait;
use std::io;
use std::pin::Pin;

use futures_core::Stream;

/// What a caller-supplied updater in [`ItemStore::update_by_name`] decided to do with the row
/// it was handed.
pub enum UpdateOutcome<I> {
	/// Write `I` back in place of the current row.
	Write(I),
	/// Leave the row untouched; commit without writing.
	NoChange,
	/// Abort the transaction; surface this conflict to the caller.
	Reject(crate::item::Conflict<I>),
}

/// The sole server-side write entry-point for a given item kind.
///
/// `update_by_name` is the only primitive the sync engine uses to merge writes; every
/// invariant in the conflict algebra flows from callers going through it rather than writing
/// rows directly.
#[async_trait]
pub trait ItemStore<I>: Send + Sync
where
	I: SyncEntity + Send + 'static,
{
	/// Opens a transaction, locks the row for `(user, name)`, and invokes `updater` with the
	/// current row (or `None` if it does not exist). Commits the updater's decision; callers
	/// never get a blind-write path around this.
	///
	/// Takes a boxed closure rather than a generic parameter so the trait stays object-safe
	/// (`Box<dyn ItemStore<I>>` is how the server wires a backend behind the RPC handlers).
	async fn update_by_name(
		&self, user_id: i64, name: &str,
		updater: Box<dyn FnOnce(Option<I>) -> UpdateOutcome<I> + Send>,
	) -> Result<UpdateOutcome<I>, VaultError>;

	/// Inserts a brand new row, failing if one already exists for `(user, name)`.
	async fn insert(&self, user_id: i64, item: I) -> Result<(), VaultError>;

	/// Lists a user's items, excluding soft-deleted rows.
	async fn list(&self, user_id: i64) -> Result<Vec<I>, VaultError>;

	/// Marks a row deleted without removing it, so its version participates in future
	/// reconciliation as a tombstone.
	async fn soft_delete(&self, user_id: i64, name: &str) -> Result<(), VaultError>;
}

/// Builds the [`UpdateOutcome`] for a standard `Sync` push: reconcile `incoming` against
/// whatever row currently exists, falling back to a bare insert (by returning `Write`
/// unconditionally) when there is none.
///
/// Every `Sync` RPC handler's updater closure should be built from this rather than
/// hand-rolling the insert-or-reconcile decision, so the conflict algebra in
/// [`crate::item::reconcile`] stays the single source of truth for merge semantics.
pub fn reconcile_push<I: SyncEntity>(current: Option<I>, incoming: I) -> UpdateOutcome<I> {
	match current {
		None => UpdateOutcome::Write(incoming),
		Some(current) => match crate::item::reconcile(current, incoming) {
			Reconciliation::Winner(winner) => UpdateOutcome::Write(winner),
			Reconciliation::Conflict(conflict) => UpdateOutcome::Reject(conflict),
		},
	}
}

/// Per-user CRUD for a file's metadata row on the server, plus the two-phase durability
/// protocol around its blob.
///
/// Kept separate from [`ItemStore`] because a file's lifecycle (`pending -> done`, with
/// upload exclusivity) does not fit the generic reconcile-on-version shape that passwords
/// and cards share.
#[async_trait]
pub trait FileStore: Send + Sync {
	/// Marks `(user, bucket, name)` as `pending`, failing with [`VaultError::ConflictError`]
	/// if a pending row already exists for that key.
	///
	/// If a `done` row already exists for the key (a re-upload), its `meta`/`size` are left
	/// untouched — only `upload_status` flips to `pending` — so that a failed re-upload can
	/// restore exactly what was there before rather than losing it. The new `meta` takes
	/// effect only once [`complete_upload`](FileStore::complete_upload) commits the upload.
	async fn begin_upload(
		&self, user_id: i64, bucket: &str, name: &str, meta: &str,
	) -> Result<(), VaultError>;

	/// Transitions a row from `pending` to `done`, recording the final blob size and meta.
	async fn complete_upload(
		&self, user_id: i64, bucket: &str, name: &str, size: i64, meta: &str,
	) -> Result<(), VaultError>;

	/// Rolls back a `pending` row, e.g. after a failed blob-store PUT.
	///
	/// Restores whatever `done` row existed before [`begin_upload`](FileStore::begin_upload)
	/// was called, if any; only removes the row outright when the pending upload was for a
	/// brand-new `(user, bucket, name)` with no prior committed version to fall back to.
	async fn abort_upload(&self, user_id: i64, bucket: &str, name: &str) -> Result<(), VaultError>;

	/// Fetches a file's metadata, filtering to `upload_status = done && !deleted`.
	async fn get(
		&self, user_id: i64, bucket: &str, name: &str,
	) -> Result<crate::types::FileInfo, VaultError>;

	/// Lists a user's files within `bucket`, excluding soft-deleted and still-pending rows.
	async fn list(&self, user_id: i64, bucket: &str) -> Result<Vec<crate::types::FileInfo>, VaultError>;

	/// Marks a row soft-deleted. Blob removal is a separate, best-effort step the caller
	/// enqueues onto the worker pool.
	async fn soft_delete(&self, user_id: i64, bucket: &str, name: &str) -> Result<(), VaultError>;

	/// Resolves every row still `pending` across all users the same way
	/// [`abort_upload`](FileStore::abort_upload) resolves one: restoring the prior `done` row
	/// if there was one, removing the row otherwise. Called once at server startup, since a
	/// crash mid-upload leaves the row exactly as [`begin_upload`](FileStore::begin_upload)
	/// left it — `pending` forever unless something resolves it — which would otherwise block
	/// every future `begin_upload` for that name.
	async fn recover_pending_uploads(&self) -> Result<u64, VaultError>;
}

/// Registration and login against the server's user table.
///
/// Kept separate from [`ItemStore`]/[`FileStore`] since users are not syncable items; this is
/// the account boundary the auth layer sits behind, not a replicated entity.
#[async_trait]
pub trait UserStore: Send + Sync {
	/// Registers a new user, hashing `password` before storage. Fails with
	/// [`VaultError::InvalidRequestError`] if `login` is already taken.
	async fn create_user(&self, login: &str, password: &str) -> Result<i64, VaultError>;

	/// Verifies a login/password pair, returning the user id on success or
	/// [`VaultError::AuthError`] otherwise.
	async fn verify_user(&self, login: &str, password: &str) -> Result<i64, VaultError>;
}

/// A byte stream yielded by [`BlobStore::get`]; chunk boundaries carry no semantic meaning.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Vec<u8>>> + Send>>;

/// An S3-like flat object store keyed by `bucket/name`. Contents are always
/// client-side-encrypted; the store never interprets them.
#[async_trait]
pub trait BlobStore: Send + Sync {
	/// Streams `body` into the object named `bucket/name`, reading it to completion before
	/// returning. `body` is polled for more bytes as the underlying sink drains, matching the
	/// adapter-reader shape described for the upload pipeline.
	async fn put(
		&self, bucket: &str, name: &str, body: Box<dyn io::Read + Send>,
	) -> Result<u64, VaultError>;

	/// Opens a stream over the object named `bucket/name`'s contents.
	async fn get(&self, bucket: &str, name: &str) -> Result<ByteStream, VaultError>;

	/// Removes the object named `bucket/name`. Idempotent: removing a missing object is not
	/// an error.
	async fn delete(&self, bucket: &str, name: &str) -> Result<(), VaultError>;
}

/// Per-user local persistence of items for offline reads and pre-sync staging.
///
/// Unlike [`ItemStore`], there is no transactional merge here: `update` is a blind overwrite,
/// and the sync engine above this trait is responsible for version discipline before calling
/// it.
#[async_trait]
pub trait LocalItemStore<I>: Send + Sync
where
	I: SyncEntity + Send + 'static,
{
	/// Lists every locally known item, including soft-deleted rows, for use by the sync
	/// differ.
	async fn list(&self) -> Result<Vec<I>, VaultError>;

	/// Fetches a single item by name.
	async fn get_by_name(&self, name: &str) -> Result<I, VaultError>;

	/// Whether a row for `name` exists locally.
	async fn exists(&self, name: &str) -> Result<bool, VaultError>;

	/// Inserts a new row with the caller-provided version. Fails if a non-deleted row with
	/// the same name already exists.
	async fn create(&self, item: I) -> Result<(), VaultError>;

	/// Batched insert, used by bulk sync's `to_add` bucket.
	async fn create_many(&self, items: Vec<I>) -> Result<(), VaultError>;

	/// Blind overwrite of ciphertext/meta/version for `item`'s name.
	async fn update(&self, item: I) -> Result<(), VaultError>;

	/// Marks a row deleted in place.
	async fn soft_delete(&self, name: &str) -> Result<(), VaultError>;

	/// Physically removes a row, used after a successful server-side soft delete.
	async fn hard_delete(&self, name: &str) -> Result<(), VaultError>;
}
