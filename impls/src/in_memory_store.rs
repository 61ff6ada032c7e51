use api::error::VaultError;
use api::store::{FileStore, ItemStore, UpdateOutcome, UserStore};
use api::types::{CardItem, FileInfo, PasswordItem, UploadStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// An in-memory implementation of the server-side stores, for tests and local development
/// without a running Postgres instance.
///
/// Holds one map per item kind, keyed by `(user_id, name)` (files additionally key on
/// `bucket`); a single mutex per map stands in for the row locking
/// [`crate::postgres_store::PostgresStore`] gets from `SELECT ... FOR UPDATE`.
pub struct InMemoryStore {
	passwords: Mutex<HashMap<(i64, String), PasswordItem>>,
	cards: Mutex<HashMap<(i64, String), CardItem>>,
	files: Mutex<HashMap<(i64, String, String), FileInfo>>,
	users: Mutex<HashMap<String, (i64, String)>>,
	next_user_id: Mutex<i64>,
}

impl InMemoryStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self {
			passwords: Mutex::new(HashMap::new()),
			cards: Mutex::new(HashMap::new()),
			files: Mutex::new(HashMap::new()),
			users: Mutex::new(HashMap::new()),
			next_user_id: Mutex::new(1),
		}
	}
}

#[async_trait]
impl UserStore for InMemoryStore {
	async fn create_user(&self, login: &str, password: &str) -> Result<i64, VaultError> {
		let mut users = self.users.lock().await;
		if users.contains_key(login) {
			return Err(VaultError::AlreadyExistsError(format!("login {login} already taken")));
		}
		let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
			.map_err(|e| VaultError::InternalServerError(e.to_string()))?;
		let mut next_id = self.next_user_id.lock().await;
		let id = *next_id;
		*next_id += 1;
		users.insert(login.to_string(), (id, hash));
		Ok(id)
	}

	async fn verify_user(&self, login: &str, password: &str) -> Result<i64, VaultError> {
		let users = self.users.lock().await;
		let (id, hash) = users
			.get(login)
			.ok_or_else(|| VaultError::AuthError("invalid login or password".to_string()))?;
		if bcrypt::verify(password, hash).unwrap_or(false) {
			Ok(*id)
		} else {
			Err(VaultError::AuthError("invalid login or password".to_string()))
		}
	}
}

impl Default for InMemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl ItemStore<PasswordItem> for InMemoryStore {
	async fn update_by_name(
		&self, user_id: i64, name: &str,
		updater: Box<dyn FnOnce(Option<PasswordItem>) -> UpdateOutcome<PasswordItem> + Send>,
	) -> Result<UpdateOutcome<PasswordItem>, VaultError> {
		let mut guard = self.passwords.lock().await;
		let key = (user_id, name.to_string());
		let current = guard.get(&key).cloned();
		let outcome = updater(current);
		if let UpdateOutcome::Write(item) = &outcome {
			guard.insert(key, item.clone());
		}
		Ok(outcome)
	}

	async fn insert(&self, user_id: i64, item: PasswordItem) -> Result<(), VaultError> {
		let mut guard = self.passwords.lock().await;
		let key = (user_id, item.name.clone());
		if guard.get(&key).is_some_and(|existing| !existing.deleted) {
			return Err(VaultError::AlreadyExistsError(format!("item {} already exists", item.name)));
		}
		guard.insert(key, item);
		Ok(())
	}

	async fn list(&self, user_id: i64) -> Result<Vec<PasswordItem>, VaultError> {
		let guard = self.passwords.lock().await;
		Ok(guard
			.iter()
			.filter(|((uid, _), item)| *uid == user_id && !item.deleted)
			.map(|(_, item)| item.clone())
			.collect())
	}

	async fn soft_delete(&self, user_id: i64, name: &str) -> Result<(), VaultError> {
		let mut guard = self.passwords.lock().await;
		if let Some(item) = guard.get_mut(&(user_id, name.to_string())) {
			item.deleted = true;
		}
		Ok(())
	}
}

#[async_trait]
impl ItemStore<CardItem> for InMemoryStore {
	async fn update_by_name(
		&self, user_id: i64, name: &str,
		updater: Box<dyn FnOnce(Option<CardItem>) -> UpdateOutcome<CardItem> + Send>,
	) -> Result<UpdateOutcome<CardItem>, VaultError> {
		let mut guard = self.cards.lock().await;
		let key = (user_id, name.to_string());
		let current = guard.get(&key).cloned();
		let outcome = updater(current);
		if let UpdateOutcome::Write(item) = &outcome {
			guard.insert(key, item.clone());
		}
		Ok(outcome)
	}

	async fn insert(&self, user_id: i64, item: CardItem) -> Result<(), VaultError> {
		let mut guard = self.cards.lock().await;
		let key = (user_id, item.name.clone());
		if guard.get(&key).is_some_and(|existing| !existing.deleted) {
			return Err(VaultError::AlreadyExistsError(format!("item {} already exists", item.name)));
		}
		guard.insert(key, item);
		Ok(())
	}

	async fn list(&self, user_id: i64) -> Result<Vec<CardItem>, VaultError> {
		let guard = self.cards.lock().await;
		Ok(guard
			.iter()
			.filter(|((uid, _), item)| *uid == user_id && !item.deleted)
			.map(|(_, item)| item.clone())
			.collect())
	}

	async fn soft_delete(&self, user_id: i64, name: &str) -> Result<(), VaultError> {
		let mut guard = self.cards.lock().await;
		if let Some(item) = guard.get_mut(&(user_id, name.to_string())) {
			item.deleted = true;
		}
		Ok(())
	}
}

/// Sentinel `size` for a `pending` row that has never had a committed upload, matching
/// [`crate::postgres_store::PostgresStore`]'s use of the same value to tell "brand new" apart
/// from "re-upload of an existing file" without a separate restore-state table.
const NO_PRIOR_UPLOAD: i64 = -1;

#[async_trait]
impl FileStore for InMemoryStore {
	async fn begin_upload(
		&self, user_id: i64, bucket: &str, name: &str, meta: &str,
	) -> Result<(), VaultError> {
		let mut guard = self.files.lock().await;
		let key = (user_id, bucket.to_string(), name.to_string());
		if let Some(existing) = guard.get(&key) {
			if existing.upload_status == UploadStatus::Pending as i32 {
				return Err(VaultError::ConflictError(format!(
					"upload already in progress for {bucket}/{name}"
				)));
			}
			// Re-upload of a row that was `done`: leave size/meta untouched so abort_upload
			// can restore them; only flip the status.
			let file = guard.get_mut(&key).expect("just checked Some");
			file.upload_status = UploadStatus::Pending as i32;
			return Ok(());
		}
		guard.insert(
			key,
			FileInfo {
				name: name.to_string(),
				meta: meta.to_string(),
				version: 0,
				deleted: false,
				bucket: bucket.to_string(),
				size: NO_PRIOR_UPLOAD,
				upload_status: UploadStatus::Pending as i32,
			},
		);
		Ok(())
	}

	async fn complete_upload(
		&self, user_id: i64, bucket: &str, name: &str, size: i64, meta: &str,
	) -> Result<(), VaultError> {
		let mut guard = self.files.lock().await;
		if let Some(file) = guard.get_mut(&(user_id, bucket.to_string(), name.to_string())) {
			file.size = size;
			file.meta = meta.to_string();
			file.upload_status = UploadStatus::Done as i32;
		}
		Ok(())
	}

	async fn abort_upload(&self, user_id: i64, bucket: &str, name: &str) -> Result<(), VaultError> {
		let mut guard = self.files.lock().await;
		let key = (user_id, bucket.to_string(), name.to_string());
		let Some(file) = guard.get_mut(&key) else { return Ok(()) };
		if file.upload_status != UploadStatus::Pending as i32 {
			return Ok(());
		}
		if file.size == NO_PRIOR_UPLOAD {
			guard.remove(&key);
		} else {
			file.upload_status = UploadStatus::Done as i32;
		}
		Ok(())
	}

	async fn get(&self, user_id: i64, bucket: &str, name: &str) -> Result<FileInfo, VaultError> {
		let guard = self.files.lock().await;
		guard
			.get(&(user_id, bucket.to_string(), name.to_string()))
			.filter(|f| f.upload_status == UploadStatus::Done as i32 && !f.deleted)
			.cloned()
			.ok_or_else(|| VaultError::NoSuchItemError(format!("{bucket}/{name}")))
	}

	async fn list(&self, user_id: i64, bucket: &str) -> Result<Vec<FileInfo>, VaultError> {
		let guard = self.files.lock().await;
		Ok(guard
			.iter()
			.filter(|((uid, b, _), f)| {
				*uid == user_id
					&& b == bucket
					&& f.upload_status == UploadStatus::Done as i32
					&& !f.deleted
			})
			.map(|(_, f)| f.clone())
			.collect())
	}

	async fn soft_delete(&self, user_id: i64, bucket: &str, name: &str) -> Result<(), VaultError> {
		let mut guard = self.files.lock().await;
		if let Some(file) = guard.get_mut(&(user_id, bucket.to_string(), name.to_string())) {
			file.deleted = true;
		}
		Ok(())
	}

	async fn recover_pending_uploads(&self) -> Result<u64, VaultError> {
		let mut guard = self.files.lock().await;
		let mut resolved = 0u64;
		guard.retain(|_, f| {
			if f.upload_status != UploadStatus::Pending as i32 {
				return true;
			}
			resolved += 1;
			if f.size == NO_PRIOR_UPLOAD {
				false
			} else {
				f.upload_status = UploadStatus::Done as i32;
				true
			}
		});
		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use api::item::reconcile;
	use api::store::reconcile_push;
	use std::sync::Arc;

	fn password(name: &str, version: i64, deleted: bool) -> PasswordItem {
		PasswordItem { name: name.to_string(), meta: String::new(), version, deleted, value: "ct".to_string() }
	}

	#[tokio::test]
	async fn insert_then_update_by_name_reconciles_against_current_row() {
		let store = InMemoryStore::new();
		ItemStore::<PasswordItem>::insert(&store, 1, password("s1", 1, false)).await.unwrap();

		let incoming = password("s1", 2, false);
		let outcome = store
			.update_by_name(1, "s1", Box::new(move |current| reconcile_push(current, incoming)))
			.await
			.unwrap();
		assert!(matches!(outcome, UpdateOutcome::Write(ref item) if item.version == 2));

		let listed = ItemStore::<PasswordItem>::list(&store, 1).await.unwrap();
		assert_eq!(listed.len(), 1);
		assert_eq!(listed[0].version, 2);
	}

	#[tokio::test]
	async fn stale_push_is_rejected_as_a_conflict_and_leaves_the_row_untouched() {
		let store = InMemoryStore::new();
		ItemStore::<PasswordItem>::insert(&store, 1, password("s1", 2, false)).await.unwrap();

		let incoming = password("s1", 1, false);
		let outcome = store
			.update_by_name(1, "s1", Box::new(move |current| reconcile_push(current, incoming)))
			.await
			.unwrap();
		assert!(matches!(outcome, UpdateOutcome::Reject(_)));

		let listed = ItemStore::<PasswordItem>::list(&store, 1).await.unwrap();
		assert_eq!(listed[0].version, 2);
	}

	#[tokio::test]
	async fn concurrent_pushes_against_the_same_row_serialize_to_one_winner() {
		let store = Arc::new(InMemoryStore::new());
		ItemStore::<PasswordItem>::insert(&store, 1, password("s1", 1, false)).await.unwrap();

		let push = |store: Arc<InMemoryStore>| async move {
			let incoming = password("s1", 2, false);
			store.update_by_name(1, "s1", Box::new(move |current| reconcile_push(current, incoming))).await.unwrap()
		};
		let (a, b) = tokio::join!(push(Arc::clone(&store)), push(Arc::clone(&store)));

		let outcomes = [a, b];
		let writes = outcomes.iter().filter(|o| matches!(o, UpdateOutcome::Write(_))).count();
		let rejects = outcomes.iter().filter(|o| matches!(o, UpdateOutcome::Reject(_))).count();
		assert_eq!(writes, 1);
		assert_eq!(rejects, 1);

		let listed = ItemStore::<PasswordItem>::list(&store, 1).await.unwrap();
		assert_eq!(listed[0].version, 2);
	}

	#[tokio::test]
	async fn soft_deleted_row_still_participates_in_reconciliation_as_a_tombstone() {
		let store = InMemoryStore::new();
		ItemStore::<PasswordItem>::insert(&store, 1, password("s1", 1, false)).await.unwrap();
		ItemStore::<PasswordItem>::soft_delete(&store, 1, "s1").await.unwrap();

		assert!(ItemStore::<PasswordItem>::list(&store, 1).await.unwrap().is_empty());

		let recovered = password("s1", 2, false);
		let outcome = store
			.update_by_name(1, "s1", Box::new(move |current| reconcile_push(current, recovered)))
			.await
			.unwrap();
		assert!(matches!(outcome, UpdateOutcome::Write(ref item) if !item.deleted));
	}

	#[tokio::test]
	async fn file_upload_lifecycle_hides_pending_and_deleted_rows_from_list_and_get() {
		let store = InMemoryStore::new();
		store.begin_upload(1, "notes", "f1", "").await.unwrap();
		assert!(store.get(1, "notes", "f1").await.is_err());
		assert!(FileStore::list(&store, 1, "notes").await.unwrap().is_empty());

		store.complete_upload(1, "notes", "f1", 1024, "v1").await.unwrap();
		let info = store.get(1, "notes", "f1").await.unwrap();
		assert_eq!(info.size, 1024);

		store.soft_delete(1, "notes", "f1").await.unwrap();
		assert!(store.get(1, "notes", "f1").await.is_err());
	}

	#[tokio::test]
	async fn begin_upload_twice_while_pending_is_rejected() {
		let store = InMemoryStore::new();
		store.begin_upload(1, "notes", "f1", "").await.unwrap();
		assert!(store.begin_upload(1, "notes", "f1", "").await.is_err());
	}

	#[tokio::test]
	async fn aborted_reupload_restores_the_prior_committed_row_instead_of_losing_it() {
		let store = InMemoryStore::new();
		store.begin_upload(1, "notes", "f1", "v1").await.unwrap();
		store.complete_upload(1, "notes", "f1", 1024, "v1").await.unwrap();

		store.begin_upload(1, "notes", "f1", "v2").await.unwrap();
		store.abort_upload(1, "notes", "f1").await.unwrap();

		let info = store.get(1, "notes", "f1").await.unwrap();
		assert_eq!(info.size, 1024);
		assert_eq!(info.meta, "v1");
	}

	#[tokio::test]
	async fn aborted_upload_of_a_brand_new_file_leaves_no_row_behind() {
		let store = InMemoryStore::new();
		store.begin_upload(1, "notes", "f1", "v1").await.unwrap();
		store.abort_upload(1, "notes", "f1").await.unwrap();

		assert!(store.get(1, "notes", "f1").await.is_err());
		store.begin_upload(1, "notes", "f1", "v2").await.unwrap();
	}

	#[tokio::test]
	async fn recover_pending_uploads_clears_stuck_rows_and_unblocks_retry() {
		let store = InMemoryStore::new();
		store.begin_upload(1, "notes", "f1", "").await.unwrap();
		store.begin_upload(1, "notes", "f2", "").await.unwrap();
		store.complete_upload(1, "notes", "f2", 10, "").await.unwrap();

		let cleared = store.recover_pending_uploads().await.unwrap();
		assert_eq!(cleared, 1);

		store.begin_upload(1, "notes", "f1", "").await.unwrap();
		assert!(store.get(1, "notes", "f2").await.is_ok());
	}

	#[tokio::test]
	async fn recover_pending_uploads_restores_a_stuck_reupload_to_its_prior_state() {
		let store = InMemoryStore::new();
		store.begin_upload(1, "notes", "f1", "v1").await.unwrap();
		store.complete_upload(1, "notes", "f1", 1024, "v1").await.unwrap();
		store.begin_upload(1, "notes", "f1", "v2").await.unwrap();

		let resolved = store.recover_pending_uploads().await.unwrap();
		assert_eq!(resolved, 1);

		let info = store.get(1, "notes", "f1").await.unwrap();
		assert_eq!(info.size, 1024);
		assert_eq!(info.meta, "v1");
	}

	#[tokio::test]
	async fn duplicate_login_is_rejected_and_correct_password_verifies() {
		let store = InMemoryStore::new();
		let id = UserStore::create_user(&store, "alice", "hunter2").await.unwrap();
		assert!(UserStore::create_user(&store, "alice", "different").await.is_err());

		assert_eq!(UserStore::verify_user(&store, "alice", "hunter2").await.unwrap(), id);
		assert!(UserStore::verify_user(&store, "alice", "wrong").await.is_err());
		assert!(UserStore::verify_user(&store, "nobody", "hunter2").await.is_err());
	}

	#[test]
	fn reconcile_is_reused_directly_by_reconcile_push() {
		let current = password("s1", 1, false);
		let incoming = password("s1", 2, false);
		match reconcile(current, incoming) {
			api::item::Reconciliation::Winner(w) => assert_eq!(w.version, 2),
			api::item::Reconciliation::Conflict(_) => panic!("expected a winner"),
		}
	}
}
