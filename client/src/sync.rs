//! Bulk reconciliation between a server's `GetList` response and the local SQLite mirror.
//!
//! Splits the two lists into three buckets — add, update, push — then applies all three
//! concurrently, funneling every bucket's outcome into one [`SyncReport`]. Item-kind-specific
//! concerns (which RPC call pushes a conflict, how a [`PasswordConflict`]/[`CardConflict`]
//! turns into a generic [`Conflict`]) stay in the usecase modules that call into here; this
//! module only knows about [`SyncEntity`] and [`LocalItemStore`].
//!
//! [`PasswordConflict`]: api::types::PasswordConflict
//! [`CardConflict`]: api::types::CardConflict

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;

use api::item::{Conflict, SyncEntity};
use api::store::LocalItemStore;

use crate::error::ClientError;

/// Which bucket a server/local item landed in for one bulk-sync round, per the table: names
/// present only on the server are `to_add`; names on both sides where the server is strictly
/// ahead are `to_update`; names present only locally, or tied/ahead locally with differing
/// content, are `to_sync`.
pub struct SyncPlan<I> {
	/// Present on the server, absent locally.
	pub to_add: Vec<I>,
	/// Present on both sides, server strictly ahead.
	pub to_update: Vec<I>,
	/// Present only locally, or locally ahead/tied-but-different: pushed to the server.
	pub to_sync: Vec<I>,
}

/// Splits `server_items`/`local_items` into the three buckets [`apply_plan`] applies
/// concurrently. `name_of` extracts the per-kind stable name field, since [`SyncEntity`]
/// itself only exposes version/tombstone state. `content_eq` decides whether two
/// tied-version items are the same edit: per spec this comparison ignores `deleted` (the
/// tombstone flag is settled by the version/conflict algebra elsewhere, not by this diff),
/// so it must compare `name`/`meta`/value-bearing fields only, never the derived
/// `PartialEq` a wire type carries (which includes `deleted` and would wrongly route a
/// tied, content-identical item whose only difference is its tombstone flag into `to_sync`).
pub fn plan_sync<I, F, E>(server_items: Vec<I>, local_items: Vec<I>, name_of: F, content_eq: E) -> SyncPlan<I>
where
	I: SyncEntity + Clone,
	F: Fn(&I) -> &str,
	E: Fn(&I, &I) -> bool,
{
	let server_by_name: HashMap<&str, &I> = server_items.iter().map(|i| (name_of(i), i)).collect();
	let local_by_name: HashMap<&str, &I> = local_items.iter().map(|i| (name_of(i), i)).collect();

	let mut to_add = Vec::new();
	let mut to_update = Vec::new();
	for server_item in &server_items {
		match local_by_name.get(name_of(server_item)) {
			None => to_add.push(server_item.clone()),
			Some(local_item) if server_item.version() > local_item.version() => {
				to_update.push(server_item.clone())
			},
			Some(_) => {},
		}
	}

	let mut to_sync = Vec::new();
	for local_item in &local_items {
		match server_by_name.get(name_of(local_item)) {
			None => to_sync.push(local_item.clone()),
			Some(server_item) => {
				let locally_ahead = local_item.version() > server_item.version();
				let tied_but_different = local_item.version() == server_item.version()
					&& !content_eq(local_item, server_item);
				if locally_ahead || tied_but_different {
					to_sync.push(local_item.clone());
				}
			},
		}
	}

	SyncPlan { to_add, to_update, to_sync }
}

/// What happened after pushing one `to_sync` item to the server.
pub enum PushOutcome<I> {
	/// The server accepted the local item as-is; nothing further to apply locally.
	Accepted,
	/// The server's authoritative item won instead, surfaced for interactive resolution.
	Conflict(Conflict<I>),
}

/// Per-bucket counts plus every conflict and non-conflict error collected while applying a
/// [`SyncPlan`]. Conflicts are returned rather than resolved: the caller decides, per
/// spec, after the concurrent phase has fully drained.
pub struct SyncReport<I> {
	/// Rows inserted locally via the batched `to_add` write.
	pub added: usize,
	/// Rows overwritten locally from a strictly-ahead server item.
	pub updated: usize,
	/// Rows the server accepted as pushed.
	pub synced: usize,
	/// Rejected pushes, each carrying the server's authoritative item.
	pub conflicts: Vec<Conflict<I>>,
	/// Local-store or transport failures encountered along the way; these are not
	/// conflicts and should be retried rather than resolved interactively.
	pub errors: Vec<ClientError>,
}

impl<I> Default for SyncReport<I> {
	fn default() -> Self {
		Self {
			added: 0,
			updated: 0,
			synced: 0,
			conflicts: Vec::new(),
			errors: Vec::new(),
		}
	}
}

enum TaskOutcome<I> {
	Updated,
	Synced,
	Conflicted(Conflict<I>),
}

/// Applies `plan`'s three buckets concurrently: `to_add` as one batched local insert,
/// `to_update` as independent local overwrites, `to_sync` as independent `push` calls
/// followed by nothing further on success (the pushed item already matches what's stored
/// locally) or a surfaced conflict on rejection.
///
/// `push` is supplied by the caller so this function never has to know whether it's
/// reconciling passwords, cards, or any other [`SyncEntity`] kind.
pub async fn apply_plan<I, L, P, Fut>(local: Arc<L>, plan: SyncPlan<I>, push: P) -> SyncReport<I>
where
	I: SyncEntity + Clone + Send + Sync + 'static,
	L: LocalItemStore<I> + ?Sized + 'static,
	P: Fn(I) -> Fut + Send + Sync + Clone + 'static,
	Fut: Future<Output = Result<PushOutcome<I>, ClientError>> + Send,
{
	let mut report = SyncReport::default();

	let to_add_count = plan.to_add.len();
	if to_add_count > 0 {
		match local.create_many(plan.to_add).await {
			Ok(()) => report.added = to_add_count,
			Err(e) => report.errors.push(ClientError::Server(e)),
		}
	}

	let mut joins: JoinSet<Result<TaskOutcome<I>, ClientError>> = JoinSet::new();

	for item in plan.to_update {
		let local = Arc::clone(&local);
		joins.spawn(async move {
			local.update(item).await.map(|_| TaskOutcome::Updated).map_err(ClientError::Server)
		});
	}

	for item in plan.to_sync {
		let push = push.clone();
		joins.spawn(async move {
			match push(item).await? {
				PushOutcome::Accepted => Ok(TaskOutcome::Synced),
				PushOutcome::Conflict(conflict) => Ok(TaskOutcome::Conflicted(conflict)),
			}
		});
	}

	while let Some(joined) = joins.join_next().await {
		match joined {
			Ok(Ok(TaskOutcome::Updated)) => report.updated += 1,
			Ok(Ok(TaskOutcome::Synced)) => report.synced += 1,
			Ok(Ok(TaskOutcome::Conflicted(conflict))) => report.conflicts.push(conflict),
			Ok(Err(e)) => report.errors.push(e),
			Err(join_err) => report.errors.push(ClientError::Transport(join_err.to_string())),
		}
	}

	report
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, Clone, PartialEq, Eq)]
	struct Fake {
		name: &'static str,
		value: &'static str,
		version: i64,
		deleted: bool,
	}

	impl SyncEntity for Fake {
		fn version(&self) -> i64 {
			self.version
		}
		fn is_deleted(&self) -> bool {
			self.deleted
		}
	}

	fn name_of(f: &Fake) -> &str {
		f.name
	}

	fn content_eq(a: &Fake, b: &Fake) -> bool {
		a.name == b.name && a.value == b.value
	}

	#[test]
	fn splits_three_buckets_per_the_bulk_sync_scenario() {
		let server = vec![Fake { name: "a", value: "1", version: 1, deleted: false }, Fake {
			name: "b",
			value: "1",
			version: 2,
			deleted: false,
		}];
		let local = vec![Fake { name: "a", value: "1", version: 1, deleted: false }, Fake {
			name: "c",
			value: "1",
			version: 1,
			deleted: false,
		}];

		let plan = plan_sync(server, local, name_of, content_eq);
		assert_eq!(plan.to_add.iter().map(|i| i.name).collect::<Vec<_>>(), vec!["b"]);
		assert!(plan.to_update.is_empty());
		assert_eq!(plan.to_sync.iter().map(|i| i.name).collect::<Vec<_>>(), vec!["c"]);
	}

	#[test]
	fn tied_version_with_different_content_goes_to_sync_not_update() {
		let server = vec![Fake { name: "a", value: "x", version: 2, deleted: false }];
		let local = vec![Fake { name: "a", value: "y", version: 2, deleted: false }];

		let plan = plan_sync(server, local, name_of, content_eq);
		assert!(plan.to_add.is_empty());
		assert!(plan.to_update.is_empty());
		assert_eq!(plan.to_sync.len(), 1);
	}

	#[test]
	fn tied_version_differing_only_in_deleted_flag_is_not_pushed_again() {
		let server = vec![Fake { name: "a", value: "x", version: 2, deleted: false }];
		let local = vec![Fake { name: "a", value: "x", version: 2, deleted: true }];

		let plan = plan_sync(server, local, name_of, content_eq);
		assert!(plan.to_add.is_empty());
		assert!(plan.to_update.is_empty());
		assert!(plan.to_sync.is_empty());
	}

	#[test]
	fn server_strictly_ahead_is_a_local_overwrite() {
		let server = vec![Fake { name: "a", value: "1", version: 5, deleted: false }];
		let local = vec![Fake { name: "a", value: "1", version: 1, deleted: false }];

		let plan = plan_sync(server, local, name_of, content_eq);
		assert!(plan.to_add.is_empty());
		assert_eq!(plan.to_update.len(), 1);
		assert!(plan.to_sync.is_empty());
	}
}
