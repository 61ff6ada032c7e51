/// The contract every syncable item kind (`Password`, `Card`, `File`) satisfies.
///
/// The reconciler in this module is generic over `SyncEntity`; it never inspects the kind's
/// own fields, only its version and tombstone state.
pub trait SyncEntity {
	/// The item's monotone version.
	fn version(&self) -> i64;

	/// Whether the item is a (soft-deleted) tombstone.
	fn is_deleted(&self) -> bool;
}

/// The kind of conflict a reconciliation attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
	/// Both sides have independently moved past a common version; neither is a tombstone.
	Diff,
	/// The authoritative side is a tombstone at or ahead of the incoming write.
	Deleted,
}

/// A rejected write: the authoritative item is returned alongside the rejected write, so the
/// caller can show both and ask the user to resolve.
#[derive(Debug, Clone)]
pub struct Conflict<T> {
	/// The kind of conflict.
	pub kind: ConflictKind,
	/// The current authoritative item.
	pub actual: T,
	/// The item whose write was rejected.
	pub incoming: T,
}

/// The result of attempting to reconcile an incoming write against the current authoritative
/// item.
#[derive(Debug, Clone)]
pub enum Reconciliation<T> {
	/// The incoming item wins outright; the caller should write it.
	Winner(T),
	/// The write was rejected; the caller should surface the conflict.
	Conflict(Conflict<T>),
}

/// Decides whether `incoming` may overwrite `current`, per the table:
///
/// | `current.deleted` | version comparison | outcome |
/// |---|---|---|
/// | false | `incoming.version > current.version` | winner = `incoming` |
/// | false | `incoming.version <= current.version` | diff conflict |
/// | true  | `incoming.version > current.version` | winner = `incoming` (recover) |
/// | true  | `incoming.version <= current.version` | deleted conflict |
///
/// Equal versions are always a conflict: two independent edits from the same base must never be
/// silently resolved in either direction.
pub fn reconcile<T: SyncEntity>(current: T, incoming: T) -> Reconciliation<T> {
	if incoming.version() > current.version() {
		return Reconciliation::Winner(incoming);
	}
	let kind = if current.is_deleted() { ConflictKind::Deleted } else { ConflictKind::Diff };
	Reconciliation::Conflict(Conflict { kind, actual: current, incoming })
}

impl SyncEntity for crate::types::PasswordItem {
	fn version(&self) -> i64 {
		self.version
	}
	fn is_deleted(&self) -> bool {
		self.deleted
	}
}

impl SyncEntity for crate::types::CardItem {
	fn version(&self) -> i64 {
		self.version
	}
	fn is_deleted(&self) -> bool {
		self.deleted
	}
}

impl From<ConflictKind> for crate::types::ItemConflictKind {
	fn from(kind: ConflictKind) -> Self {
		match kind {
			ConflictKind::Diff => crate::types::ItemConflictKind::Diff,
			ConflictKind::Deleted => crate::types::ItemConflictKind::Deleted,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, Clone, PartialEq, Eq)]
	struct Fake {
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

	fn item(version: i64, deleted: bool) -> Fake {
		Fake { version, deleted }
	}

	#[test]
	fn incoming_strictly_ahead_wins_when_not_deleted() {
		let result = reconcile(item(1, false), item(2, false));
		assert!(matches!(result, Reconciliation::Winner(Fake { version: 2, deleted: false })));
	}

	#[test]
	fn equal_versions_are_a_diff_conflict_not_a_silent_overwrite() {
		let result = reconcile(item(2, false), item(2, false));
		match result {
			Reconciliation::Conflict(c) => assert_eq!(c.kind, ConflictKind::Diff),
			other => panic!("expected conflict, got {other:?}"),
		}
	}

	#[test]
	fn stale_incoming_is_a_diff_conflict() {
		let result = reconcile(item(5, false), item(3, false));
		match result {
			Reconciliation::Conflict(c) => {
				assert_eq!(c.kind, ConflictKind::Diff);
				assert_eq!(c.actual.version, 5);
				assert_eq!(c.incoming.version, 3);
			},
			other => panic!("expected conflict, got {other:?}"),
		}
	}

	#[test]
	fn incoming_ahead_of_tombstone_recovers() {
		let result = reconcile(item(2, true), item(3, false));
		assert!(matches!(result, Reconciliation::Winner(Fake { version: 3, deleted: false })));
	}

	#[test]
	fn incoming_not_ahead_of_tombstone_is_deleted_conflict() {
		let result = reconcile(item(2, true), item(1, false));
		match result {
			Reconciliation::Conflict(c) => assert_eq!(c.kind, ConflictKind::Deleted),
			other => panic!("expected conflict, got {other:?}"),
		}
	}

	#[test]
	fn equal_version_against_tombstone_is_deleted_conflict() {
		let result = reconcile(item(2, true), item(2, false));
		match result {
			Reconciliation::Conflict(c) => assert_eq!(c.kind, ConflictKind::Deleted),
			other => panic!("expected conflict, got {other:?}"),
		}
	}
}
