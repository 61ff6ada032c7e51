// APPEND-ONLY list of migration statements, mirroring `impls::migrations`'s shape but against
// the local SQLite cache rather than the server's PostgreSQL schema.
pub(crate) const MIGRATIONS: &[&str] = &[
	"CREATE TABLE IF NOT EXISTS session (
		key text PRIMARY KEY,
		value text NOT NULL
	);",
	"CREATE TABLE IF NOT EXISTS passwords (
		name text PRIMARY KEY,
		encrypted_pass text NOT NULL,
		meta text NOT NULL DEFAULT '',
		version INTEGER NOT NULL,
		is_deleted INTEGER NOT NULL DEFAULT 0
	);",
	"CREATE TABLE IF NOT EXISTS cards (
		name text PRIMARY KEY,
		cardholder_name text NOT NULL,
		number_encrypted text NOT NULL,
		cvv_encrypted text NOT NULL,
		expiration_date text NOT NULL,
		meta text NOT NULL DEFAULT '',
		version INTEGER NOT NULL,
		is_deleted INTEGER NOT NULL DEFAULT 0
	);",
	"CREATE TABLE IF NOT EXISTS files (
		bucket text NOT NULL,
		name text NOT NULL,
		size INTEGER NOT NULL DEFAULT 0,
		meta text NOT NULL DEFAULT '',
		upload_status INTEGER NOT NULL DEFAULT 0,
		is_deleted INTEGER NOT NULL DEFAULT 0,
		PRIMARY KEY (bucket, name)
	);",
];

/// Applies every statement in [`MIGRATIONS`], in order, against a fresh connection.
pub(crate) fn run(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
	for statement in MIGRATIONS {
		conn.execute_batch(statement)?;
	}
	Ok(())
}
