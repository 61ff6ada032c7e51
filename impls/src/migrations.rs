// APPEND-ONLY list of migration statements.
//
// Each statement is idempotent (`IF NOT EXISTS`) so `run` can be invoked on every server
// startup without a separate version-tracking table.
pub(crate) const MIGRATIONS: &[&str] = &[
	"CREATE TABLE IF NOT EXISTS users (
		id BIGSERIAL PRIMARY KEY,
		login character varying(255) NOT NULL UNIQUE,
		password_hash character varying(255) NOT NULL
	);",
	"CREATE TABLE IF NOT EXISTS passwords (
		user_id BIGINT NOT NULL REFERENCES users(id),
		name character varying(255) NOT NULL,
		encrypted_pass text NOT NULL,
		meta text NOT NULL DEFAULT '',
		version BIGINT NOT NULL,
		is_deleted boolean NOT NULL DEFAULT false,
		UNIQUE(user_id, name)
	);",
	"CREATE TABLE IF NOT EXISTS cards (
		user_id BIGINT NOT NULL REFERENCES users(id),
		name character varying(255) NOT NULL,
		cardholder_name text NOT NULL,
		number_encrypted text NOT NULL,
		cvv_encrypted text NOT NULL,
		expiration_date character varying(16) NOT NULL,
		meta text NOT NULL DEFAULT '',
		version BIGINT NOT NULL,
		is_deleted boolean NOT NULL DEFAULT false,
		UNIQUE(user_id, name)
	);",
	"CREATE TABLE IF NOT EXISTS files (
		user_id BIGINT NOT NULL REFERENCES users(id),
		bucket character varying(255) NOT NULL,
		name character varying(255) NOT NULL,
		size BIGINT NOT NULL DEFAULT 0,
		meta text NOT NULL DEFAULT '',
		upload_status smallint NOT NULL DEFAULT 0,
		is_deleted boolean NOT NULL DEFAULT false,
		UNIQUE(user_id, bucket, name)
	);",
];

/// Applies every statement in [`MIGRATIONS`], in order, against a fresh connection.
pub(crate) async fn run(client: &tokio_postgres::Client) -> Result<(), tokio_postgres::Error> {
	for statement in MIGRATIONS {
		client.batch_execute(statement).await?;
	}
	Ok(())
}
