//! The local agent's single-user session: who is logged in, and the bearer token and
//! master-passphrase hash that go with it.

/// The local agent's notion of "who is logged in", persisted in the `session` table.
///
/// Tracks three keys (`login`, `master_password`, `auth_token`) rather than a richer user
/// record, since the local agent has exactly one logged-in identity at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSession {
	/// The login last used to register or log in.
	pub login: String,
	/// The bcrypt hash of the master passphrase, used to validate a user-entered passphrase
	/// offline before deriving the encryption key from it.
	pub master_password_hash: String,
	/// The bearer token attached to outgoing RPCs. Empty if never logged in.
	pub auth_token: String,
}

impl ClientSession {
	/// Whether a session has been established at all (as opposed to the zero-value default
	/// returned when no row exists yet).
	pub fn is_present(&self) -> bool {
		!self.login.is_empty()
	}
}
