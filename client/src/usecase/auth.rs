//! Registration, login, and offline master-passphrase validation.
//!
//! The master passphrase itself never leaves the device: `Register`/`Login` send the
//! account *password* to the server and get a bearer token back, while the passphrase is
//! hashed with `bcrypt` and kept only locally, so [`validate_master_passphrase`] can confirm
//! a user-entered passphrase before [`vault_crypto::Key::derive`] is used to decrypt
//! anything, without another round trip to the server.

use bcrypt::DEFAULT_COST;

use crate::error::ClientError;
use crate::local_store::SqliteStore;
use crate::rpc::RpcClient;
use crate::session::ClientSession;

/// Registers a new account, then stores the issued session locally.
pub async fn register(
	local: &SqliteStore, rpc: &RpcClient, login: &str, password: &str, master_passphrase: &str,
) -> Result<(), ClientError> {
	let resp = rpc.register(login, password).await?;
	save_session(local, login, master_passphrase, &resp.token).await
}

/// Logs into an existing account, then stores the issued session locally.
pub async fn login(
	local: &SqliteStore, rpc: &RpcClient, login_name: &str, password: &str, master_passphrase: &str,
) -> Result<(), ClientError> {
	let resp = rpc.login(login_name, password).await?;
	save_session(local, login_name, master_passphrase, &resp.token).await
}

async fn save_session(
	local: &SqliteStore, login: &str, master_passphrase: &str, auth_token: &str,
) -> Result<(), ClientError> {
	let hash = bcrypt::hash(master_passphrase, DEFAULT_COST)
		.map_err(|e| ClientError::Transport(format!("hashing master passphrase failed: {e}")))?;
	local
		.set_session(&ClientSession {
			login: login.to_string(),
			master_password_hash: hash,
			auth_token: auth_token.to_string(),
		})
		.await
}

/// Confirms `master_passphrase` against the hash saved at the last `register`/`login`,
/// without needing the server reachable.
pub async fn validate_master_passphrase(
	local: &SqliteStore, master_passphrase: &str,
) -> Result<(), ClientError> {
	let session = local.get_session().await?;
	if session.master_password_hash.is_empty() {
		return Err(ClientError::NoSession);
	}
	let matches = bcrypt::verify(master_passphrase, &session.master_password_hash)
		.map_err(|e| ClientError::Transport(format!("verifying master passphrase failed: {e}")))?;
	if matches {
		Ok(())
	} else {
		Err(ClientError::WrongMasterPassphrase)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn validating_without_a_prior_session_fails_with_no_session() {
		let local = SqliteStore::open_in_memory().await.unwrap();
		let err = validate_master_passphrase(&local, "anything").await.unwrap_err();
		assert!(matches!(err, ClientError::NoSession));
	}

	#[tokio::test]
	async fn saved_session_validates_the_same_passphrase_and_rejects_others() {
		let local = SqliteStore::open_in_memory().await.unwrap();
		save_session(&local, "alice", "correct horse battery staple", "token-123").await.unwrap();

		validate_master_passphrase(&local, "correct horse battery staple").await.unwrap();
		let err = validate_master_passphrase(&local, "wrong guess").await.unwrap_err();
		assert!(matches!(err, ClientError::WrongMasterPassphrase));
	}
}
