use crate::error::VaultError;
use async_trait::async_trait;
use std::collections::HashMap;

/// Response returned by an [`Authorizer`] for an authenticated and authorized request.
#[derive(Debug, Clone)]
pub struct AuthResponse {
	/// The numeric id of the authenticated user, threaded through to the item store so rows are
	/// scoped to their owner.
	pub user_id: i64,
}

/// Interface for the authorizer that runs before every request.
///
/// Server-side this verifies a bearer JWT and extracts its `sub` claim; see `auth-impls` for the
/// concrete implementation.
#[async_trait]
pub trait Authorizer: Send + Sync {
	/// Verifies authentication and authorization based on request headers.
	/// Returns [`AuthResponse`] for an authenticated and authorized user or [`VaultError::AuthError`]
	/// for an unauthorized request.
	async fn verify(&self, headers_map: &HashMap<String, String>)
		-> Result<AuthResponse, VaultError>;
}

/// A no-operation authorizer which lets any request through as a fixed user id.
///
/// Useful for local development and for the in-memory backend's test suite.
pub struct NoopAuthorizer {}

const UNAUTHENTICATED_USER_ID: i64 = 0;

#[async_trait]
impl Authorizer for NoopAuthorizer {
	async fn verify(
		&self, _headers_map: &HashMap<String, String>,
	) -> Result<AuthResponse, VaultError> {
		Ok(AuthResponse { user_id: UNAUTHENTICATED_USER_ID })
	}
}
