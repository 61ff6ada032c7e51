//! Hosts an [`Authorizer`] implementation backed by HS256 JWTs.
//!
//! [`Authorizer`]: api::auth::Authorizer

use api::auth::{AuthResponse, Authorizer};
use api::error::VaultError;
use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
	/// The authenticated user's id, as a string (the registered `sub` claim is
	/// string-typed).
	sub: String,
	/// Unix timestamp the token expires at.
	exp: u64,
}

/// Issues and verifies bearer tokens for the vault's login/password auth boundary.
///
/// A single symmetric secret signs and verifies every token; there is no per-user signing
/// key or key rotation. The client attaches the issued token as
/// `authorization: bearer <token>` on every call after `Register`/`Login`.
pub struct JwtAuthorizer {
	secret: Vec<u8>,
	ttl: Duration,
}

impl JwtAuthorizer {
	/// Creates an authorizer signing and verifying with `secret`, issuing tokens valid for
	/// `ttl` from the moment they are issued.
	pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
		Self { secret: secret.into(), ttl }
	}

	/// Issues a bearer token asserting `user_id`, for `Register`/`Login` to return to the
	/// client.
	pub fn issue(&self, user_id: i64) -> Result<String, VaultError> {
		let now = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_err(|e| VaultError::InternalServerError(e.to_string()))?;
		let claims = Claims { sub: user_id.to_string(), exp: (now + self.ttl).as_secs() };
		encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(&self.secret))
			.map_err(|e| VaultError::InternalServerError(e.to_string()))
	}
}

#[async_trait]
impl Authorizer for JwtAuthorizer {
	async fn verify(&self, headers_map: &HashMap<String, String>) -> Result<AuthResponse, VaultError> {
		let header = headers_map
			.get("authorization")
			.ok_or_else(|| VaultError::AuthError("missing authorization header".to_string()))?;
		let token = header
			.strip_prefix("bearer ")
			.or_else(|| header.strip_prefix("Bearer "))
			.ok_or_else(|| {
				VaultError::AuthError("authorization header is not a bearer token".to_string())
			})?;

		let mut validation = Validation::new(Algorithm::HS256);
		validation.leeway = 0;
		let data = decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
			.map_err(|e| VaultError::AuthError(format!("invalid token: {e}")))?;

		let user_id = data
			.claims
			.sub
			.parse::<i64>()
			.map_err(|e| VaultError::AuthError(format!("malformed subject claim: {e}")))?;
		Ok(AuthResponse { user_id })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn headers(token: &str) -> HashMap<String, String> {
		let mut map = HashMap::new();
		map.insert("authorization".to_string(), format!("bearer {token}"));
		map
	}

	#[tokio::test]
	async fn issued_token_verifies_back_to_the_same_user_id() {
		let auth = JwtAuthorizer::new(b"test-secret".to_vec(), Duration::from_secs(3600));
		let token = auth.issue(42).unwrap();
		let response = auth.verify(&headers(&token)).await.unwrap();
		assert_eq!(response.user_id, 42);
	}

	#[tokio::test]
	async fn token_signed_with_a_different_secret_is_rejected() {
		let issuer = JwtAuthorizer::new(b"secret-a".to_vec(), Duration::from_secs(3600));
		let verifier = JwtAuthorizer::new(b"secret-b".to_vec(), Duration::from_secs(3600));
		let token = issuer.issue(1).unwrap();
		assert!(matches!(verifier.verify(&headers(&token)).await, Err(VaultError::AuthError(_))));
	}

	#[tokio::test]
	async fn expired_token_is_rejected() {
		let auth = JwtAuthorizer::new(b"test-secret".to_vec(), Duration::from_secs(0));
		let token = auth.issue(1).unwrap();
		tokio::time::sleep(Duration::from_millis(1100)).await;
		assert!(matches!(auth.verify(&headers(&token)).await, Err(VaultError::AuthError(_))));
	}

	#[tokio::test]
	async fn missing_authorization_header_is_rejected() {
		let auth = JwtAuthorizer::new(b"test-secret".to_vec(), Duration::from_secs(3600));
		assert!(matches!(auth.verify(&HashMap::new()).await, Err(VaultError::AuthError(_))));
	}
}
