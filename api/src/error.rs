use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

/// When a request to the vault fails, the response carries one of these error codes.
/// Refer to [`ErrorResponse`] docs for more information regarding each error code and
/// corresponding use-cases.
///
/// [`ErrorResponse`]: crate::types::ErrorResponse
#[derive(Debug)]
pub enum VaultError {
	/// The requested item or file does not exist.
	NoSuchItemError(String),

	/// The request was malformed or failed validation.
	InvalidRequestError(String),

	/// A write lost the last-writer-wins race: the caller's `version` was stale. Also used
	/// for file-upload exclusivity (`AlreadyUploading`).
	ConflictError(String),

	/// A create-only operation targeted something that already exists: the login used in
	/// `Register`, or an `insert`-style item/file name already claimed by this user.
	AlreadyExistsError(String),

	/// Credentials were missing, invalid, or did not authorize the requested item.
	AuthError(String),

	/// Something went wrong on the server that the caller cannot resolve by retrying as-is.
	InternalServerError(String),
}

impl Display for VaultError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			VaultError::NoSuchItemError(message) => {
				write!(f, "Requested item does not exist: {}", message)
			},
			VaultError::InvalidRequestError(message) => {
				write!(f, "Request was invalid: {}", message)
			},
			VaultError::ConflictError(message) => {
				write!(f, "Version conflict in write operation: {}", message)
			},
			VaultError::AlreadyExistsError(message) => {
				write!(f, "Resource already exists: {}", message)
			},
			VaultError::AuthError(message) => {
				write!(f, "Authentication or authorization failure: {}", message)
			},
			VaultError::InternalServerError(message) => {
				write!(f, "InternalServerError: {}", message)
			},
		}
	}
}

impl Error for VaultError {}

impl From<io::Error> for VaultError {
	fn from(err: io::Error) -> Self {
		VaultError::InternalServerError(err.to_string())
	}
}
