/// A request or response body that carries no fields, used for calls with nothing to send
/// (e.g. `GetList` for passwords and cards).
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Empty {}

/// Request payload for the `Register` call.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterRequest {
	/// The login the new user will authenticate with. Must be unique.
	#[prost(string, tag = "1")]
	pub login: ::prost::alloc::string::String,
	/// The plaintext password, hashed server-side before storage.
	#[prost(string, tag = "2")]
	pub password: ::prost::alloc::string::String,
}
/// Request payload for the `Login` call.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LoginRequest {
	/// The previously registered login.
	#[prost(string, tag = "1")]
	pub login: ::prost::alloc::string::String,
	/// The plaintext password, checked against the stored hash.
	#[prost(string, tag = "2")]
	pub password: ::prost::alloc::string::String,
}
/// Server response for `Register` and `Login`.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthTokenResponse {
	/// A JWT bearing `sub = userID`, attached by the client as
	/// `authorization: bearer <token>` on every subsequent call.
	#[prost(string, tag = "1")]
	pub token: ::prost::alloc::string::String,
}

/// A password item. `value` is AEAD-ciphertext of the secret, base64-encoded.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PasswordItem {
	/// Unique per (user, kind); identifies the item over its whole lifetime, including
	/// after soft delete.
	#[prost(string, tag = "1")]
	pub name: ::prost::alloc::string::String,
	/// Plaintext metadata, not encrypted; free-form client annotation.
	#[prost(string, tag = "2")]
	pub meta: ::prost::alloc::string::String,
	/// Monotone non-decreasing per name. A mutation always writes a version strictly
	/// greater than the prior one it observed on the authoritative side.
	#[prost(int64, tag = "3")]
	pub version: i64,
	/// True for a tombstone. The only valid follow-on mutation is a recover with a
	/// strictly greater version.
	#[prost(bool, tag = "4")]
	pub deleted: bool,
	/// `base64(nonce || aead_seal(key, nonce, plaintext))`.
	#[prost(string, tag = "5")]
	pub value: ::prost::alloc::string::String,
}

/// A payment card item. `number` and `cvv` are AEAD-ciphertext, base64-encoded;
/// `cardholder_name` and `expiration_date` are plaintext by design (low sensitivity,
/// needed for unencrypted display and sorting).
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CardItem {
	/// Unique per (user, kind).
	#[prost(string, tag = "1")]
	pub name: ::prost::alloc::string::String,
	/// Plaintext metadata.
	#[prost(string, tag = "2")]
	pub meta: ::prost::alloc::string::String,
	/// Monotone non-decreasing per name.
	#[prost(int64, tag = "3")]
	pub version: i64,
	/// True for a tombstone.
	#[prost(bool, tag = "4")]
	pub deleted: bool,
	/// Plaintext; the name printed on the card.
	#[prost(string, tag = "5")]
	pub cardholder_name: ::prost::alloc::string::String,
	/// `base64(nonce || aead_seal(key, nonce, plaintext))` of the card number.
	#[prost(string, tag = "6")]
	pub number: ::prost::alloc::string::String,
	/// `base64(nonce || aead_seal(key, nonce, plaintext))` of the CVV.
	#[prost(string, tag = "7")]
	pub cvv: ::prost::alloc::string::String,
	/// Plaintext, `MM/YY`.
	#[prost(string, tag = "8")]
	pub expiration_date: ::prost::alloc::string::String,
}

/// Metadata for a file ("note"). The blob contents are fetched separately via `Download`.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileInfo {
	/// Unique per (user, bucket).
	#[prost(string, tag = "1")]
	pub name: ::prost::alloc::string::String,
	/// Plaintext metadata.
	#[prost(string, tag = "2")]
	pub meta: ::prost::alloc::string::String,
	/// Unused: files are not part of the version/conflict reconciliation that passwords and
	/// cards go through. Kept so `FileInfo` shares a shape with the other item kinds; always
	/// `0` on the wire.
	#[prost(int64, tag = "3")]
	pub version: i64,
	/// Always `false`; a file's lifecycle is tracked by `upload_status` and the server-side
	/// `is_deleted` column, not a tombstone-via-conflict-algebra the way passwords and cards
	/// are.
	#[prost(bool, tag = "4")]
	pub deleted: bool,
	/// Logical namespace the file lives under, e.g. `"notes"`.
	#[prost(string, tag = "5")]
	pub bucket: ::prost::alloc::string::String,
	/// Size in bytes of the client-encrypted blob. Undefined while `upload_status` is
	/// `pending`.
	#[prost(int64, tag = "6")]
	pub size: i64,
	/// `UploadStatus::Done` once the blob-store write has committed.
	#[prost(enumeration = "UploadStatus", tag = "7")]
	pub upload_status: i32,
}

/// The lifecycle state of a file's blob-store write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum UploadStatus {
	/// The row has been upserted but the blob-store PUT has not yet committed. Readers
	/// filtering for `Done` skip these rows; only one may exist per (user, bucket, name).
	Pending = 0,
	/// The blob-store write committed; `size` is authoritative.
	Done = 1,
}
impl UploadStatus {
	/// String value of the enum field names used in the wire definition.
	pub fn as_str_name(&self) -> &'static str {
		match self {
			UploadStatus::Pending => "PENDING",
			UploadStatus::Done => "DONE",
		}
	}
	/// Creates an enum from field names used in the wire definition.
	pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
		match value {
			"PENDING" => Some(Self::Pending),
			"DONE" => Some(Self::Done),
			_ => None,
		}
	}
}

/// The kind of conflict carried by a rejected `Sync` response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ItemConflictKind {
	/// Both sides have independently moved past a common version; neither is a tombstone.
	Diff = 0,
	/// The authoritative side is a tombstone at or ahead of the incoming write.
	Deleted = 1,
}

/// Request payload for `Sync` against the password store.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncPasswordRequest {
	/// The item the client wishes to write. If no row exists yet for `item.name`, the
	/// server inserts it unconditionally and returns success.
	#[prost(message, optional, tag = "1")]
	pub item: ::core::option::Option<PasswordItem>,
}
/// Server response for `Sync` against the password store.
///
/// Conflicts are returned in-band here, never as RPC errors: they are an expected business
/// outcome of an offline edit racing another writer, not an infrastructure failure.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncPasswordResponse {
	/// True if the write committed.
	#[prost(bool, tag = "1")]
	pub success: bool,
	/// Present iff `success` is false; the authoritative item and why the write was
	/// rejected.
	#[prost(message, optional, tag = "2")]
	pub conflict: ::core::option::Option<PasswordConflict>,
}
/// A rejected password write.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PasswordConflict {
	/// Diff or Deleted.
	#[prost(enumeration = "ItemConflictKind", tag = "1")]
	pub kind: i32,
	/// The current authoritative item, for the client to show side-by-side with its own.
	#[prost(message, optional, tag = "2")]
	pub actual: ::core::option::Option<PasswordItem>,
}

/// Request payload for `Sync` against the card store.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncCardRequest {
	/// The item the client wishes to write.
	#[prost(message, optional, tag = "1")]
	pub item: ::core::option::Option<CardItem>,
}
/// Server response for `Sync` against the card store.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncCardResponse {
	/// True if the write committed.
	#[prost(bool, tag = "1")]
	pub success: bool,
	/// Present iff `success` is false.
	#[prost(message, optional, tag = "2")]
	pub conflict: ::core::option::Option<CardConflict>,
}
/// A rejected card write.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CardConflict {
	/// Diff or Deleted.
	#[prost(enumeration = "ItemConflictKind", tag = "1")]
	pub kind: i32,
	/// The current authoritative item.
	#[prost(message, optional, tag = "2")]
	pub actual: ::core::option::Option<CardItem>,
}

/// Request payload for deleting an item by name, shared across passwords, cards, and files.
///
/// Idempotent: multiple deletes for the same item do not fail, and a delete of a
/// nonexistent item does not fail either.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteItemRequest {
	/// The item's name.
	#[prost(string, tag = "1")]
	pub name: ::prost::alloc::string::String,
	/// For files only: the bucket the name lives under. Ignored for passwords and cards.
	#[prost(string, tag = "2")]
	pub bucket: ::prost::alloc::string::String,
}
/// Server response for a successful delete.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteItemResponse {}

/// Server response for listing all of a user's passwords, excluding soft-deleted rows.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPasswordListResponse {
	/// The user's passwords.
	#[prost(message, repeated, tag = "1")]
	pub items: ::prost::alloc::vec::Vec<PasswordItem>,
}
/// Server response for listing all of a user's cards, excluding soft-deleted rows.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetCardListResponse {
	/// The user's cards.
	#[prost(message, repeated, tag = "1")]
	pub items: ::prost::alloc::vec::Vec<CardItem>,
}
/// Request payload for listing a user's files within a bucket.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetFileListRequest {
	/// The bucket to list, e.g. `"notes"`.
	#[prost(string, tag = "1")]
	pub bucket: ::prost::alloc::string::String,
}
/// Server response for listing all of a user's files, excluding soft-deleted rows and
/// rows still `Pending`.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetFileListResponse {
	/// The user's files.
	#[prost(message, repeated, tag = "1")]
	pub files: ::prost::alloc::vec::Vec<FileInfo>,
}

/// One chunk of a client-streaming `Upload` call.
///
/// The first chunk in a stream carries `filename`, `bucket`, and `meta`; subsequent chunks
/// leave them empty and carry only `data`. The concatenation of every chunk's `data`, in
/// stream order, is the client-side-encrypted blob body (IV-prefixed per the streaming
/// cipher adapter); the server never sees plaintext.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileChunk {
	/// Non-empty only on the first chunk.
	#[prost(string, tag = "1")]
	pub filename: ::prost::alloc::string::String,
	/// Non-empty only on the first chunk.
	#[prost(string, tag = "2")]
	pub bucket: ::prost::alloc::string::String,
	/// Non-empty only on the first chunk.
	#[prost(string, tag = "3")]
	pub meta: ::prost::alloc::string::String,
	/// A slice of the (already encrypted) blob body.
	#[prost(bytes = "bytes", tag = "4")]
	pub data: ::prost::bytes::Bytes,
}
/// Server response closing an `Upload` stream.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UploadResponse {
	/// True once the row has transitioned to `Done` and the blob-store PUT has
	/// committed.
	#[prost(bool, tag = "1")]
	pub success: bool,
}
/// Request payload to open a `Download` stream.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DownloadRequest {
	/// The file's name.
	#[prost(string, tag = "1")]
	pub name: ::prost::alloc::string::String,
	/// The bucket the name lives under.
	#[prost(string, tag = "2")]
	pub bucket: ::prost::alloc::string::String,
}

/// When the HTTP status code is not ok, the response body contains a serialized
/// `ErrorResponse` with the relevant `ErrorCode` and a human-readable message.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorResponse {
	/// The error code, meant to be read and handled programmatically by type.
	#[prost(enumeration = "ErrorCode", tag = "1")]
	pub error_code: i32,
	/// A generic description of the error condition in English, for logging only; not to
	/// be parsed for control flow.
	#[prost(string, tag = "2")]
	pub message: ::prost::alloc::string::String,
}
/// Error codes used in [`ErrorResponse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorCode {
	/// Default protobuf enum value, never used by the server.
	Unknown = 0,
	/// The request was missing a required argument, malformed, or failed validation.
	InvalidRequestException = 2,
	/// An internal error occurred; the client is probably not at fault and may safely
	/// retry with backoff.
	InternalServerException = 3,
	/// The requested item or file does not exist.
	NoSuchItemException = 4,
	/// Authentication failed or the request carried no valid JWT.
	AuthException = 5,
	/// A file upload was attempted against `(user, bucket, name)` while another upload
	/// for the same key was still pending.
	AlreadyUploadingException = 6,
	/// The login used in `Register` is already taken.
	AlreadyExistsException = 7,
}
impl ErrorCode {
	/// String value of the enum field names used in the wire definition.
	pub fn as_str_name(&self) -> &'static str {
		match self {
			ErrorCode::Unknown => "UNKNOWN",
			ErrorCode::InvalidRequestException => "INVALID_REQUEST_EXCEPTION",
			ErrorCode::InternalServerException => "INTERNAL_SERVER_EXCEPTION",
			ErrorCode::NoSuchItemException => "NO_SUCH_ITEM_EXCEPTION",
			ErrorCode::AuthException => "AUTH_EXCEPTION",
			ErrorCode::AlreadyUploadingException => "ALREADY_UPLOADING_EXCEPTION",
			ErrorCode::AlreadyExistsException => "ALREADY_EXISTS_EXCEPTION",
		}
	}
	/// Creates an enum from field names used in the wire definition.
	pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
		match value {
			"UNKNOWN" => Some(Self::Unknown),
			"INVALID_REQUEST_EXCEPTION" => Some(Self::InvalidRequestException),
			"INTERNAL_SERVER_EXCEPTION" => Some(Self::InternalServerException),
			"NO_SUCH_ITEM_EXCEPTION" => Some(Self::NoSuchItemException),
			"AUTH_EXCEPTION" => Some(Self::AuthException),
			"ALREADY_UPLOADING_EXCEPTION" => Some(Self::AlreadyUploadingException),
			"ALREADY_EXISTS_EXCEPTION" => Some(Self::AlreadyExistsException),
			_ => None,
		}
	}
}
