//! A thin hyper-based transport to the vault server: one method per route under `/vault`,
//! speaking the same wire format `vault_service` decodes on the other end — a lone
//! [`prost::Message`] as the whole body for unary calls, a sequence of length-prefixed
//! [`FileChunk`] frames for `Upload`/`Download`.
//!
//! This module owns only the bytes-on-the-wire concern. Encryption, chunk sizing policy, and
//! local-store bookkeeping live in the usecase modules that call through here.

use std::convert::Infallible;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, Limited, StreamBody};
use hyper::body::Frame;
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use prost::Message;
use tokio::sync::mpsc;

use api::framing::{encode_frame, FrameDecoder};
use api::types::{
	AuthTokenResponse, CardItem, DeleteItemRequest, DeleteItemResponse, Empty, ErrorResponse,
	FileChunk, GetCardListResponse, GetFileListRequest, GetFileListResponse,
	GetPasswordListResponse, LoginRequest, PasswordItem, RegisterRequest, SyncCardRequest,
	SyncCardResponse, SyncPasswordRequest, SyncPasswordResponse, UploadResponse,
};

use crate::error::ClientError;

const MAXIMUM_RESPONSE_BODY_SIZE: usize = 1024 * 1024 * 1024;
const BASE_PATH_PREFIX: &str = "/vault";

type RequestBody = BoxBody<Bytes, Infallible>;

fn full_body(bytes: Bytes) -> RequestBody {
	Full::new(bytes).boxed()
}

/// Talks to a single vault server over plain HTTP/1.1, attaching a bearer token to every
/// call that carries one.
///
/// One `RpcClient` is shared across however many usecase calls a process makes; the
/// underlying [`HyperClient`] pools its own connections.
#[derive(Clone)]
pub struct RpcClient {
	http: HyperClient<HttpConnector, RequestBody>,
	base_url: String,
}

impl RpcClient {
	/// Creates a client talking to `base_url` (e.g. `http://127.0.0.1:8080`), with no
	/// `/vault` suffix.
	pub fn new(base_url: impl Into<String>) -> Self {
		let http = HyperClient::builder(TokioExecutor::new()).build(HttpConnector::new());
		Self { http, base_url: base_url.into() }
	}

	fn uri(&self, route: &str) -> String {
		format!("{}{}{}", self.base_url, BASE_PATH_PREFIX, route)
	}

	fn request_builder(&self, route: &str, token: Option<&str>) -> hyper::http::request::Builder {
		let mut builder = Request::post(self.uri(route));
		if let Some(token) = token {
			builder = builder.header("authorization", format!("bearer {token}"));
		}
		builder
	}

	/// Encodes `message`, POSTs it to `route`, and decodes the response as `R` or as the
	/// error envelope the server sends on non-2xx statuses.
	async fn unary<T, R>(
		&self, route: &str, token: Option<&str>, message: &T,
	) -> Result<R, ClientError>
	where
		T: Message,
		R: Message + Default,
	{
		let body = full_body(Bytes::from(message.encode_to_vec()));
		let req = self
			.request_builder(route, token)
			.body(body)
			.map_err(|e| ClientError::Transport(e.to_string()))?;

		let resp = self.http.request(req).await.map_err(|e| ClientError::Transport(e.to_string()))?;
		let status = resp.status();
		let collected = Limited::new(resp.into_body(), MAXIMUM_RESPONSE_BODY_SIZE)
			.collect()
			.await
			.map_err(|e| ClientError::Transport(e.to_string()))?
			.to_bytes();

		if !status.is_success() {
			return Err(decode_error(collected));
		}
		R::decode(collected).map_err(|e| ClientError::Decode(e.to_string()))
	}

	/// `POST /vault/register`.
	pub async fn register(&self, login: &str, password: &str) -> Result<AuthTokenResponse, ClientError> {
		let req = RegisterRequest { login: login.to_string(), password: password.to_string() };
		self.unary("/register", None, &req).await
	}

	/// `POST /vault/login`.
	pub async fn login(&self, login: &str, password: &str) -> Result<AuthTokenResponse, ClientError> {
		let req = LoginRequest { login: login.to_string(), password: password.to_string() };
		self.unary("/login", None, &req).await
	}

	/// `POST /vault/passwords/sync`.
	pub async fn sync_password(
		&self, token: &str, item: PasswordItem,
	) -> Result<SyncPasswordResponse, ClientError> {
		let req = SyncPasswordRequest { item: Some(item) };
		self.unary("/passwords/sync", Some(token), &req).await
	}

	/// `POST /vault/passwords/delete`.
	pub async fn delete_password(&self, token: &str, name: &str) -> Result<DeleteItemResponse, ClientError> {
		let req = DeleteItemRequest { name: name.to_string(), bucket: String::new() };
		self.unary("/passwords/delete", Some(token), &req).await
	}

	/// `POST /vault/passwords/list`.
	pub async fn list_passwords(&self, token: &str) -> Result<GetPasswordListResponse, ClientError> {
		self.unary("/passwords/list", Some(token), &Empty {}).await
	}

	/// `POST /vault/cards/sync`.
	pub async fn sync_card(&self, token: &str, item: CardItem) -> Result<SyncCardResponse, ClientError> {
		let req = SyncCardRequest { item: Some(item) };
		self.unary("/cards/sync", Some(token), &req).await
	}

	/// `POST /vault/cards/delete`.
	pub async fn delete_card(&self, token: &str, name: &str) -> Result<DeleteItemResponse, ClientError> {
		let req = DeleteItemRequest { name: name.to_string(), bucket: String::new() };
		self.unary("/cards/delete", Some(token), &req).await
	}

	/// `POST /vault/cards/list`.
	pub async fn list_cards(&self, token: &str) -> Result<GetCardListResponse, ClientError> {
		self.unary("/cards/list", Some(token), &Empty {}).await
	}

	/// `POST /vault/notes/list`.
	pub async fn list_files(&self, token: &str, bucket: &str) -> Result<GetFileListResponse, ClientError> {
		let req = GetFileListRequest { bucket: bucket.to_string() };
		self.unary("/notes/list", Some(token), &req).await
	}

	/// `POST /vault/notes/delete`.
	pub async fn delete_file(
		&self, token: &str, bucket: &str, name: &str,
	) -> Result<DeleteItemResponse, ClientError> {
		let req = DeleteItemRequest { name: name.to_string(), bucket: bucket.to_string() };
		self.unary("/notes/delete", Some(token), &req).await
	}

	/// Streams `chunks` as a sequence of framed [`FileChunk`] messages to `/notes/upload`.
	///
	/// The first item `chunks` yields must carry `filename`/`bucket`/`meta`, mirroring what
	/// `vault_service::handle_upload` requires of the first frame; every later item need
	/// only carry `data`. Callers build this sequence in the notes usecase, chunking
	/// ciphertext off an [`vault_crypto::EncryptReader`].
	pub async fn upload(
		&self, token: &str, mut chunks: mpsc::Receiver<FileChunk>,
	) -> Result<UploadResponse, ClientError> {
		let (body_tx, body_rx) = mpsc::channel::<Result<Frame<Bytes>, Infallible>>(16);
		tokio::spawn(async move {
			while let Some(chunk) = chunks.recv().await {
				let frame = Frame::data(Bytes::from(encode_frame(&chunk)));
				if body_tx.send(Ok(frame)).await.is_err() {
					break;
				}
			}
		});
		let stream = tokio_stream_from_receiver(body_rx);
		let body = StreamBody::new(stream).boxed();

		let req = self
			.request_builder("/notes/upload", Some(token))
			.body(body)
			.map_err(|e| ClientError::Transport(e.to_string()))?;
		let resp = self.http.request(req).await.map_err(|e| ClientError::Transport(e.to_string()))?;
		let status = resp.status();
		let collected = Limited::new(resp.into_body(), MAXIMUM_RESPONSE_BODY_SIZE)
			.collect()
			.await
			.map_err(|e| ClientError::Transport(e.to_string()))?
			.to_bytes();
		if !status.is_success() {
			return Err(decode_error(collected));
		}
		UploadResponse::decode(collected).map_err(|e| ClientError::Decode(e.to_string()))
	}

	/// Issues `/notes/download` and returns a channel fed with each reassembled
	/// [`FileChunk`]'s `data`, in order, as the response body streams in.
	///
	/// The channel closes once the whole response body has been consumed; a transport or
	/// framing error arriving mid-stream is sent as the final item's `Err` before the
	/// channel closes.
	pub async fn download(
		&self, token: &str, bucket: &str, name: &str,
	) -> Result<mpsc::Receiver<Result<Bytes, ClientError>>, ClientError> {
		let req_msg = api::types::DownloadRequest { name: name.to_string(), bucket: bucket.to_string() };
		let body = full_body(Bytes::from(req_msg.encode_to_vec()));
		let req = self
			.request_builder("/notes/download", Some(token))
			.body(body)
			.map_err(|e| ClientError::Transport(e.to_string()))?;

		let resp = self.http.request(req).await.map_err(|e| ClientError::Transport(e.to_string()))?;
		let status = resp.status();
		if !status.is_success() {
			let collected = Limited::new(resp.into_body(), MAXIMUM_RESPONSE_BODY_SIZE)
				.collect()
				.await
				.map_err(|e| ClientError::Transport(e.to_string()))?
				.to_bytes();
			return Err(decode_error(collected));
		}

		let (tx, rx) = mpsc::channel::<Result<Bytes, ClientError>>(16);
		let mut body = resp.into_body();
		tokio::spawn(async move {
			let mut decoder = FrameDecoder::new();
			loop {
				let frame = match body.frame().await {
					Some(Ok(frame)) => frame,
					Some(Err(e)) => {
						let _ = tx.send(Err(ClientError::Transport(e.to_string()))).await;
						return;
					},
					None => break,
				};
				let Some(data) = frame.data_ref() else { continue };
				decoder.push(data);
				while let Some(raw) = decoder.next_frame() {
					match FileChunk::decode(raw) {
						Ok(chunk) => {
							if chunk.data.is_empty() {
								continue;
							}
							if tx.send(Ok(chunk.data)).await.is_err() {
								return;
							}
						},
						Err(e) => {
							let _ = tx.send(Err(ClientError::Decode(e.to_string()))).await;
							return;
						},
					}
				}
			}
		});
		Ok(rx)
	}
}

fn decode_error(bytes: Bytes) -> ClientError {
	match ErrorResponse::decode(bytes) {
		Ok(err) => ClientError::Server(server_error_from_response(err)),
		Err(_) => ClientError::Transport("server returned an unreadable error response".to_string()),
	}
}

fn server_error_from_response(err: ErrorResponse) -> api::error::VaultError {
	use api::error::VaultError;
	use api::types::ErrorCode;

	match err.error_code {
		code if code == ErrorCode::NoSuchItemException as i32 => VaultError::NoSuchItemError(err.message),
		code if code == ErrorCode::InvalidRequestException as i32 => {
			VaultError::InvalidRequestError(err.message)
		},
		code if code == ErrorCode::AlreadyUploadingException as i32 => VaultError::ConflictError(err.message),
		code if code == ErrorCode::AlreadyExistsException as i32 => VaultError::AlreadyExistsError(err.message),
		code if code == ErrorCode::AuthException as i32 => VaultError::AuthError(err.message),
		_ => VaultError::InternalServerError(err.message),
	}
}

/// Adapts a [`mpsc::Receiver`] into the `futures_core::Stream` [`StreamBody`] needs, since
/// `tokio::sync::mpsc` has no built-in `Stream` impl without pulling in `tokio-stream`.
fn tokio_stream_from_receiver(
	rx: mpsc::Receiver<Result<Frame<Bytes>, Infallible>>,
) -> impl futures_core::Stream<Item = Result<Frame<Bytes>, Infallible>> {
	futures_util::stream::unfold(rx, |mut rx| async move {
		let item = rx.recv().await?;
		Some((item, rx))
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn uri_joins_base_url_and_route_under_the_vault_prefix() {
		let client = RpcClient::new("http://127.0.0.1:9000");
		assert_eq!(client.uri("/passwords/sync"), "http://127.0.0.1:9000/vault/passwords/sync");
	}
}
