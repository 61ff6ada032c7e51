use http_body_util::{BodyExt, Full, Limited, StreamBody};
use hyper::body::{Bytes, Frame, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::collections::HashMap;
use std::convert::Infallible;
use std::io::{self, Read};
use std::sync::Arc;

use prost::Message;

use api::auth::Authorizer;
use api::error::VaultError;
use api::framing::{encode_frame, FrameDecoder};
use api::item::Conflict;
use api::store::{reconcile_push, BlobStore, FileStore, ItemStore, UpdateOutcome, UserStore};
use api::types::{
	AuthTokenResponse, CardConflict, CardItem, DeleteItemRequest, DeleteItemResponse, Empty,
	ErrorCode, ErrorResponse, FileChunk, GetCardListResponse, GetFileListRequest,
	GetFileListResponse, GetPasswordListResponse, ItemConflictKind, LoginRequest, PasswordConflict,
	PasswordItem, RegisterRequest, SyncCardRequest, SyncCardResponse, SyncPasswordRequest,
	SyncPasswordResponse, UploadResponse,
};

use std::future::Future;
use std::pin::Pin;

use log::{debug, trace, warn};

use auth_impls::jwt::JwtAuthorizer;
use impls::delete_worker::DeleteWorkerPool;

const MAXIMUM_REQUEST_BODY_SIZE: usize = 1024 * 1024 * 1024;
const DOWNLOAD_CHUNK_SIZE: usize = 1024;

/// Everything a connection handler needs to serve the vault's wire protocol: the backing
/// item/file/user stores, the blob store, the JWT issuer/verifier, and the background
/// deletion pool.
pub struct VaultBackend {
	pub passwords: Arc<dyn ItemStore<PasswordItem>>,
	pub cards: Arc<dyn ItemStore<CardItem>>,
	pub files: Arc<dyn FileStore>,
	pub users: Arc<dyn UserStore>,
	pub blobs: Arc<dyn BlobStore>,
	pub jwt: Arc<JwtAuthorizer>,
	pub delete_worker: Arc<DeleteWorkerPool>,
}

const BASE_PATH_PREFIX: &str = "/vault";

/// The hyper [`Service`] serving every unary and streaming endpoint of the vault's wire
/// protocol over HTTP/1.1, one request at a time per connection.
#[derive(Clone)]
pub struct VaultService {
	backend: Arc<VaultBackend>,
}

impl VaultService {
	pub fn new(backend: Arc<VaultBackend>) -> Self {
		Self { backend }
	}
}

impl Service<Request<Incoming>> for VaultService {
	type Response = Response<BoxBody>;
	type Error = hyper::Error;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

	fn call(&self, req: Request<Incoming>) -> Self::Future {
		let backend = Arc::clone(&self.backend);
		let path = req.uri().path().to_owned();

		Box::pin(async move {
			let route = path.strip_prefix(BASE_PATH_PREFIX).unwrap_or_default();
			match route {
				"/register" => {
					unary(backend, req, false, |b, _user, r: RegisterRequest| async move {
						handle_register(&b, r).await
					})
					.await
				},
				"/login" => {
					unary(backend, req, false, |b, _user, r: LoginRequest| async move {
						handle_login(&b, r).await
					})
					.await
				},
				"/passwords/sync" => {
					unary(backend, req, true, |b, user, r: SyncPasswordRequest| async move {
						handle_sync_password(&b, user, r).await
					})
					.await
				},
				"/passwords/delete" => {
					unary(backend, req, true, |b, user, r: DeleteItemRequest| async move {
						b.passwords.soft_delete(user, &r.name).await?;
						Ok(DeleteItemResponse {})
					})
					.await
				},
				"/passwords/list" => {
					unary(backend, req, true, |b, user, _r: Empty| async move {
						Ok(GetPasswordListResponse { items: b.passwords.list(user).await? })
					})
					.await
				},
				"/cards/sync" => {
					unary(backend, req, true, |b, user, r: SyncCardRequest| async move {
						handle_sync_card(&b, user, r).await
					})
					.await
				},
				"/cards/delete" => {
					unary(backend, req, true, |b, user, r: DeleteItemRequest| async move {
						b.cards.soft_delete(user, &r.name).await?;
						Ok(DeleteItemResponse {})
					})
					.await
				},
				"/cards/list" => {
					unary(backend, req, true, |b, user, _r: Empty| async move {
						Ok(GetCardListResponse { items: b.cards.list(user).await? })
					})
					.await
				},
				"/notes/list" => {
					unary(backend, req, true, |b, user, r: GetFileListRequest| async move {
						Ok(GetFileListResponse { files: b.files.list(user, &r.bucket).await? })
					})
					.await
				},
				"/notes/delete" => {
					unary(backend, req, true, |b, user, r: DeleteItemRequest| async move {
						b.files.soft_delete(user, &r.bucket, &r.name).await?;
						b.delete_worker.queue_delete(r.bucket, r.name).await;
						Ok(DeleteItemResponse {})
					})
					.await
				},
				"/notes/upload" => handle_upload(backend, req).await,
				"/notes/download" => handle_download(backend, req).await,
				_ => {
					let error_msg = Bytes::from_static(b"Invalid request path.");
					Ok(Response::builder()
						.status(StatusCode::BAD_REQUEST)
						.body(full_body(error_msg))
						.unwrap())
				},
			}
		})
	}
}

/// Boxed response body shared by unary responses ([`Full`]) and the `Download` stream
/// ([`StreamBody`]).
pub type BoxBody =
	http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

fn full_body(bytes: Bytes) -> BoxBody {
	Full::new(bytes).map_err(|never: Infallible| match never {}).boxed()
}

fn headers_map(req: &Request<Incoming>) -> HashMap<String, String> {
	req.headers()
		.iter()
		.map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
		.collect()
}

async fn authenticate(
	backend: &VaultBackend, headers: &HashMap<String, String>, require_auth: bool,
) -> Result<i64, VaultError> {
	if !require_auth {
		return Ok(0);
	}
	backend.jwt.verify(headers).await.map(|resp| resp.user_id)
}

/// Decodes a single request message, runs `handler` with the authenticated user id, and
/// encodes the response, translating any [`VaultError`] into the wire error envelope. This
/// is the unary counterpart of [`handle_upload`]/[`handle_download`]'s streaming handling.
async fn unary<T, R, F, Fut>(
	backend: Arc<VaultBackend>, req: Request<Incoming>, require_auth: bool, handler: F,
) -> Result<Response<BoxBody>, hyper::Error>
where
	T: Message + Default,
	R: Message,
	F: FnOnce(Arc<VaultBackend>, i64, T) -> Fut,
	Fut: Future<Output = Result<R, VaultError>>,
{
	let headers = headers_map(&req);
	let user_id = match authenticate(&backend, &headers, require_auth).await {
		Ok(id) => id,
		Err(e) => return Ok(build_error_response(e)),
	};

	let body = req.into_body();
	let limited = Limited::new(body, MAXIMUM_REQUEST_BODY_SIZE);
	let bytes = match limited.collect().await {
		Ok(collected) => collected.to_bytes(),
		Err(_) => {
			return Ok(Response::builder()
				.status(StatusCode::PAYLOAD_TOO_LARGE)
				.body(full_body(Bytes::from_static(b"Request body too large")))
				.unwrap());
		},
	};
	let request = match T::decode(bytes) {
		Ok(request) => request,
		Err(_) => {
			return Ok(Response::builder()
				.status(StatusCode::BAD_REQUEST)
				.body(full_body(Bytes::from_static(b"Error parsing request")))
				.unwrap());
		},
	};

	match handler(backend, user_id, request).await {
		Ok(response) => {
			Ok(Response::builder().body(full_body(Bytes::from(response.encode_to_vec()))).unwrap())
		},
		Err(e) => Ok(build_error_response(e)),
	}
}

async fn handle_register(
	backend: &VaultBackend, req: RegisterRequest,
) -> Result<AuthTokenResponse, VaultError> {
	if req.login.is_empty() || req.password.is_empty() {
		return Err(VaultError::InvalidRequestError("login and password must be non-empty".into()));
	}
	let user_id = backend.users.create_user(&req.login, &req.password).await?;
	trace!("registered user {} as id {}", req.login, user_id);
	Ok(AuthTokenResponse { token: backend.jwt.issue(user_id)? })
}

async fn handle_login(
	backend: &VaultBackend, req: LoginRequest,
) -> Result<AuthTokenResponse, VaultError> {
	let user_id = backend.users.verify_user(&req.login, &req.password).await?;
	Ok(AuthTokenResponse { token: backend.jwt.issue(user_id)? })
}

async fn handle_sync_password(
	backend: &VaultBackend, user_id: i64, req: SyncPasswordRequest,
) -> Result<SyncPasswordResponse, VaultError> {
	let item = req
		.item
		.ok_or_else(|| VaultError::InvalidRequestError("missing item".to_string()))?;
	if item.name.is_empty() {
		return Err(VaultError::InvalidRequestError("item name must be non-empty".to_string()));
	}
	let name = item.name.clone();
	let outcome = backend
		.passwords
		.update_by_name(user_id, &name, Box::new(move |current| reconcile_push(current, item)))
		.await?;
	Ok(match outcome {
		UpdateOutcome::Write(_) | UpdateOutcome::NoChange => {
			SyncPasswordResponse { success: true, conflict: None }
		},
		UpdateOutcome::Reject(conflict) => SyncPasswordResponse {
			success: false,
			conflict: Some(password_conflict_to_pb(conflict)),
		},
	})
}

async fn handle_sync_card(
	backend: &VaultBackend, user_id: i64, req: SyncCardRequest,
) -> Result<SyncCardResponse, VaultError> {
	let item =
		req.item.ok_or_else(|| VaultError::InvalidRequestError("missing item".to_string()))?;
	if item.name.is_empty() {
		return Err(VaultError::InvalidRequestError("item name must be non-empty".to_string()));
	}
	let name = item.name.clone();
	let outcome = backend
		.cards
		.update_by_name(user_id, &name, Box::new(move |current| reconcile_push(current, item)))
		.await?;
	Ok(match outcome {
		UpdateOutcome::Write(_) | UpdateOutcome::NoChange => {
			SyncCardResponse { success: true, conflict: None }
		},
		UpdateOutcome::Reject(conflict) => {
			SyncCardResponse { success: false, conflict: Some(card_conflict_to_pb(conflict)) }
		},
	})
}

fn password_conflict_to_pb(conflict: Conflict<PasswordItem>) -> PasswordConflict {
	PasswordConflict {
		kind: ItemConflictKind::from(conflict.kind) as i32,
		actual: Some(conflict.actual),
	}
}

fn card_conflict_to_pb(conflict: Conflict<CardItem>) -> CardConflict {
	CardConflict { kind: ItemConflictKind::from(conflict.kind) as i32, actual: Some(conflict.actual) }
}

/// A blocking [`Read`] fed by chunks arriving over an async channel; bridges the async
/// hyper body stream to [`BlobStore::put`]'s synchronous reader requirement.
struct ChannelReader {
	rx: tokio::sync::mpsc::Receiver<Vec<u8>>,
	buf: Vec<u8>,
	pos: usize,
}

impl Read for ChannelReader {
	fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
		loop {
			if self.pos < self.buf.len() {
				let n = (self.buf.len() - self.pos).min(out.len());
				out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
				self.pos += n;
				return Ok(n);
			}
			match self.rx.blocking_recv() {
				Some(chunk) => {
					self.buf = chunk;
					self.pos = 0;
				},
				None => return Ok(0),
			}
		}
	}
}

/// First chunk's header fields, captured before the upload's blob-store write begins.
struct UploadHeader {
	filename: String,
	bucket: String,
	meta: String,
}

async fn handle_upload(
	backend: Arc<VaultBackend>, req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
	let headers = headers_map(&req);
	let user_id = match authenticate(&backend, &headers, true).await {
		Ok(id) => id,
		Err(e) => return Ok(build_error_response(e)),
	};

	let mut body = req.into_body();
	let mut decoder = FrameDecoder::new();
	let mut header: Option<UploadHeader> = None;
	let mut leftover_data: Vec<u8> = Vec::new();

	while header.is_none() {
		let Some(frame) = body.frame().await else {
			return Ok(Response::builder()
				.status(StatusCode::BAD_REQUEST)
				.body(full_body(Bytes::from_static(b"Upload stream closed before first chunk")))
				.unwrap());
		};
		let Ok(frame) = frame else {
			return Ok(Response::builder()
				.status(StatusCode::BAD_REQUEST)
				.body(full_body(Bytes::from_static(b"Error reading upload stream")))
				.unwrap());
		};
		let Some(data) = frame.data_ref() else { continue };
		decoder.push(data);
		if let Some(raw) = decoder.next_frame() {
			let Ok(chunk) = FileChunk::decode(raw) else {
				return Ok(Response::builder()
					.status(StatusCode::BAD_REQUEST)
					.body(full_body(Bytes::from_static(b"Error parsing first chunk")))
					.unwrap());
			};
			if chunk.filename.is_empty() || chunk.bucket.is_empty() {
				return Ok(Response::builder()
					.status(StatusCode::BAD_REQUEST)
					.body(full_body(Bytes::from_static(b"First chunk missing filename/bucket")))
					.unwrap());
			}
			leftover_data = chunk.data.to_vec();
			header =
				Some(UploadHeader { filename: chunk.filename, bucket: chunk.bucket, meta: chunk.meta });
		}
	}
	let header = header.expect("loop only exits once header is set");

	if let Err(e) =
		backend.files.begin_upload(user_id, &header.bucket, &header.filename, &header.meta).await
	{
		return Ok(build_error_response(e));
	}

	let (tx, rx) = tokio::sync::mpsc::channel::<Vec<u8>>(16);
	let reader = ChannelReader { rx, buf: Vec::new(), pos: 0 };

	let blobs = Arc::clone(&backend.blobs);
	let bucket = header.bucket.clone();
	let filename = header.filename.clone();
	let put_fut = async move { blobs.put(&bucket, &filename, Box::new(reader)).await };

	let feed_fut = async move {
		if !leftover_data.is_empty() && tx.send(leftover_data).await.is_err() {
			return Ok::<(), VaultError>(());
		}
		loop {
			let Some(frame) = body.frame().await else { break };
			let Ok(frame) = frame else {
				return Err(VaultError::InvalidRequestError("error reading upload stream".into()));
			};
			let Some(data) = frame.data_ref() else { continue };
			decoder.push(data);
			while let Some(raw) = decoder.next_frame() {
				let chunk = FileChunk::decode(raw)
					.map_err(|e| VaultError::InvalidRequestError(format!("bad chunk: {e}")))?;
				if !chunk.data.is_empty() && tx.send(chunk.data.to_vec()).await.is_err() {
					return Ok(());
				}
			}
		}
		Ok(())
	};

	let (put_result, feed_result) = tokio::join!(put_fut, feed_fut);
	if let Err(e) = feed_result {
		let _ = backend.files.abort_upload(user_id, &header.bucket, &header.filename).await;
		return Ok(build_error_response(e));
	}
	let size = match put_result {
		Ok(size) => size,
		Err(e) => {
			warn!("blob put failed for {}/{}: {e}", header.bucket, header.filename);
			let _ = backend.files.abort_upload(user_id, &header.bucket, &header.filename).await;
			return Ok(build_error_response(e));
		},
	};

	if let Err(e) = backend
		.files
		.complete_upload(user_id, &header.bucket, &header.filename, size as i64, &header.meta)
		.await
	{
		return Ok(build_error_response(e));
	}

	let response = UploadResponse { success: true };
	Ok(Response::builder().body(full_body(Bytes::from(response.encode_to_vec()))).unwrap())
}

async fn handle_download(
	backend: Arc<VaultBackend>, req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
	let headers = headers_map(&req);
	let user_id = match authenticate(&backend, &headers, true).await {
		Ok(id) => id,
		Err(e) => return Ok(build_error_response(e)),
	};

	let body = req.into_body();
	let bytes = match Limited::new(body, MAXIMUM_REQUEST_BODY_SIZE).collect().await {
		Ok(collected) => collected.to_bytes(),
		Err(_) => {
			return Ok(Response::builder()
				.status(StatusCode::PAYLOAD_TOO_LARGE)
				.body(full_body(Bytes::from_static(b"Request body too large")))
				.unwrap());
		},
	};
	let request = match api::types::DownloadRequest::decode(bytes) {
		Ok(r) => r,
		Err(_) => {
			return Ok(Response::builder()
				.status(StatusCode::BAD_REQUEST)
				.body(full_body(Bytes::from_static(b"Error parsing request")))
				.unwrap());
		},
	};

	if let Err(e) = backend.files.get(user_id, &request.bucket, &request.name).await {
		return Ok(build_error_response(e));
	}

	let blob_stream = match backend.blobs.get(&request.bucket, &request.name).await {
		Ok(stream) => stream,
		Err(e) => return Ok(build_error_response(e)),
	};

	let rechunked = futures_util::stream::unfold(
		(blob_stream, Vec::<u8>::new(), false),
		move |(mut inner, mut leftover, mut done)| async move {
			loop {
				if leftover.len() >= DOWNLOAD_CHUNK_SIZE {
					let rest = leftover.split_off(DOWNLOAD_CHUNK_SIZE);
					let piece = std::mem::replace(&mut leftover, rest);
					let frame = FileChunk { filename: String::new(), bucket: String::new(), meta: String::new(), data: piece.into() };
					return Some((Ok(Frame::data(Bytes::from(encode_frame(&frame)))), (inner, leftover, done)));
				}
				if done {
					if leftover.is_empty() {
						return None;
					}
					let piece = std::mem::take(&mut leftover);
					let frame = FileChunk { filename: String::new(), bucket: String::new(), meta: String::new(), data: piece.into() };
					return Some((Ok(Frame::data(Bytes::from(encode_frame(&frame)))), (inner, leftover, done)));
				}
				match futures_util::StreamExt::next(&mut inner).await {
					Some(Ok(bytes)) => leftover.extend(bytes),
					Some(Err(e)) => {
						let msg: Box<dyn std::error::Error + Send + Sync> = Box::new(e);
						return Some((Err(msg), (inner, leftover, true)));
					},
					None => done = true,
				}
			}
		},
	);

	let body = StreamBody::new(rechunked).boxed();
	Ok(Response::builder().body(body).unwrap())
}

fn build_error_response(e: VaultError) -> Response<BoxBody> {
	debug!("request failed: {e}");
	let (status_code, error_response) = match e {
		VaultError::NoSuchItemError(msg) => {
			(StatusCode::NOT_FOUND, ErrorResponse { error_code: ErrorCode::NoSuchItemException.into(), message: msg })
		},
		VaultError::InvalidRequestError(msg) => (
			StatusCode::BAD_REQUEST,
			ErrorResponse { error_code: ErrorCode::InvalidRequestException.into(), message: msg },
		),
		VaultError::ConflictError(msg) => (
			StatusCode::CONFLICT,
			ErrorResponse { error_code: ErrorCode::AlreadyUploadingException.into(), message: msg },
		),
		VaultError::AlreadyExistsError(msg) => (
			StatusCode::CONFLICT,
			ErrorResponse { error_code: ErrorCode::AlreadyExistsException.into(), message: msg },
		),
		VaultError::AuthError(msg) => (
			StatusCode::UNAUTHORIZED,
			ErrorResponse { error_code: ErrorCode::AuthException.into(), message: msg },
		),
		VaultError::InternalServerError(_) => (
			StatusCode::INTERNAL_SERVER_ERROR,
			ErrorResponse {
				error_code: ErrorCode::InternalServerException.into(),
				message: "Unknown Server Error occurred.".to_string(),
			},
		),
	};
	Response::builder()
		.status(status_code)
		.body(full_body(Bytes::from(error_response.encode_to_vec())))
		.unwrap()
}
