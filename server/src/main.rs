//! Hosts the vault's HTTP server implementation.
//!
//! The vault is a client/server secret manager: it stores user "items" (passwords, payment
//! cards, and arbitrary file "notes") encrypted on the client, mirrors them to a server, and
//! keeps the two sides in sync under conflict. This binary wires a concrete backend
//! (PostgreSQL-backed item/file/user stores, a filesystem blob store, an HS256 JWT
//! authorizer) behind [`vault_service::VaultService`] and serves it over HTTP/1.1.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal::unix::SignalKind;

use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;

use api::store::{BlobStore, FileStore, ItemStore, UserStore};
use api::types::{CardItem, PasswordItem};
use auth_impls::jwt::JwtAuthorizer;
use impls::blob_store::FsBlobStore;
use impls::delete_worker::DeleteWorkerPool;
use impls::in_memory_store::InMemoryStore;
use impls::postgres_store::{Certificate, PostgresStore};

use crate::vault_service::{VaultBackend, VaultService};

mod tracing;
mod util;
mod vault_service;

use util::config::{load_config, Config};

fn main() {
	crate::tracing::configure_tracer();

	let args: Vec<String> = std::env::args().collect();
	let config_path = args.get(1).map(String::as_str);

	let Config {
		bind_address,
		jwt_secret,
		jwt_ttl,
		blob_root,
		delete_worker_count,
		postgres_dsn,
		postgres_tls_crt_pem,
		log_level: _,
	} = match load_config(config_path) {
		Ok(cfg) => cfg,
		Err(e) => {
			eprintln!("Failed to load configuration: {}", e);
			std::process::exit(1);
		},
	};

	let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
		Ok(runtime) => Arc::new(runtime),
		Err(e) => {
			eprintln!("Failed to set up Tokio runtime: {}", e);
			std::process::exit(1);
		},
	};

	runtime.clone().block_on(async move {
		let mut sigterm_stream = match tokio::signal::unix::signal(SignalKind::terminate()) {
			Ok(stream) => stream,
			Err(e) => {
				eprintln!("Failed to register for SIGTERM stream: {}", e);
				std::process::exit(1);
			},
		};

		let jwt = Arc::new(JwtAuthorizer::new(jwt_secret.into_bytes(), jwt_ttl));

		let store: Arc<PostgresOrInMemory> = match &postgres_dsn {
			Some(dsn) => {
				let store = if let Some(cert_path) = &postgres_tls_crt_pem {
					let pem = match std::fs::read(cert_path) {
						Ok(pem) => pem,
						Err(e) => {
							eprintln!("Failed to read TLS certificate: {}", e);
							std::process::exit(1);
						},
					};
					let cert = match Certificate::from_pem(&pem) {
						Ok(cert) => cert,
						Err(e) => {
							eprintln!("Failed to parse TLS certificate: {}", e);
							std::process::exit(1);
						},
					};
					PostgresStore::connect_tls(dsn, Some(cert)).await
				} else {
					PostgresStore::connect_plaintext(dsn).await
				};
				match store {
					Ok(store) => Arc::new(PostgresOrInMemory::Postgres(store)),
					Err(e) => {
						eprintln!("Failed to connect to PostgreSQL: {}", e);
						std::process::exit(1);
					},
				}
			},
			None => {
				println!("No VAULT_PSQL_DSN configured; running against an in-memory store.");
				Arc::new(PostgresOrInMemory::InMemory(InMemoryStore::new()))
			},
		};

		match store.recover_pending_uploads().await {
			Ok(0) => {},
			Ok(n) => println!("Cleared {n} upload(s) left pending by a previous run."),
			Err(e) => {
				eprintln!("Failed to recover pending uploads: {}", e);
				std::process::exit(1);
			},
		}

		let blob_store: Arc<dyn BlobStore> = match FsBlobStore::new(&blob_root) {
			Ok(store) => Arc::new(store),
			Err(e) => {
				eprintln!("Failed to initialize blob store at {:?}: {}", blob_root, e);
				std::process::exit(1);
			},
		};
		let delete_worker =
			Arc::new(DeleteWorkerPool::spawn(blob_store.clone(), delete_worker_count));

		let backend = Arc::new(VaultBackend {
			passwords: store.clone() as Arc<dyn ItemStore<PasswordItem>>,
			cards: store.clone() as Arc<dyn ItemStore<CardItem>>,
			files: store.clone() as Arc<dyn FileStore>,
			users: store.clone() as Arc<dyn UserStore>,
			blobs: blob_store,
			jwt,
			delete_worker,
		});

		let listener = match TcpListener::bind(&bind_address).await {
			Ok(listener) => listener,
			Err(e) => {
				eprintln!("Failed to bind {}: {}", bind_address, e);
				std::process::exit(1);
			},
		};
		println!("Listening for incoming connections on {}", bind_address);

		loop {
			tokio::select! {
				res = listener.accept() => {
					match res {
						Ok((stream, _)) => {
							let io_stream = TokioIo::new(stream);
							let service = VaultService::new(Arc::clone(&backend));
							runtime.spawn(async move {
								if let Err(err) = http1::Builder::new().serve_connection(io_stream, service).await {
									eprintln!("Failed to serve connection: {}", err);
								}
							});
						},
						Err(e) => eprintln!("Failed to accept connection: {}", e),
					}
				}
				_ = tokio::signal::ctrl_c() => {
					println!("Received CTRL-C, shutting down..");
					break;
				}
				_ = sigterm_stream.recv() => {
					println!("Received SIGTERM, shutting down..");
					break;
				}
			}
		}
	});
}

/// A store backend that is either PostgreSQL-backed or the in-memory test double, erased
/// behind the same set of trait objects the rest of the server depends on.
///
/// Kept as an enum rather than picking one concrete type at compile time so `main` can fall
/// back to the in-memory store when no `VAULT_PSQL_DSN` is configured, mirroring
/// [`api::auth::NoopAuthorizer`]'s role as a zero-config local-development stand-in.
enum PostgresOrInMemory {
	Postgres(PostgresStore),
	InMemory(InMemoryStore),
}

macro_rules! delegate {
	($self:ident, $method:ident ( $($arg:expr),* )) => {
		match $self {
			PostgresOrInMemory::Postgres(s) => s.$method($($arg),*).await,
			PostgresOrInMemory::InMemory(s) => s.$method($($arg),*).await,
		}
	};
}

#[async_trait::async_trait]
impl UserStore for PostgresOrInMemory {
	async fn create_user(&self, login: &str, password: &str) -> Result<i64, api::error::VaultError> {
		delegate!(self, create_user(login, password))
	}

	async fn verify_user(&self, login: &str, password: &str) -> Result<i64, api::error::VaultError> {
		delegate!(self, verify_user(login, password))
	}
}

#[async_trait::async_trait]
impl ItemStore<PasswordItem> for PostgresOrInMemory {
	async fn update_by_name(
		&self, user_id: i64, name: &str,
		updater: Box<dyn FnOnce(Option<PasswordItem>) -> api::store::UpdateOutcome<PasswordItem> + Send>,
	) -> Result<api::store::UpdateOutcome<PasswordItem>, api::error::VaultError> {
		delegate!(self, update_by_name(user_id, name, updater))
	}

	async fn insert(&self, user_id: i64, item: PasswordItem) -> Result<(), api::error::VaultError> {
		delegate!(self, insert(user_id, item))
	}

	async fn list(&self, user_id: i64) -> Result<Vec<PasswordItem>, api::error::VaultError> {
		delegate!(self, list(user_id))
	}

	async fn soft_delete(&self, user_id: i64, name: &str) -> Result<(), api::error::VaultError> {
		delegate!(self, soft_delete(user_id, name))
	}
}

#[async_trait::async_trait]
impl ItemStore<CardItem> for PostgresOrInMemory {
	async fn update_by_name(
		&self, user_id: i64, name: &str,
		updater: Box<dyn FnOnce(Option<CardItem>) -> api::store::UpdateOutcome<CardItem> + Send>,
	) -> Result<api::store::UpdateOutcome<CardItem>, api::error::VaultError> {
		delegate!(self, update_by_name(user_id, name, updater))
	}

	async fn insert(&self, user_id: i64, item: CardItem) -> Result<(), api::error::VaultError> {
		delegate!(self, insert(user_id, item))
	}

	async fn list(&self, user_id: i64) -> Result<Vec<CardItem>, api::error::VaultError> {
		delegate!(self, list(user_id))
	}

	async fn soft_delete(&self, user_id: i64, name: &str) -> Result<(), api::error::VaultError> {
		delegate!(self, soft_delete(user_id, name))
	}
}

#[async_trait::async_trait]
impl FileStore for PostgresOrInMemory {
	async fn begin_upload(
		&self, user_id: i64, bucket: &str, name: &str, meta: &str,
	) -> Result<(), api::error::VaultError> {
		delegate!(self, begin_upload(user_id, bucket, name, meta))
	}

	async fn complete_upload(
		&self, user_id: i64, bucket: &str, name: &str, size: i64, meta: &str,
	) -> Result<(), api::error::VaultError> {
		delegate!(self, complete_upload(user_id, bucket, name, size, meta))
	}

	async fn abort_upload(&self, user_id: i64, bucket: &str, name: &str) -> Result<(), api::error::VaultError> {
		delegate!(self, abort_upload(user_id, bucket, name))
	}

	async fn get(
		&self, user_id: i64, bucket: &str, name: &str,
	) -> Result<api::types::FileInfo, api::error::VaultError> {
		delegate!(self, get(user_id, bucket, name))
	}

	async fn list(
		&self, user_id: i64, bucket: &str,
	) -> Result<Vec<api::types::FileInfo>, api::error::VaultError> {
		delegate!(self, list(user_id, bucket))
	}

	async fn soft_delete(&self, user_id: i64, bucket: &str, name: &str) -> Result<(), api::error::VaultError> {
		delegate!(self, soft_delete(user_id, bucket, name))
	}

	async fn recover_pending_uploads(&self) -> Result<u64, api::error::VaultError> {
		delegate!(self, recover_pending_uploads())
	}
}
