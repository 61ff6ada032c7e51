//! The vault's local agent: a SQLite-backed cache of passwords, cards, and file metadata, a
//! thin hyper transport to the server, and the usecase glue between them.
//!
//! This crate is a library only — it has no command-line surface of its own. A binary
//! wiring it to a terminal UI or script would live elsewhere and depend on this crate the
//! way it depends on any other library.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

pub mod error;
mod local_store;
mod migrations;
pub mod rpc;
pub mod session;
pub mod sync;
pub mod usecase;

pub use error::ClientError;
pub use local_store::SqliteStore;
pub use rpc::RpcClient;
pub use session::ClientSession;
