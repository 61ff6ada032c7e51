//! Backend implementations of the vault's server-side store traits
//! ([`api::store::ItemStore`], [`api::store::FileStore`], [`api::store::BlobStore`]).
//!
//! Two item/file-metadata backends are provided: [`postgres_store::PostgresStore`] for
//! production, and [`in_memory_store::InMemoryStore`] for tests and local development
//! without a database. Blob contents live separately behind [`blob_store::FsBlobStore`];
//! [`delete_worker::DeleteWorkerPool`] runs blob removal off the request path after a file
//! is soft-deleted.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

/// A filesystem-backed [`api::store::BlobStore`].
pub mod blob_store;
/// A bounded worker pool that drains queued blob deletions off the request path.
pub mod delete_worker;
/// An in-memory implementation of the item and file stores, for tests and local development.
pub mod in_memory_store;
mod migrations;
/// A [PostgreSQL](https://www.postgresql.org/) backed implementation of the item, file, and
/// user stores.
pub mod postgres_store;
