//! Hosts the API contract for the vault.
//!
//! The vault is a client/server secret manager: it stores user "items" (passwords, payment
//! cards, and arbitrary file "notes") encrypted on the client, mirrors them to a server, and
//! keeps the two sides in sync under conflict. This crate defines the wire types, the
//! store/blob/authorizer trait seams every backend implements, and the conflict reconciler
//! that is the single source of truth for merge semantics.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

/// Contains the interface for the authorizer that runs before every request, and a no-op
/// implementation for local development.
pub mod auth;
/// Implements the error type ([`error::VaultError`]) which is eventually converted to
/// [`ErrorResponse`] and returned to the client.
///
/// [`ErrorResponse`]: types::ErrorResponse
pub mod error;

/// Length-prefixed message framing for the client/server-streaming calls (`Upload`,
/// `Download`); pure encode/decode logic with no I/O of its own.
pub mod framing;

/// Contains [`item::SyncEntity`], the conflict algebra, and the pure reconciler function
/// every `Sync` handler merges writes through.
pub mod item;

/// Contains [`store::ItemStore`], [`store::FileStore`], [`store::BlobStore`], and
/// [`store::LocalItemStore`] — the trait seams each backend implementation of the vault
/// fulfils.
pub mod store;

/// Contains request/response types for the vault's wire protocol.
pub mod types;
