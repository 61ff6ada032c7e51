//! Hosts [`Authorizer`] implementations for the vault.
//!
//! [`Authorizer`]: api::auth::Authorizer

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(missing_docs)]

/// An [`api::auth::Authorizer`] that issues and verifies HS256 JWTs carrying `sub = userID`.
pub mod jwt;
