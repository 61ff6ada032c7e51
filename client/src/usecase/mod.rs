//! One module per item kind, each wiring the local cache, the RPC transport, and (for
//! passwords/cards) the crypto layer together into the operations callers actually invoke.

pub mod auth;
pub mod cards;
pub mod notes;
pub mod passwords;
