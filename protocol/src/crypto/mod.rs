//! # Cryptographic Primitives
//!
//! Thin wrappers over `ed25519-dalek`: keypairs for principals, public
//! keys that map to [`Address`](crate::address::Address)es, and detached
//! signatures over call envelopes.

pub mod keys;

pub use keys::{KeyError, PublicKey, Signature, TrinityKeypair};
