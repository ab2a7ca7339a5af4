// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Trinity Protocol — Core Primitives
//!
//! The building blocks shared by the registry ledger and the node that
//! hosts it:
//!
//! - **amount** — wei-denominated [`Amount`]s and ether parsing.
//! - **address** — 20-byte principal and contract [`Address`]es.
//! - **crypto** — Ed25519 keypairs and signatures.
//! - **envelope** — signed call envelopes carrying caller identity and
//!   attached value.
//! - **state** — the environment's account balances and nonces, and the
//!   [`FundsTransfer`] seam the ledger moves money through.
//! - **config** — protocol constants and the network fee table.

pub mod address;
pub mod amount;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod state;

pub use address::{Address, AddressError};
pub use amount::Amount;
pub use crypto::{PublicKey, Signature, TrinityKeypair};
pub use envelope::{Envelope, EnvelopeError};
pub use state::{AccountBook, AccountState, FundsTransfer, NonceMismatch, TransferError};
