//! # Trinity Registry Contracts
//!
//! The ledger logic behind Trinity, a permissioned skills registry:
//!
//! - **Registry** — the [`Trinity`] ledger. Tracks the owner, the validator
//!   set and employer stakes, and holds the kill switch.
//! - **Credentials** — append-only skill credentials that only validators
//!   may issue.
//! - **Events** — notifications appended to the ledger outbox by every
//!   successful write.
//! - **Call** — routes decoded calls to ledger operations and enforces
//!   payability.
//!
//! ## Design Principles
//!
//! 1. Writes validate, then move funds, then commit. A failed call changes
//!    nothing.
//! 2. All arithmetic on stakes and token ids is checked.
//! 3. Funds never move inside the ledger itself; they go through the
//!    [`FundsTransfer`](trinity_protocol::FundsTransfer) seam supplied by
//!    the host.
//! 4. Every public type is serializable (serde) for the host's API.

pub mod call;
pub mod credential;
pub mod events;
pub mod registry;

pub use call::{CallContext, CallOutcome, TrinityCall};
pub use credential::{CredentialError, CredentialRegistry, SkillCredential, TokenId};
pub use events::TrinityEvent;
pub use registry::{Role, Trinity, TrinityError};
