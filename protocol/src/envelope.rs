//! # Signed Call Envelopes
//!
//! Every state-changing request reaches the ledger wrapped in an
//! [`Envelope`]: the caller's public key, a per-account nonce, the value
//! attached to the call, the call payload itself and an Ed25519 signature.
//! The host verifies the envelope and hands the ledger only the recovered
//! caller [`Address`] and the attached value, which is all the ledger ever
//! needs to know about authentication.
//!
//! ## Signable bytes
//!
//! The signature covers the JSON encoding of
//! `{domain, chain_id, sender_public_key, nonce, value, payload}`. The
//! domain tag and chain id stop a signature from being replayed against a
//! different protocol or network; the nonce stops replay on the same one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::amount::Amount;
use crate::config::CALL_SIGNING_DOMAIN;
use crate::crypto::{PublicKey, Signature, TrinityKeypair};

/// Errors raised while signing or verifying an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope carries no signature.
    #[error("envelope is not signed")]
    Unsigned,

    /// The signature does not verify against the sender's public key.
    #[error("invalid signature for sender {0}")]
    InvalidSignature(Address),

    /// Attempted to sign with a key other than the declared sender's.
    #[error("signing key {signer} does not match sender {sender}")]
    KeyMismatch {
        /// Address of the key used to sign.
        signer: Address,
        /// Address of the declared sender.
        sender: Address,
    },

    /// The payload could not be encoded.
    #[error("envelope encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// A signed request to execute `payload` on behalf of the sender.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<P> {
    /// Network the call is meant for.
    pub chain_id: u64,
    /// Public key of the caller; the caller address is derived from it.
    pub sender_public_key: PublicKey,
    /// Must equal the sender's next expected nonce.
    pub nonce: u64,
    /// Native value attached to the call, in wei.
    #[serde(with = "crate::amount::as_decimal_str")]
    pub value: Amount,
    /// The call itself.
    pub payload: P,
    /// Signature over [`signable_bytes`](Self::signable_bytes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

#[derive(Serialize)]
struct Signable<'a, P> {
    domain: &'static str,
    chain_id: u64,
    sender_public_key: &'a PublicKey,
    nonce: u64,
    #[serde(with = "crate::amount::as_decimal_str")]
    value: Amount,
    payload: &'a P,
}

impl<P: Serialize> Envelope<P> {
    /// Builds an unsigned envelope for `sender`.
    pub fn new(chain_id: u64, sender: PublicKey, nonce: u64, value: Amount, payload: P) -> Self {
        Self {
            chain_id,
            sender_public_key: sender,
            nonce,
            value,
            payload,
            signature: None,
        }
    }

    /// Builds and signs an envelope in one step.
    pub fn signed(
        keypair: &TrinityKeypair,
        chain_id: u64,
        nonce: u64,
        value: Amount,
        payload: P,
    ) -> Result<Self, EnvelopeError> {
        let mut envelope = Self::new(chain_id, keypair.public_key(), nonce, value, payload);
        envelope.sign(keypair)?;
        Ok(envelope)
    }

    /// Address of the declared sender.
    pub fn sender(&self) -> Address {
        self.sender_public_key.address()
    }

    /// Canonical bytes covered by the signature.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let signable = Signable {
            domain: CALL_SIGNING_DOMAIN,
            chain_id: self.chain_id,
            sender_public_key: &self.sender_public_key,
            nonce: self.nonce,
            value: self.value,
            payload: &self.payload,
        };
        Ok(serde_json::to_vec(&signable)?)
    }

    /// Signs the envelope in place, overwriting any previous signature.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::KeyMismatch`] if `keypair` is not the
    /// declared sender.
    pub fn sign(&mut self, keypair: &TrinityKeypair) -> Result<(), EnvelopeError> {
        if keypair.public_key() != self.sender_public_key {
            return Err(EnvelopeError::KeyMismatch {
                signer: keypair.address(),
                sender: self.sender(),
            });
        }
        let bytes = self.signable_bytes()?;
        self.signature = Some(keypair.sign(&bytes));
        Ok(())
    }

    /// Verifies the signature and returns the authenticated caller.
    pub fn verify(&self) -> Result<Address, EnvelopeError> {
        let signature = self.signature.as_ref().ok_or(EnvelopeError::Unsigned)?;
        let bytes = self.signable_bytes()?;
        if !self.sender_public_key.verify(&bytes, signature) {
            return Err(EnvelopeError::InvalidSignature(self.sender()));
        }
        Ok(self.sender())
    }
}
