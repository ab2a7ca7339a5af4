//! # Skill Credentials
//!
//! A minimal non-fungible credential registry. Each credential links a
//! recipient to an opaque metadata URI and is identified by a sequential
//! [`TokenId`] starting at 0. The registry is append-only: credentials are
//! never burned, transferred or edited, and ids are never reused.
//!
//! Authorization lives in [`crate::registry::Trinity`]; this module only
//! keeps the books.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use trinity_protocol::Address;

/// Sequential credential identifier.
pub type TokenId = u64;

/// Errors raised by the credential registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Every representable token id has been handed out.
    #[error("token id space exhausted at {0}")]
    IdSpaceExhausted(TokenId),
}

/// An issued skill credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCredential {
    /// Sequential identifier.
    pub token_id: TokenId,
    /// The principal the credential was issued to.
    pub recipient: Address,
    /// The validator that issued it.
    pub issuer: Address,
    /// Opaque metadata reference, passed through unvalidated.
    pub metadata_uri: String,
    /// When the credential was recorded.
    pub issued_at: DateTime<Utc>,
}

/// Append-only store of issued credentials.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CredentialRegistry {
    credentials: BTreeMap<TokenId, SkillCredential>,
    /// Credential count per recipient.
    holdings: BTreeMap<Address, u64>,
    next_token_id: TokenId,
}

impl CredentialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next issuance will receive.
    pub fn next_token_id(&self) -> TokenId {
        self.next_token_id
    }

    /// Records a new credential and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::IdSpaceExhausted`] once the counter can no
    /// longer advance. Nothing is recorded in that case.
    pub fn issue(
        &mut self,
        recipient: Address,
        issuer: Address,
        metadata_uri: String,
    ) -> Result<TokenId, CredentialError> {
        let token_id = self.next_token_id;
        let next = token_id
            .checked_add(1)
            .ok_or(CredentialError::IdSpaceExhausted(token_id))?;

        self.credentials.insert(
            token_id,
            SkillCredential {
                token_id,
                recipient,
                issuer,
                metadata_uri,
                issued_at: Utc::now(),
            },
        );
        *self.holdings.entry(recipient).or_insert(0) += 1;
        self.next_token_id = next;

        Ok(token_id)
    }

    pub fn get(&self, token_id: TokenId) -> Option<&SkillCredential> {
        self.credentials.get(&token_id)
    }

    /// Metadata URI of `token_id`, or `None` if it was never issued.
    pub fn token_uri(&self, token_id: TokenId) -> Option<&str> {
        self.credentials
            .get(&token_id)
            .map(|c| c.metadata_uri.as_str())
    }

    /// Recipient of `token_id`, or `None` if it was never issued.
    pub fn owner_of(&self, token_id: TokenId) -> Option<&Address> {
        self.credentials.get(&token_id).map(|c| &c.recipient)
    }

    /// Number of credentials held by `holder`.
    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.holdings.get(holder).copied().unwrap_or(0)
    }

    /// Total credentials ever issued.
    pub fn total_issued(&self) -> u64 {
        self.credentials.len() as u64
    }

    /// Credentials in issuance order.
    pub fn iter(&self) -> impl Iterator<Item = &SkillCredential> {
        self.credentials.values()
    }

    /// Credentials issued by `issuer`, in issuance order.
    pub fn issued_by<'a>(
        &'a self,
        issuer: &'a Address,
    ) -> impl Iterator<Item = &'a SkillCredential> + 'a {
        self.credentials.values().filter(move |c| &c.issuer == issuer)
    }

    #[cfg(test)]
    pub(crate) fn set_next_token_id(&mut self, next: TokenId) {
        self.next_token_id = next;
    }
}
