//! # Trinity Registry Ledger
//!
//! The permissioned registry behind Trinity. Three roles cooperate:
//!
//! - **Owner** — the deploying principal. Adds validators and holds the
//!   kill switch. Fixed at construction.
//! - **Validator** — may issue skill credentials. Validators are only ever
//!   added; there is no demotion path.
//! - **Employer** — any principal that stakes at least the entrance fee.
//!   Stakes accumulate across enlistments and are custodied at the ledger's
//!   own address until the kill switch pays them out to the owner.
//!
//! ## State machine (per employer)
//!
//! ```text
//! Unenlisted --enlist(amount >= fee)--> Enlisted(stake)
//! Enlisted   --enlist(amount >= fee)--> Enlisted(stake + amount)
//! Enlisted   --kill_switch----------->  Unenlisted
//! ```
//!
//! ## Atomicity
//!
//! Every write validates first, then moves funds through the
//! [`FundsTransfer`] seam, then commits. A failed transfer aborts the call
//! before anything is written, so a rejected call leaves the ledger and
//! every balance exactly as it found them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use trinity_protocol::{Address, Amount, FundsTransfer, TransferError};

use crate::credential::{CredentialError, CredentialRegistry, SkillCredential, TokenId};
use crate::events::TrinityEvent;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A privileged role a call may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Validator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Validator => write!(f, "validator"),
        }
    }
}

/// Errors returned by ledger operations. None of them leave partial state.
#[derive(Debug, Error)]
pub enum TrinityError {
    /// The caller lacks the role the operation requires.
    #[error("unauthorized: caller {caller} is not the {required}")]
    Unauthorized {
        /// The rejected caller.
        caller: Address,
        /// The role the operation needs.
        required: Role,
    },

    /// A non-validator tried to issue a credential.
    #[error("invalid validator: {0} is not a registered validator")]
    InvalidValidator(Address),

    /// The attached payment is below the entrance fee.
    #[error("insufficient stake: sent {sent}, entrance fee is {required}")]
    InsufficientStake {
        /// Amount attached to the call.
        sent: Amount,
        /// The entrance fee.
        required: Amount,
    },

    /// No credential was ever issued under this id.
    #[error("credential not found: token {0}")]
    NotFound(TokenId),

    /// A counter or sum would overflow.
    #[error("arithmetic overflow: {0}")]
    Overflow(&'static str),

    /// The external transfer mechanism refused the movement.
    #[error("funds transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// Value was attached to a call that does not accept payment.
    #[error("{method} is not payable (value {value} attached)")]
    NonPayable {
        /// The called method.
        method: &'static str,
        /// The value that was attached.
        value: Amount,
    },
}

impl TrinityError {
    /// Short machine-readable error kind, used in receipts and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            TrinityError::Unauthorized { .. } => "unauthorized",
            TrinityError::InvalidValidator(_) => "invalid_validator",
            TrinityError::InsufficientStake { .. } => "insufficient_stake",
            TrinityError::NotFound(_) => "not_found",
            TrinityError::Overflow(_) => "overflow",
            TrinityError::Transfer(_) => "transfer_failed",
            TrinityError::NonPayable { .. } => "non_payable",
        }
    }
}

impl From<CredentialError> for TrinityError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::IdSpaceExhausted(_) => TrinityError::Overflow("credential token id"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trinity
// ---------------------------------------------------------------------------

/// The registry ledger.
///
/// Owned by exactly one host and mutated through `&mut self`; the host is
/// responsible for serialising calls.
#[derive(Debug, Clone, Serialize)]
pub struct Trinity {
    /// Address the ledger custodies stakes under.
    address: Address,
    /// The deploying principal.
    owner: Address,
    /// Minimum stake per enlistment call, in wei. Immutable.
    entrance_fee: Amount,
    validators: BTreeSet<Address>,
    /// Employer stakes. Only entries with a non-zero stake are kept.
    employers: BTreeMap<Address, Amount>,
    credentials: CredentialRegistry,
    /// Events not yet collected by the host.
    #[serde(skip)]
    outbox: Vec<TrinityEvent>,
}

impl Trinity {
    /// Deploys a ledger owned by `owner` with the given entrance fee.
    ///
    /// A fee of zero is legal and disables the minimum-stake check.
    pub fn new(owner: Address, entrance_fee: Amount) -> Self {
        Self::deploy(owner, entrance_fee, 0)
    }

    /// Deploys a ledger whose custody address is derived from
    /// `(owner, deploy_nonce)`.
    pub fn deploy(owner: Address, entrance_fee: Amount, deploy_nonce: u64) -> Self {
        let address = Address::contract(&owner, deploy_nonce);
        tracing::info!(%owner, %address, entrance_fee, "trinity ledger deployed");
        Self {
            address,
            owner,
            entrance_fee,
            validators: BTreeSet::new(),
            employers: BTreeMap::new(),
            credentials: CredentialRegistry::new(),
            outbox: Vec::new(),
        }
    }

    // -- Queries ------------------------------------------------------------

    pub fn entrance_fee(&self) -> Amount {
        self.entrance_fee
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// The custody address holding every employer's stake.
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn is_validator(&self, address: &Address) -> bool {
        self.validators.contains(address)
    }

    /// `true` iff `address` holds a non-zero stake.
    pub fn is_employer(&self, address: &Address) -> bool {
        self.employer_stake(address) > 0
    }

    /// Stake held for `address`, 0 if it never enlisted or was flushed.
    pub fn employer_stake(&self, address: &Address) -> Amount {
        self.employers.get(address).copied().unwrap_or(0)
    }

    /// Metadata URI of credential `token_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TrinityError::NotFound`] if the id was never issued.
    pub fn credential_uri(&self, token_id: TokenId) -> Result<&str, TrinityError> {
        self.credentials
            .token_uri(token_id)
            .ok_or(TrinityError::NotFound(token_id))
    }

    /// Recipient of credential `token_id`.
    pub fn owner_of(&self, token_id: TokenId) -> Result<&Address, TrinityError> {
        self.credentials
            .owner_of(token_id)
            .ok_or(TrinityError::NotFound(token_id))
    }

    pub fn credential(&self, token_id: TokenId) -> Option<&SkillCredential> {
        self.credentials.get(token_id)
    }

    /// Number of credentials held by `holder`.
    pub fn credential_balance(&self, holder: &Address) -> u64 {
        self.credentials.balance_of(holder)
    }

    pub fn total_credentials(&self) -> u64 {
        self.credentials.total_issued()
    }

    pub fn credentials(&self) -> &CredentialRegistry {
        &self.credentials
    }

    /// Sum of all custodied stakes.
    pub fn total_staked(&self) -> Amount {
        self.employers
            .values()
            .fold(0u128, |acc, s| acc.saturating_add(*s))
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    pub fn employer_count(&self) -> usize {
        self.employers.len()
    }

    pub fn validators(&self) -> impl Iterator<Item = &Address> {
        self.validators.iter()
    }

    /// `(employer, stake)` pairs ordered by address.
    pub fn employers(&self) -> impl Iterator<Item = (&Address, Amount)> {
        self.employers.iter().map(|(a, s)| (a, *s))
    }

    /// Events emitted since the last [`take_events`](Self::take_events).
    pub fn events(&self) -> &[TrinityEvent] {
        &self.outbox
    }

    /// Drains the event outbox.
    pub fn take_events(&mut self) -> Vec<TrinityEvent> {
        std::mem::take(&mut self.outbox)
    }

    // -- Validator management -----------------------------------------------

    /// Adds `validator` to the validator set. Owner only.
    ///
    /// Adding an existing validator succeeds without changing the set; the
    /// `ValidatorAdded` event is emitted either way.
    ///
    /// # Errors
    ///
    /// Returns [`TrinityError::Unauthorized`] if `caller` is not the owner.
    pub fn add_validator(&mut self, caller: &Address, validator: Address) -> Result<(), TrinityError> {
        self.require_owner(caller)?;

        let inserted = self.validators.insert(validator);
        tracing::info!(%validator, new = inserted, "validator added");
        self.outbox.push(TrinityEvent::ValidatorAdded { validator });
        Ok(())
    }

    // -- Employer enlistment ------------------------------------------------

    /// Stakes `amount` for `caller`, making it an employer.
    ///
    /// Every call must clear the entrance fee on its own; stakes from
    /// repeated calls accumulate. The payment moves from `caller` to the
    /// ledger address through `funds`.
    ///
    /// Returns the caller's stake after the call.
    ///
    /// # Errors
    ///
    /// - [`TrinityError::InsufficientStake`] if `amount` is below the fee. No
    ///   transfer is attempted, so the payment never leaves the caller.
    /// - [`TrinityError::Overflow`] if the stake would overflow.
    /// - [`TrinityError::Transfer`] if the payment could not be collected.
    pub fn enlist_employer<F: FundsTransfer>(
        &mut self,
        caller: &Address,
        amount: Amount,
        funds: &mut F,
    ) -> Result<Amount, TrinityError> {
        if amount < self.entrance_fee {
            tracing::debug!(%caller, amount, fee = self.entrance_fee, "enlistment below entrance fee");
            return Err(TrinityError::InsufficientStake {
                sent: amount,
                required: self.entrance_fee,
            });
        }

        let stake = self
            .employer_stake(caller)
            .checked_add(amount)
            .ok_or(TrinityError::Overflow("employer stake"))?;

        funds.transfer(caller, &self.address, amount)?;

        // Payment collected; commit.
        if stake > 0 {
            self.employers.insert(*caller, stake);
        }
        tracing::info!(employer = %caller, amount, stake, "employer enlisted");
        self.outbox.push(TrinityEvent::EmployerEnlisted {
            employer: *caller,
            amount,
            stake,
        });
        Ok(stake)
    }

    // -- Credential issuance ------------------------------------------------

    /// Issues a skill credential to `recipient`. Validators only.
    ///
    /// The metadata URI is opaque and may be empty. Returns the new token id.
    ///
    /// # Errors
    ///
    /// - [`TrinityError::InvalidValidator`] if `caller` is not a validator.
    /// - [`TrinityError::Overflow`] if the token id space is exhausted.
    pub fn issue_skill_nft(
        &mut self,
        caller: &Address,
        recipient: Address,
        metadata_uri: String,
    ) -> Result<TokenId, TrinityError> {
        if !self.is_validator(caller) {
            return Err(TrinityError::InvalidValidator(*caller));
        }

        let token_id = self
            .credentials
            .issue(recipient, *caller, metadata_uri.clone())?;

        tracing::info!(token_id, %recipient, issuer = %caller, "skill credential issued");
        self.outbox.push(TrinityEvent::SkillNftIssued {
            token_id,
            recipient,
            issuer: *caller,
            metadata_uri,
        });
        Ok(token_id)
    }

    // -- Kill switch --------------------------------------------------------

    /// Revokes every employer and pays all custodied stake to the owner.
    /// Owner only.
    ///
    /// Validators and credentials are untouched. With no employers the call
    /// still succeeds and pays nothing. Returns the amount paid out.
    ///
    /// # Errors
    ///
    /// - [`TrinityError::Unauthorized`] if `caller` is not the owner.
    /// - [`TrinityError::Overflow`] if the stake total overflows.
    /// - [`TrinityError::Transfer`] if the payout fails; no stake is cleared.
    pub fn kill_switch<F: FundsTransfer>(
        &mut self,
        caller: &Address,
        funds: &mut F,
    ) -> Result<Amount, TrinityError> {
        self.require_owner(caller)?;

        let total = self
            .employers
            .values()
            .try_fold(0u128, |acc, s| acc.checked_add(*s))
            .ok_or(TrinityError::Overflow("kill switch total"))?;

        if total > 0 {
            funds.transfer(&self.address, &self.owner, total)?;
        }

        let flushed = self.employers.len();
        self.employers.clear();

        tracing::warn!(owner = %self.owner, total, employers = flushed, "kill switch engaged");
        self.outbox.push(TrinityEvent::EmployersFlushed {
            owner: self.owner,
            amount: total,
            employers: flushed,
        });
        Ok(total)
    }

    fn require_owner(&self, caller: &Address) -> Result<(), TrinityError> {
        if caller != &self.owner {
            tracing::debug!(%caller, "owner-only call rejected");
            return Err(TrinityError::Unauthorized {
                caller: *caller,
                required: Role::Owner,
            });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn credentials_mut(&mut self) -> &mut CredentialRegistry {
        &mut self.credentials
    }
}
