//! # Execution Host
//!
//! Plays the role of the execution environment around a single Trinity
//! deployment. The host authenticates callers from signed envelopes,
//! tracks native balances and nonces in an [`AccountBook`], runs calls
//! against the ledger, and keeps a receipt for every executed call.
//!
//! ## Submission pipeline
//!
//! 1. Reject envelopes signed for another chain.
//! 2. Verify the signature; the caller is the signing key's address.
//! 3. Consume the caller's nonce. From here on the submission counts,
//!    even if the call reverts, so a signed envelope can run at most once.
//! 4. Execute the call, drain the ledger's events and record a receipt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use uuid::Uuid;

use trinity_contracts::{CallContext, CallOutcome, Trinity, TrinityCall, TrinityEvent};
use trinity_protocol::config::{FAUCET_MAX_DRIP, RECEIPT_RETENTION};
use trinity_protocol::{
    AccountBook, Address, Amount, Envelope, EnvelopeError, NonceMismatch, TransferError,
};

use crate::genesis::{Genesis, GenesisError};

/// A signed ledger call.
pub type CallEnvelope = Envelope<TrinityCall>;

/// Reasons a submission or faucet request is refused before execution.
#[derive(Debug, Error)]
pub enum HostError {
    /// The envelope was signed for another network.
    #[error("wrong chain: node runs {expected}, envelope is for {got}")]
    WrongChain {
        /// This node's chain id.
        expected: u64,
        /// The envelope's chain id.
        got: u64,
    },

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Nonce(#[from] NonceMismatch),

    #[error("faucet is disabled on chain {0}")]
    FaucetDisabled(u64),

    #[error("faucet drip of {requested} wei exceeds the {max} wei limit")]
    FaucetLimit {
        /// Amount requested.
        requested: Amount,
        /// Largest allowed drip.
        max: Amount,
    },

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Final state of an executed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Record of one executed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Uuid,
    pub caller: Address,
    pub nonce: u64,
    pub method: String,
    #[serde(with = "trinity_protocol::amount::as_decimal_str")]
    pub value: Amount,
    pub status: ReceiptStatus,
    /// Return value of a successful call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CallOutcome>,
    /// Machine-readable revert reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Human-readable revert reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Events emitted by the call. Empty on revert.
    pub events: Vec<TrinityEvent>,
    pub timestamp: DateTime<Utc>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// The ledger plus the environment it runs in.
#[derive(Debug)]
pub struct Host {
    chain_id: u64,
    faucet_enabled: bool,
    ledger: Trinity,
    accounts: AccountBook,
    receipts: HashMap<Uuid, Receipt>,
    /// Receipt ids oldest first, for retention.
    receipt_order: VecDeque<Uuid>,
}

impl Host {
    /// Deploys a ledger owned by `owner` on top of `accounts`.
    pub fn new(
        chain_id: u64,
        owner: Address,
        entrance_fee: Amount,
        accounts: AccountBook,
        faucet_enabled: bool,
    ) -> Self {
        let ledger = Trinity::new(owner, entrance_fee);
        tracing::info!(
            chain_id,
            %owner,
            contract = %ledger.address(),
            entrance_fee,
            accounts = accounts.len(),
            "host ready"
        );
        Self {
            chain_id,
            faucet_enabled,
            ledger,
            accounts,
            receipts: HashMap::new(),
            receipt_order: VecDeque::new(),
        }
    }

    /// Deploys from a genesis file.
    pub fn from_genesis(genesis: &Genesis, owner: Address) -> Result<Self, GenesisError> {
        Ok(Self::new(
            genesis.chain_id,
            owner,
            genesis.entrance_fee()?,
            genesis.account_book()?,
            genesis.faucet_enabled(),
        ))
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn faucet_enabled(&self) -> bool {
        self.faucet_enabled
    }

    pub fn ledger(&self) -> &Trinity {
        &self.ledger
    }

    pub fn accounts(&self) -> &AccountBook {
        &self.accounts
    }

    pub fn receipt(&self, id: &Uuid) -> Option<&Receipt> {
        self.receipts.get(id)
    }

    pub fn receipt_count(&self) -> usize {
        self.receipts.len()
    }

    /// Authenticates and executes a signed call.
    ///
    /// A reverted call still returns `Ok` with a `Reverted` receipt; `Err`
    /// means the envelope itself was refused and nothing happened.
    ///
    /// # Errors
    ///
    /// [`HostError::WrongChain`], [`HostError::Envelope`] for a missing or
    /// bad signature, and [`HostError::Nonce`] for a stale or future nonce.
    pub fn submit(&mut self, envelope: &CallEnvelope) -> Result<Receipt, HostError> {
        if envelope.chain_id != self.chain_id {
            return Err(HostError::WrongChain {
                expected: self.chain_id,
                got: envelope.chain_id,
            });
        }
        let caller = envelope.verify()?;
        self.accounts.consume_nonce(caller, envelope.nonce)?;

        let call = envelope.payload.clone();
        let method = call.method_name();
        let ctx = CallContext {
            caller,
            value: envelope.value,
        };

        let result = self.ledger.execute(&ctx, call, &mut self.accounts);
        let events = self.ledger.take_events();

        let mut receipt = Receipt {
            id: Uuid::new_v4(),
            caller,
            nonce: envelope.nonce,
            method: method.to_string(),
            value: envelope.value,
            status: ReceiptStatus::Success,
            outcome: None,
            error_kind: None,
            error: None,
            events,
            timestamp: Utc::now(),
        };

        match result {
            Ok(outcome) => {
                tracing::info!(receipt = %receipt.id, %caller, method, "call succeeded");
                receipt.outcome = Some(outcome);
            }
            Err(e) => {
                tracing::warn!(receipt = %receipt.id, %caller, method, error = %e, "call reverted");
                receipt.status = ReceiptStatus::Reverted;
                receipt.error_kind = Some(e.kind().to_string());
                receipt.error = Some(e.to_string());
            }
        }

        self.store_receipt(receipt.clone());
        Ok(receipt)
    }

    /// Mints `amount` into `address`. Devnet only.
    ///
    /// Returns the new balance.
    pub fn faucet(&mut self, address: Address, amount: Amount) -> Result<Amount, HostError> {
        if !self.faucet_enabled {
            return Err(HostError::FaucetDisabled(self.chain_id));
        }
        if amount > FAUCET_MAX_DRIP {
            return Err(HostError::FaucetLimit {
                requested: amount,
                max: FAUCET_MAX_DRIP,
            });
        }
        let balance = self.accounts.credit(address, amount)?;
        tracing::info!(%address, amount, balance, "faucet drip");
        Ok(balance)
    }

    fn store_receipt(&mut self, receipt: Receipt) {
        self.receipt_order.push_back(receipt.id);
        self.receipts.insert(receipt.id, receipt);
        while self.receipt_order.len() > RECEIPT_RETENTION {
            if let Some(old) = self.receipt_order.pop_front() {
                self.receipts.remove(&old);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trinity_protocol::amount::parse_ether;
    use trinity_protocol::config::CHAIN_ID_LOCALHOST;
    use trinity_protocol::TrinityKeypair;

    struct Actors {
        owner: TrinityKeypair,
        alice: TrinityKeypair,
    }

    fn setup() -> (Host, Actors) {
        let owner = TrinityKeypair::from_seed(&[1; 32]);
        let alice = TrinityKeypair::from_seed(&[2; 32]);
        let mut book = AccountBook::new();
        book.credit(owner.address(), parse_ether("10").unwrap()).unwrap();
        book.credit(alice.address(), parse_ether("10").unwrap()).unwrap();
        let host = Host::new(
            CHAIN_ID_LOCALHOST,
            owner.address(),
            parse_ether("0.001").unwrap(),
            book,
            true,
        );
        (host, Actors { owner, alice })
    }

    fn call(kp: &TrinityKeypair, nonce: u64, value: Amount, payload: TrinityCall) -> CallEnvelope {
        CallEnvelope::signed(kp, CHAIN_ID_LOCALHOST, nonce, value, payload).unwrap()
    }

    #[test]
    fn signed_enlistment_executes() {
        let (mut host, a) = setup();
        let fee = host.ledger().entrance_fee();
        let receipt = host
            .submit(&call(&a.alice, 0, fee, TrinityCall::EnlistEmployer))
            .unwrap();

        assert!(receipt.is_success());
        assert_eq!(receipt.caller, a.alice.address());
        assert_eq!(receipt.outcome, Some(CallOutcome::Enlisted { stake: fee }));
        assert_eq!(receipt.events.len(), 1);
        assert!(host.ledger().is_employer(&a.alice.address()));
        assert_eq!(host.accounts().nonce_of(&a.alice.address()), 1);
        assert_eq!(host.receipt(&receipt.id), Some(&receipt));
    }

    #[test]
    fn reverted_call_consumes_nonce_and_records_reason() {
        let (mut host, a) = setup();
        let receipt = host
            .submit(&call(&a.alice, 0, 0, TrinityCall::KillSwitch))
            .unwrap();

        assert_eq!(receipt.status, ReceiptStatus::Reverted);
        assert_eq!(receipt.error_kind.as_deref(), Some("unauthorized"));
        assert!(receipt.events.is_empty());
        assert_eq!(host.accounts().nonce_of(&a.alice.address()), 1);
    }

    #[test]
    fn replayed_envelope_is_refused() {
        let (mut host, a) = setup();
        let fee = host.ledger().entrance_fee();
        let env = call(&a.alice, 0, fee, TrinityCall::EnlistEmployer);
        host.submit(&env).unwrap();

        let err = host.submit(&env).unwrap_err();
        assert!(matches!(err, HostError::Nonce(NonceMismatch { expected: 1, got: 0, .. })));
        assert_eq!(host.ledger().employer_stake(&a.alice.address()), fee);
    }

    #[test]
    fn wrong_chain_is_refused() {
        let (mut host, a) = setup();
        let env = CallEnvelope::signed(&a.owner, 42, 0, 0, TrinityCall::KillSwitch).unwrap();
        assert!(matches!(
            host.submit(&env),
            Err(HostError::WrongChain { got: 42, .. })
        ));
        assert_eq!(host.accounts().nonce_of(&a.owner.address()), 0);
    }

    #[test]
    fn tampered_envelope_is_refused() {
        let (mut host, a) = setup();
        let mut env = call(&a.alice, 0, 0, TrinityCall::KillSwitch);
        env.value = 1;
        assert!(matches!(host.submit(&env), Err(HostError::Envelope(_))));
        assert_eq!(host.receipt_count(), 0);
    }

    #[test]
    fn owner_flow_through_envelopes() {
        let (mut host, a) = setup();
        let fee = host.ledger().entrance_fee();
        let owner_addr = a.owner.address();
        let owner_before = host.accounts().balance_of(&owner_addr);

        host.submit(&call(&a.alice, 0, fee * 2, TrinityCall::EnlistEmployer))
            .unwrap();
        host.submit(&call(
            &a.owner,
            0,
            0,
            TrinityCall::AddValidator {
                validator: owner_addr,
            },
        ))
        .unwrap();
        let issued = host
            .submit(&call(
                &a.owner,
                1,
                0,
                TrinityCall::IssueSkillNft {
                    recipient: a.alice.address(),
                    metadata_uri: "uri://1".into(),
                },
            ))
            .unwrap();
        assert_eq!(issued.outcome, Some(CallOutcome::CredentialIssued { token_id: 0 }));

        let killed = host
            .submit(&call(&a.owner, 2, 0, TrinityCall::KillSwitch))
            .unwrap();
        assert_eq!(killed.outcome, Some(CallOutcome::Flushed { paid_out: fee * 2 }));
        assert_eq!(host.accounts().balance_of(&owner_addr), owner_before + fee * 2);
        assert!(!host.ledger().is_employer(&a.alice.address()));
    }

    #[test]
    fn faucet_respects_limits() {
        let (mut host, _) = setup();
        let who = Address::from_bytes([9; 20]);
        assert_eq!(host.faucet(who, 5).unwrap(), 5);
        assert!(matches!(
            host.faucet(who, FAUCET_MAX_DRIP + 1),
            Err(HostError::FaucetLimit { .. })
        ));
    }

    #[test]
    fn faucet_is_off_outside_devnet() {
        let host_owner = Address::from_bytes([1; 20]);
        let mut host = Host::new(42, host_owner, 0, AccountBook::new(), false);
        assert!(matches!(
            host.faucet(host_owner, 1),
            Err(HostError::FaucetDisabled(42))
        ));
    }
}
