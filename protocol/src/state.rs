//! # Account State
//!
//! The execution environment's view of every principal: a native balance
//! and a call nonce. The registry ledger never touches these balances
//! directly; it moves funds through the [`FundsTransfer`] trait, which
//! [`AccountBook`] implements.
//!
//! ## Transfer semantics
//!
//! A transfer `from -> to` of `A`:
//!
//! 1. Verify `from.balance >= A`.
//! 2. Verify `to.balance + A` does not overflow.
//! 3. Apply both updates.
//!
//! Both checks run before either balance changes, so a failed transfer
//! leaves the book exactly as it was.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::address::Address;
use crate::amount::Amount;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while moving funds between accounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The paying account does not hold enough funds.
    #[error("insufficient balance in {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// The account being debited.
        account: Address,
        /// Its current balance.
        available: Amount,
        /// The amount requested.
        requested: Amount,
    },

    /// Crediting the receiving account would overflow.
    #[error("balance overflow in {account}: current {current}, credit {credit}")]
    Overflow {
        /// The account being credited.
        account: Address,
        /// Its balance before the failed credit.
        current: Amount,
        /// The amount that caused the overflow.
        credit: Amount,
    },

    /// The transfer mechanism refused the movement for its own reasons.
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// A call arrived with a nonce other than the one the account expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("nonce mismatch for {account}: expected {expected}, got {got}")]
pub struct NonceMismatch {
    /// The calling account.
    pub account: Address,
    /// The nonce the account will accept next.
    pub expected: u64,
    /// The nonce the call carried.
    pub got: u64,
}

// ---------------------------------------------------------------------------
// FundsTransfer
// ---------------------------------------------------------------------------

/// The external mechanism that moves value between addresses.
///
/// Implementations must be all-or-nothing: on `Err` no balance may have
/// changed.
pub trait FundsTransfer {
    /// Moves `amount` from `from` to `to`.
    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount)
        -> Result<(), TransferError>;
}

// ---------------------------------------------------------------------------
// AccountState
// ---------------------------------------------------------------------------

/// Balance and nonce of a single account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Native balance in wei.
    #[serde(with = "crate::amount::as_decimal_str")]
    pub balance: Amount,
    /// Next call nonce the account will accept.
    pub nonce: u64,
}

impl AccountState {
    /// Creates an account holding `balance`.
    pub fn with_balance(balance: Amount) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// AccountBook
// ---------------------------------------------------------------------------

/// All accounts known to the environment, ordered by address.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountBook {
    accounts: BTreeMap<Address, AccountState>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the account state, or `None` if the address has never held
    /// funds or sent a call.
    pub fn account(&self, address: &Address) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    /// Balance of `address`, 0 if unknown.
    pub fn balance_of(&self, address: &Address) -> Amount {
        self.accounts.get(address).map(|a| a.balance).unwrap_or(0)
    }

    /// Next nonce `address` must use, 0 if unknown.
    pub fn nonce_of(&self, address: &Address) -> u64 {
        self.accounts.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    /// Mints `amount` into `address` (genesis allocations, devnet faucet).
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Overflow`] if the balance would exceed `u128`.
    pub fn credit(&mut self, address: Address, amount: Amount) -> Result<Amount, TransferError> {
        let account = self.accounts.entry(address).or_default();
        let new_balance = account
            .balance
            .checked_add(amount)
            .ok_or(TransferError::Overflow {
                account: address,
                current: account.balance,
                credit: amount,
            })?;
        account.balance = new_balance;
        tracing::debug!(%address, amount, new_balance, "account credited");
        Ok(new_balance)
    }

    /// Checks `nonce` against the account's expected nonce and advances it.
    ///
    /// # Errors
    ///
    /// Returns [`NonceMismatch`] without advancing if the nonce is wrong.
    pub fn consume_nonce(&mut self, address: Address, nonce: u64) -> Result<(), NonceMismatch> {
        let expected = self.nonce_of(&address);
        if nonce != expected {
            return Err(NonceMismatch {
                account: address,
                expected,
                got: nonce,
            });
        }
        let account = self.accounts.entry(address).or_default();
        account.nonce = expected.saturating_add(1);
        Ok(())
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> Amount {
        self.accounts
            .values()
            .fold(0u128, |acc, a| acc.saturating_add(a.balance))
    }

    /// Number of known accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl FundsTransfer for AccountBook {
    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TransferError> {
        if amount == 0 {
            return Ok(());
        }

        let available = self.balance_of(from);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                account: *from,
                available,
                requested: amount,
            });
        }

        if from == to {
            return Ok(());
        }

        let current = self.balance_of(to);
        let new_to = current.checked_add(amount).ok_or(TransferError::Overflow {
            account: *to,
            current,
            credit: amount,
        })?;

        // Both sides validated; apply.
        self.accounts.entry(*from).or_default().balance = available - amount;
        self.accounts.entry(*to).or_default().balance = new_to;

        tracing::debug!(%from, %to, amount, "funds transferred");
        Ok(())
    }
}
