//! # Genesis Configuration
//!
//! The JSON file a node boots its deployment from:
//!
//! ```json
//! {
//!   "chain_id": 31337,
//!   "entrance_fee": "0.001",
//!   "allocations": { "0x…": "100000000000000000000" }
//! }
//! ```
//!
//! `entrance_fee` is in ether and falls back to the network table when
//! omitted. Allocation balances are wei decimal strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use trinity_protocol::amount::{format_ether, parse_ether, AmountError};
use trinity_protocol::config::NetworkConfig;
use trinity_protocol::{AccountBook, Address, Amount, TransferError};

/// Errors raised while loading or resolving a genesis file.
#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("failed to read genesis file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed genesis file: {0}")]
    Json(#[from] serde_json::Error),

    /// The chain is not in the network table and no fee was given.
    #[error("unknown chain {0}: set entrance_fee explicitly")]
    UnknownChain(u64),

    #[error("invalid entrance fee: {0}")]
    InvalidFee(AmountError),

    #[error("invalid allocation for {address}: {reason}")]
    InvalidAllocation {
        /// The allocated account.
        address: Address,
        /// What was wrong with the balance.
        reason: String,
    },

    #[error("allocations overflow: {0}")]
    Overflow(#[from] TransferError),
}

/// Parsed genesis file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    /// Chain every envelope must be signed for.
    pub chain_id: u64,
    /// Entrance fee in ether. `None` uses the network default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrance_fee: Option<String>,
    /// Initial balances in wei.
    #[serde(default)]
    pub allocations: BTreeMap<Address, String>,
}

impl Genesis {
    /// Genesis for `network` that funds only `owner`.
    pub fn for_network(network: &NetworkConfig, owner: Address, owner_balance: Amount) -> Self {
        let mut allocations = BTreeMap::new();
        allocations.insert(owner, owner_balance.to_string());
        Self {
            chain_id: network.chain_id,
            entrance_fee: Some(format_ether(network.entrance_fee)),
            allocations,
        }
    }

    /// Reads and parses a genesis file.
    pub fn load(path: &Path) -> Result<Self, GenesisError> {
        let raw = std::fs::read_to_string(path)?;
        let genesis: Genesis = serde_json::from_str(&raw)?;
        tracing::debug!(path = %path.display(), chain_id = genesis.chain_id, "genesis loaded");
        Ok(genesis)
    }

    /// Writes the genesis file as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), GenesisError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// The network entry for this chain, if it is a known one.
    pub fn network(&self) -> Option<&'static NetworkConfig> {
        NetworkConfig::for_chain(self.chain_id)
    }

    /// Entrance fee in wei.
    pub fn entrance_fee(&self) -> Result<Amount, GenesisError> {
        match &self.entrance_fee {
            Some(ether) => parse_ether(ether).map_err(GenesisError::InvalidFee),
            None => self
                .network()
                .map(|n| n.entrance_fee)
                .ok_or(GenesisError::UnknownChain(self.chain_id)),
        }
    }

    /// Whether the faucet may mint on this chain.
    pub fn faucet_enabled(&self) -> bool {
        self.network().map(|n| n.faucet_enabled).unwrap_or(false)
    }

    /// Builds the initial account book from the allocations.
    pub fn account_book(&self) -> Result<AccountBook, GenesisError> {
        let mut book = AccountBook::new();
        for (address, balance) in &self.allocations {
            let wei: Amount = balance
                .parse()
                .map_err(|e: std::num::ParseIntError| GenesisError::InvalidAllocation {
                    address: *address,
                    reason: e.to_string(),
                })?;
            book.credit(*address, wei)?;
        }
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trinity_protocol::config::{CHAIN_ID_KOVAN, CHAIN_ID_LOCALHOST};

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn parses_a_full_file() {
        let json = format!(
            r#"{{"chain_id":31337,"entrance_fee":"0.002","allocations":{{"{}":"500"}}}}"#,
            addr(1)
        );
        let genesis: Genesis = serde_json::from_str(&json).unwrap();
        assert_eq!(genesis.entrance_fee().unwrap(), 2_000_000_000_000_000);
        assert_eq!(genesis.account_book().unwrap().balance_of(&addr(1)), 500);
        assert!(genesis.faucet_enabled());
    }

    #[test]
    fn fee_defaults_to_network_table() {
        let genesis: Genesis = serde_json::from_str(r#"{"chain_id":42}"#).unwrap();
        let kovan = NetworkConfig::for_chain(CHAIN_ID_KOVAN).unwrap();
        assert_eq!(genesis.entrance_fee().unwrap(), kovan.entrance_fee);
        assert!(!genesis.faucet_enabled());
    }

    #[test]
    fn unknown_chain_requires_explicit_fee() {
        let genesis: Genesis = serde_json::from_str(r#"{"chain_id":5}"#).unwrap();
        assert!(matches!(
            genesis.entrance_fee(),
            Err(GenesisError::UnknownChain(5))
        ));
    }

    #[test]
    fn bad_allocation_is_reported() {
        let mut genesis = Genesis::for_network(
            NetworkConfig::for_chain(CHAIN_ID_LOCALHOST).unwrap(),
            addr(1),
            10,
        );
        genesis.allocations.insert(addr(2), "ten".into());
        assert!(matches!(
            genesis.account_book(),
            Err(GenesisError::InvalidAllocation { address, .. }) if address == addr(2)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genesis.json");
        let genesis = Genesis::for_network(
            NetworkConfig::for_chain(CHAIN_ID_LOCALHOST).unwrap(),
            addr(7),
            1_000,
        );
        genesis.save(&path).unwrap();
        assert_eq!(Genesis::load(&path).unwrap(), genesis);
    }
}
