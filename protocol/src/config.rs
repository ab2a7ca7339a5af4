//! # Protocol Configuration & Constants
//!
//! Every magic number in Trinity lives here: chain identifiers, the per
//! network entrance fee table, the signing domain and default ports.
//! Runtime overrides (genesis files, CLI flags) are layered on top of these
//! by the node.

use crate::amount::{Amount, WEI_PER_ETHER};

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol version reported by nodes.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Domain tag mixed into every call signature. Bump the suffix if the
/// signable layout ever changes.
pub const CALL_SIGNING_DOMAIN: &str = "trinity-call-v1";

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

/// Local development chain.
pub const CHAIN_ID_LOCALHOST: u64 = 31337;

/// Kovan testnet.
pub const CHAIN_ID_KOVAN: u64 = 42;

/// Polygon mainnet.
pub const CHAIN_ID_POLYGON: u64 = 137;

/// Static parameters of a known network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Chain identifier signed into every envelope.
    pub chain_id: u64,
    /// Human-readable name, for logs and `/status`.
    pub name: &'static str,
    /// Entrance fee a fresh deployment uses unless the genesis overrides it.
    pub entrance_fee: Amount,
    /// Whether the devnet faucet may mint funds.
    pub faucet_enabled: bool,
}

/// Every network a node knows how to start.
pub const NETWORKS: &[NetworkConfig] = &[
    NetworkConfig {
        chain_id: CHAIN_ID_LOCALHOST,
        name: "localhost",
        entrance_fee: WEI_PER_ETHER / 1_000, // 0.001
        faucet_enabled: true,
    },
    NetworkConfig {
        chain_id: CHAIN_ID_KOVAN,
        name: "kovan",
        entrance_fee: WEI_PER_ETHER / 100, // 0.01
        faucet_enabled: false,
    },
    NetworkConfig {
        chain_id: CHAIN_ID_POLYGON,
        name: "polygon",
        entrance_fee: WEI_PER_ETHER / 100, // 0.01
        faucet_enabled: false,
    },
];

impl NetworkConfig {
    /// Looks up a network by chain id.
    pub fn for_chain(chain_id: u64) -> Option<&'static NetworkConfig> {
        NETWORKS.iter().find(|n| n.chain_id == chain_id)
    }

    /// Looks up a network by name (case-insensitive).
    pub fn by_name(name: &str) -> Option<&'static NetworkConfig> {
        NETWORKS.iter().find(|n| n.name.eq_ignore_ascii_case(name))
    }
}

/// Returns a friendly name for a chain id, mainly for logging.
pub fn network_name(chain_id: u64) -> String {
    match NetworkConfig::for_chain(chain_id) {
        Some(n) => n.name.to_string(),
        None => format!("unknown({})", chain_id),
    }
}

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default JSON-RPC / REST port.
pub const DEFAULT_RPC_PORT: u16 = 8545;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9545;

/// Largest single faucet drip on devnet: 10 ether.
pub const FAUCET_MAX_DRIP: Amount = 10 * WEI_PER_ETHER;

/// Number of receipts the host keeps before dropping the oldest.
pub const RECEIPT_RETENTION: usize = 10_000;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::parse_ether;

    #[test]
    fn chain_ids_are_distinct() {
        for (i, a) in NETWORKS.iter().enumerate() {
            for b in &NETWORKS[i + 1..] {
                assert_ne!(a.chain_id, b.chain_id);
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn fee_table_matches_ether_values() {
        let local = NetworkConfig::for_chain(CHAIN_ID_LOCALHOST).unwrap();
        assert_eq!(local.entrance_fee, parse_ether("0.001").unwrap());

        let kovan = NetworkConfig::for_chain(CHAIN_ID_KOVAN).unwrap();
        assert_eq!(kovan.entrance_fee, parse_ether("0.01").unwrap());
    }

    #[test]
    fn only_localhost_has_a_faucet() {
        let with_faucet: Vec<_> = NETWORKS.iter().filter(|n| n.faucet_enabled).collect();
        assert_eq!(with_faucet.len(), 1);
        assert_eq!(with_faucet[0].chain_id, CHAIN_ID_LOCALHOST);
    }

    #[test]
    fn lookup_by_name_is_case_insensitive() {
        assert_eq!(
            NetworkConfig::by_name("Kovan").map(|n| n.chain_id),
            Some(CHAIN_ID_KOVAN)
        );
        assert!(NetworkConfig::by_name("ropsten").is_none());
    }

    #[test]
    fn network_name_formatting() {
        assert_eq!(network_name(CHAIN_ID_POLYGON), "polygon");
        assert_eq!(network_name(5), "unknown(5)");
    }
}
