//! # Ledger Events
//!
//! Notifications emitted by successful ledger operations. The ledger only
//! appends them to its outbox; delivery to listeners (WebSocket clients,
//! logs, metrics) is the host's job and is fire-and-forget.

use serde::{Deserialize, Serialize};
use std::fmt;
use trinity_protocol::{Address, Amount};

use crate::credential::TokenId;

/// An observable side effect of a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrinityEvent {
    /// The owner added `validator` to the validator set.
    ValidatorAdded {
        validator: Address,
    },
    /// `employer` staked `amount`, bringing its stake to `stake`.
    EmployerEnlisted {
        employer: Address,
        #[serde(with = "trinity_protocol::amount::as_decimal_str")]
        amount: Amount,
        #[serde(with = "trinity_protocol::amount::as_decimal_str")]
        stake: Amount,
    },
    /// `issuer` issued credential `token_id` to `recipient`.
    SkillNftIssued {
        token_id: TokenId,
        recipient: Address,
        issuer: Address,
        metadata_uri: String,
    },
    /// The kill switch cleared `employers` stakes and paid `amount` to `owner`.
    EmployersFlushed {
        owner: Address,
        #[serde(with = "trinity_protocol::amount::as_decimal_str")]
        amount: Amount,
        employers: usize,
    },
}

impl TrinityEvent {
    /// Stable event name, used as a log field and metric label.
    pub fn name(&self) -> &'static str {
        match self {
            TrinityEvent::ValidatorAdded { .. } => "ValidatorAdded",
            TrinityEvent::EmployerEnlisted { .. } => "EmployerEnlisted",
            TrinityEvent::SkillNftIssued { .. } => "SkillNFTIssued",
            TrinityEvent::EmployersFlushed { .. } => "EmployersFlushed",
        }
    }
}

impl fmt::Display for TrinityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrinityEvent::ValidatorAdded { validator } => {
                write!(f, "ValidatorAdded({})", validator)
            }
            TrinityEvent::EmployerEnlisted { employer, .. } => {
                write!(f, "EmployerEnlisted({})", employer)
            }
            TrinityEvent::SkillNftIssued {
                recipient,
                issuer,
                metadata_uri,
                ..
            } => write!(
                f,
                "SkillNFTIssued({}, {}, {:?})",
                recipient, issuer, metadata_uri
            ),
            TrinityEvent::EmployersFlushed { owner, amount, .. } => {
                write!(f, "EmployersFlushed({}, {})", owner, amount)
            }
        }
    }
}
