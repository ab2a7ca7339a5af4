//! # Call Dispatch
//!
//! Routes a decoded [`TrinityCall`] to the matching ledger operation, the
//! way an EVM routes a transaction to a contract method. The host decodes
//! calls from signed envelopes; this module only checks payability and
//! forwards.

use serde::{Deserialize, Serialize};
use trinity_protocol::{Address, Amount, FundsTransfer};

use crate::credential::TokenId;
use crate::registry::{Trinity, TrinityError};

/// A state-changing ledger call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum TrinityCall {
    AddValidator { validator: Address },
    EnlistEmployer,
    IssueSkillNft { recipient: Address, metadata_uri: String },
    KillSwitch,
}

impl TrinityCall {
    /// Method name as it appears on the wire.
    pub fn method_name(&self) -> &'static str {
        match self {
            TrinityCall::AddValidator { .. } => "add_validator",
            TrinityCall::EnlistEmployer => "enlist_employer",
            TrinityCall::IssueSkillNft { .. } => "issue_skill_nft",
            TrinityCall::KillSwitch => "kill_switch",
        }
    }

    /// Whether the call may carry value.
    pub fn is_payable(&self) -> bool {
        matches!(self, TrinityCall::EnlistEmployer)
    }
}

/// Who is calling and how much value they attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub value: Amount,
}

/// What a successful call returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallOutcome {
    ValidatorAdded {
        validator: Address,
    },
    Enlisted {
        #[serde(with = "trinity_protocol::amount::as_decimal_str")]
        stake: Amount,
    },
    CredentialIssued {
        token_id: TokenId,
    },
    Flushed {
        #[serde(with = "trinity_protocol::amount::as_decimal_str")]
        paid_out: Amount,
    },
}

impl Trinity {
    /// Executes `call` on behalf of `ctx.caller`.
    ///
    /// # Errors
    ///
    /// [`TrinityError::NonPayable`] if value is attached to anything other
    /// than `enlist_employer`; otherwise whatever the operation returns.
    pub fn execute<F: FundsTransfer>(
        &mut self,
        ctx: &CallContext,
        call: TrinityCall,
        funds: &mut F,
    ) -> Result<CallOutcome, TrinityError> {
        if ctx.value > 0 && !call.is_payable() {
            return Err(TrinityError::NonPayable {
                method: call.method_name(),
                value: ctx.value,
            });
        }

        tracing::debug!(caller = %ctx.caller, method = call.method_name(), value = ctx.value, "executing call");

        match call {
            TrinityCall::AddValidator { validator } => {
                self.add_validator(&ctx.caller, validator)?;
                Ok(CallOutcome::ValidatorAdded { validator })
            }
            TrinityCall::EnlistEmployer => {
                let stake = self.enlist_employer(&ctx.caller, ctx.value, funds)?;
                Ok(CallOutcome::Enlisted { stake })
            }
            TrinityCall::IssueSkillNft {
                recipient,
                metadata_uri,
            } => {
                let token_id = self.issue_skill_nft(&ctx.caller, recipient, metadata_uri)?;
                Ok(CallOutcome::CredentialIssued { token_id })
            }
            TrinityCall::KillSwitch => {
                let paid_out = self.kill_switch(&ctx.caller, funds)?;
                Ok(CallOutcome::Flushed { paid_out })
            }
        }
    }
}
