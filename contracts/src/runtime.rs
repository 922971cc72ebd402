//! # Serial Runtime
//!
//! A tiny execution environment holding one token ledger and one vault, the
//! pair every scenario deploys. Calls are applied one at a time and each is
//! all-or-nothing across *both* contracts: the call runs against a copy of
//! the state and the copy replaces the original only if the call succeeded.
//!
//! [`SharedRuntime`] puts the runtime behind a `parking_lot::Mutex` so that
//! callers on several threads still observe a single global call order.
//! Whoever takes the lock first goes first; there is no queueing beyond that.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use vault_protocol::config::amount_string;
use vault_protocol::{Address, Amount, Ledger, LedgerError, TokenLedger};

use crate::access_control::RoleId;
use crate::vault::{ErrorKind, Vault, VaultError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A rejected call. The runtime state is unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Refused by the vault.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Refused by the token ledger on a direct token call.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl RuntimeError {
    /// The stable revert string.
    pub fn reason(&self) -> &'static str {
        match self {
            RuntimeError::Vault(e) => e.reason(),
            RuntimeError::Ledger(e) => e.reason(),
        }
    }

    /// Taxonomy bucket, mapping direct ledger failures the same way the
    /// vault maps ledger failures it propagates.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Vault(e) => e.kind(),
            RuntimeError::Ledger(e) => VaultError::Ledger(e.clone()).kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Calls & Receipts
// ---------------------------------------------------------------------------

/// Every entry point a caller can reach, on either contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Call {
    GrantRole {
        role: RoleId,
        account: Address,
    },
    RevokeRole {
        role: RoleId,
        account: Address,
    },
    RenounceRole {
        role: RoleId,
        confirmation: Address,
    },
    SetRoleAdmin {
        role: RoleId,
        admin_role: RoleId,
    },
    SetWithdrawEnable {
        enabled: bool,
    },
    SetMaxWithdrawAmount {
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    SetToken {
        token: Address,
    },
    Deposit {
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    Withdraw {
        #[serde(with = "amount_string")]
        amount: Amount,
        to: Address,
    },
    Transfer {
        to: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    Approve {
        spender: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    TransferFrom {
        from: Address,
        to: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
}

impl Call {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Call::GrantRole { .. } => "grant_role",
            Call::RevokeRole { .. } => "revoke_role",
            Call::RenounceRole { .. } => "renounce_role",
            Call::SetRoleAdmin { .. } => "set_role_admin",
            Call::SetWithdrawEnable { .. } => "set_withdraw_enable",
            Call::SetMaxWithdrawAmount { .. } => "set_max_withdraw_amount",
            Call::SetToken { .. } => "set_token",
            Call::Deposit { .. } => "deposit",
            Call::Withdraw { .. } => "withdraw",
            Call::Transfer { .. } => "transfer",
            Call::Approve { .. } => "approve",
            Call::TransferFrom { .. } => "transfer_from",
        }
    }
}

/// Proof that a call was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Unique receipt identifier.
    pub id: Uuid,
    /// Position in the global call order, starting at 1.
    pub sequence: u64,
    pub caller: Address,
    pub call: Call,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Ledger + vault, executed serially.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runtime {
    owner: Address,
    ledger: TokenLedger,
    vault: Vault,
    sequence: u64,
}

impl Runtime {
    /// Deploys the standard fixture: `owner` deploys the token (receiving
    /// the whole supply) and the vault, then binds the token to the vault.
    pub fn deploy(owner: Address) -> Result<Self, RuntimeError> {
        let ledger = TokenLedger::deploy(Address::from_label("token"), owner);
        let mut vault = Vault::deploy(Address::from_label("vault"), owner);
        vault.set_token(owner, ledger.address())?;
        Ok(Self::from_parts(owner, ledger, vault))
    }

    /// Wraps already-deployed contracts.
    pub fn from_parts(owner: Address, ledger: TokenLedger, vault: Vault) -> Self {
        info!(
            owner = %owner,
            token = %ledger.address(),
            vault = %vault.address(),
            "runtime ready"
        );
        Self {
            owner,
            ledger,
            vault,
            sequence: 0,
        }
    }

    /// The deployer account.
    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Number of calls applied so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Ledger balance of `account`.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.ledger.balance_of(account)
    }

    /// Ledger balance of the vault's own account.
    pub fn vault_balance(&self) -> Amount {
        self.ledger.balance_of(&self.vault.address())
    }

    /// Applies `call` as `caller`, atomically.
    pub fn execute(&mut self, caller: Address, call: Call) -> Result<Receipt, RuntimeError> {
        let mut ledger = self.ledger.clone();
        let mut vault = self.vault.clone();

        if let Err(e) = Self::dispatch(&mut ledger, &mut vault, caller, &call) {
            debug!(%caller, call = call.name(), reason = e.reason(), "call reverted");
            return Err(e);
        }

        self.ledger = ledger;
        self.vault = vault;
        self.sequence += 1;

        debug!(%caller, call = call.name(), sequence = self.sequence, "call applied");
        Ok(Receipt {
            id: Uuid::new_v4(),
            sequence: self.sequence,
            caller,
            call,
            timestamp: Utc::now(),
        })
    }

    fn dispatch(
        ledger: &mut TokenLedger,
        vault: &mut Vault,
        caller: Address,
        call: &Call,
    ) -> Result<(), RuntimeError> {
        match *call {
            Call::GrantRole { role, account } => vault.grant_role(caller, role, account)?,
            Call::RevokeRole { role, account } => vault.revoke_role(caller, role, account)?,
            Call::RenounceRole { role, confirmation } => {
                vault.renounce_role(caller, role, confirmation)?
            }
            Call::SetRoleAdmin { role, admin_role } => {
                vault.set_role_admin(caller, role, admin_role)?
            }
            Call::SetWithdrawEnable { enabled } => vault.set_withdraw_enable(caller, enabled)?,
            Call::SetMaxWithdrawAmount { amount } => {
                vault.set_max_withdraw_amount(caller, amount)?
            }
            Call::SetToken { token } => vault.set_token(caller, token)?,
            Call::Deposit { amount } => vault.deposit(caller, amount, ledger)?,
            Call::Withdraw { amount, to } => vault.withdraw(caller, amount, to, ledger)?,
            Call::Transfer { to, amount } => ledger.transfer(caller, to, amount)?,
            Call::Approve { spender, amount } => ledger.approve(caller, spender, amount)?,
            Call::TransferFrom { from, to, amount } => {
                ledger.transfer_from(caller, from, to, amount)?
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SharedRuntime
// ---------------------------------------------------------------------------

/// Thread-safe handle to a [`Runtime`]. Clones share the same state.
#[derive(Debug, Clone)]
pub struct SharedRuntime {
    inner: Arc<Mutex<Runtime>>,
}

impl SharedRuntime {
    pub fn new(runtime: Runtime) -> Self {
        Self {
            inner: Arc::new(Mutex::new(runtime)),
        }
    }

    /// Applies one call while holding the lock.
    pub fn submit(&self, caller: Address, call: Call) -> Result<Receipt, RuntimeError> {
        self.inner.lock().execute(caller, call)
    }

    /// Runs a read-only closure against the current state.
    pub fn read<T>(&self, f: impl FnOnce(&Runtime) -> T) -> T {
        f(&self.inner.lock())
    }

    /// A point-in-time copy of the whole state.
    pub fn snapshot(&self) -> Runtime {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_control::withdrawer_role;
    use vault_protocol::config::tokens;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    #[test]
    fn deploy_binds_token() {
        let rt = Runtime::deploy(addr("owner")).unwrap();
        assert_eq!(rt.vault().token(), Some(rt.ledger().address()));
        assert_eq!(rt.sequence(), 0);
        assert_eq!(rt.vault_balance(), 0);
    }

    #[test]
    fn failed_call_does_not_advance_sequence() {
        let mut rt = Runtime::deploy(addr("owner")).unwrap();
        let err = rt
            .execute(addr("alice"), Call::SetWithdrawEnable { enabled: true })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(rt.sequence(), 0);
        assert!(!rt.vault().withdraw_enabled());
    }

    #[test]
    fn receipts_are_sequential_and_unique() {
        let mut rt = Runtime::deploy(addr("owner")).unwrap();
        let a = rt
            .execute(addr("owner"), Call::SetWithdrawEnable { enabled: true })
            .unwrap();
        let b = rt
            .execute(
                addr("owner"),
                Call::GrantRole {
                    role: withdrawer_role(),
                    account: addr("bob"),
                },
            )
            .unwrap();
        assert_eq!((a.sequence, b.sequence), (1, 2));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn direct_ledger_errors_are_classified() {
        let mut rt = Runtime::deploy(addr("owner")).unwrap();
        let err = rt
            .execute(
                addr("alice"),
                Call::Transfer {
                    to: addr("bob"),
                    amount: tokens(1),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(err.reason(), "ERC20: transfer amount exceeds balance");
    }

    #[test]
    fn calls_with_large_amounts_round_trip() {
        let call = Call::Withdraw {
            amount: tokens(300_000),
            to: addr("alice"),
        };
        let json = serde_json::to_string(&call).unwrap();
        assert!(json.contains(r#""amount":"300000000000000000000000""#));
        let back: Call = serde_json::from_str(&json).unwrap();
        assert_eq!(back, call);
    }

    #[test]
    fn runtime_snapshot_round_trips() {
        let mut rt = Runtime::deploy(addr("owner")).unwrap();
        rt.execute(
            addr("owner"),
            Call::Transfer {
                to: addr("alice"),
                amount: tokens(1_000),
            },
        )
        .unwrap();
        rt.execute(
            addr("alice"),
            Call::Approve {
                spender: rt.vault().address(),
                amount: tokens(1_000),
            },
        )
        .unwrap();
        let receipt = rt
            .execute(addr("alice"), Call::Deposit { amount: tokens(600) })
            .unwrap();

        let json = serde_json::to_string(&rt).unwrap();
        let back: Runtime = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sequence(), 3);
        assert_eq!(back.vault_balance(), tokens(600));
        assert_eq!(back.balance_of(&addr("alice")), tokens(400));
        assert_eq!(back.ledger().events(), rt.ledger().events());
        assert_eq!(back.vault().events(), rt.vault().events());

        let receipt_json = serde_json::to_string(&receipt).unwrap();
        let receipt_back: Receipt = serde_json::from_str(&receipt_json).unwrap();
        assert_eq!(receipt_back, receipt);
    }

    #[test]
    fn call_json_shape() {
        let call = Call::SetWithdrawEnable { enabled: true };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["call"], "set_withdraw_enable");
        assert_eq!(json["enabled"], true);
        let back: Call = serde_json::from_value(json).unwrap();
        assert_eq!(back, call);
    }
}
