//! # Custody Vault Contract
//!
//! Holds a pool of a single fungible token on behalf of depositors and
//! releases it only through a policy-checked withdrawal path.
//!
//! ## Lifecycle
//!
//! 1. **Deploy** — the deployer becomes administrator. Withdrawals start
//!    disabled, the ceiling is zero and no token is bound.
//! 2. **Configure** — the administrator binds the token, flips the
//!    kill-switch, sets the per-call ceiling and grants the withdrawer role.
//! 3. **Deposit** — anyone who approved the vault on the ledger can push
//!    tokens in. Deposits are pooled; nobody's share is tracked.
//! 4. **Withdraw** — a withdrawer sends pooled tokens to any destination.
//!
//! ## Withdrawal guard
//!
//! Each `withdraw` call runs the same chain against current configuration,
//! stopping at the first failure:
//!
//! ```text
//! enabled?  ──no──▶ "Withdraw is not available"
//!    │
//! amount ≤ ceiling? ──no──▶ "Exceed maximum amount"
//!    │
//! caller is withdrawer? ──no──▶ "Caller is not a withdrawer"
//!    │
//! ledger.transfer(vault → to, amount)
//! ```
//!
//! Nothing is written until every check has passed, and events are only
//! appended once the ledger call succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use vault_protocol::config::amount_string;
use vault_protocol::{Address, Amount, Ledger, LedgerError};

use crate::access_control::{
    withdrawer_role, AccessControl, AccessError, RoleEvent, RoleId, DEFAULT_ADMIN_ROLE,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// The kill-switch is off.
    #[error("Withdraw is not available")]
    WithdrawDisabled,

    /// The request is above the per-call ceiling.
    #[error("Exceed maximum amount (requested {requested}, maximum {maximum})")]
    ExceedsMaximum {
        /// Amount the caller asked for.
        requested: Amount,
        /// Configured ceiling at the time of the call.
        maximum: Amount,
    },

    /// The caller does not hold the withdrawer role.
    #[error("Caller is not a withdrawer")]
    NotWithdrawer(Address),

    /// An administrator-only call came from elsewhere, or a role operation
    /// was refused by the registry.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// No token has been bound yet.
    #[error("Token is not set")]
    TokenNotSet,

    /// The ledger handed to the vault is not the one it custodies.
    #[error("Token mismatch: vault custodies {bound}, got {provided}")]
    TokenMismatch {
        /// The bound token address.
        bound: Address,
        /// The address of the ledger that was supplied.
        provided: Address,
    },

    /// The depositor's ledger balance does not cover the deposit.
    #[error("Insufficient account balance (balance {balance}, requested {requested})")]
    InsufficientAccountBalance {
        /// Depositor's current balance.
        balance: Amount,
        /// Amount they tried to deposit.
        requested: Amount,
    },

    /// The ledger refused the transfer.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Coarse classification of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller lacks the administrator or withdrawer role.
    Authorization,
    /// Kill-switch is off.
    WithdrawalDisabled,
    /// Amount above the ceiling.
    LimitExceeded,
    /// Not enough balance somewhere along the transfer.
    InsufficientFunds,
    /// Not enough allowance for the pull.
    InsufficientAllowance,
    /// Token binding missing or wrong.
    Configuration,
    /// Malformed argument, e.g. the zero address as destination.
    InvalidArgument,
}

impl VaultError {
    /// The stable, string-identified failure reason.
    pub fn reason(&self) -> &'static str {
        match self {
            VaultError::WithdrawDisabled => "Withdraw is not available",
            VaultError::ExceedsMaximum { .. } => "Exceed maximum amount",
            VaultError::NotWithdrawer(_) => "Caller is not a withdrawer",
            VaultError::Access(AccessError::MissingRole { .. }) => {
                "AccessControl: account is missing role"
            }
            VaultError::Access(AccessError::BadConfirmation) => {
                "AccessControl: can only renounce roles for self"
            }
            VaultError::TokenNotSet => "Token is not set",
            VaultError::TokenMismatch { .. } => "Token mismatch",
            VaultError::InsufficientAccountBalance { .. } => "Insufficient account balance",
            VaultError::Ledger(e) => e.reason(),
        }
    }

    /// Which branch of the error taxonomy this failure belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::WithdrawDisabled => ErrorKind::WithdrawalDisabled,
            VaultError::ExceedsMaximum { .. } => ErrorKind::LimitExceeded,
            VaultError::NotWithdrawer(_) | VaultError::Access(_) => ErrorKind::Authorization,
            VaultError::TokenNotSet | VaultError::TokenMismatch { .. } => ErrorKind::Configuration,
            VaultError::InsufficientAccountBalance { .. } => ErrorKind::InsufficientFunds,
            VaultError::Ledger(LedgerError::InsufficientBalance { .. }) => {
                ErrorKind::InsufficientFunds
            }
            VaultError::Ledger(LedgerError::InsufficientAllowance { .. }) => {
                ErrorKind::InsufficientAllowance
            }
            VaultError::Ledger(_) => ErrorKind::InvalidArgument,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration & Events
// ---------------------------------------------------------------------------

/// Administrator-mutable policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Global kill-switch. Withdrawals are refused while `false`.
    pub withdraw_enabled: bool,
    /// Per-call withdrawal ceiling. Zero refuses every non-zero withdrawal.
    pub max_withdraw_amount: Amount,
    /// The ledger this vault custodies, once bound.
    pub token: Option<Address>,
}

/// Things the vault reports after a successful call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultEvent {
    Deposited {
        from: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    Withdrawn {
        by: Address,
        to: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    WithdrawEnableChanged {
        enabled: bool,
    },
    MaxWithdrawAmountChanged {
        #[serde(with = "amount_string")]
        previous: Amount,
        #[serde(with = "amount_string")]
        current: Amount,
    },
    TokenChanged {
        previous: Option<Address>,
        current: Address,
    },
    Role(RoleEvent),
}

/// A [`VaultEvent`] with the time it was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// What happened.
    pub event: VaultEvent,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// The vault contract state.
///
/// Token balances are not stored here; the pooled balance is whatever the
/// bound ledger reports for [`Vault::address`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vault {
    address: Address,
    access: AccessControl,
    config: VaultConfig,
    events: Vec<EventRecord>,
}

impl Vault {
    /// Deploys a vault at `address` with `deployer` as administrator.
    pub fn deploy(address: Address, deployer: Address) -> Self {
        info!(vault = %address, admin = %deployer, "vault deployed");
        Self {
            address,
            access: AccessControl::new(deployer),
            config: VaultConfig::default(),
            events: Vec::new(),
        }
    }

    // -- queries ------------------------------------------------------------

    /// The vault's own account on the ledger.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current policy.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn withdraw_enabled(&self) -> bool {
        self.config.withdraw_enabled
    }

    pub fn max_withdraw_amount(&self) -> Amount {
        self.config.max_withdraw_amount
    }

    pub fn token(&self) -> Option<Address> {
        self.config.token
    }

    /// The role registry.
    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn has_role(&self, role: &RoleId, account: &Address) -> bool {
        self.access.has_role(role, account)
    }

    /// Events emitted so far, oldest first.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// The pooled balance held on the bound ledger.
    pub fn balance<L: Ledger + ?Sized>(&self, ledger: &L) -> Result<Amount, VaultError> {
        self.bound_ledger(&*ledger)?;
        Ok(ledger.balance_of(&self.address))
    }

    // -- roles --------------------------------------------------------------

    /// Grants `role` to `account`. Idempotent.
    pub fn grant_role(
        &mut self,
        caller: Address,
        role: RoleId,
        account: Address,
    ) -> Result<(), VaultError> {
        let event = self.access.grant_role(caller, role, account)?;
        self.record_role(event);
        Ok(())
    }

    /// Revokes `role` from `account`. Idempotent.
    pub fn revoke_role(
        &mut self,
        caller: Address,
        role: RoleId,
        account: Address,
    ) -> Result<(), VaultError> {
        let event = self.access.revoke_role(caller, role, account)?;
        self.record_role(event);
        Ok(())
    }

    /// Drops the caller's own membership in `role`.
    pub fn renounce_role(
        &mut self,
        caller: Address,
        role: RoleId,
        confirmation: Address,
    ) -> Result<(), VaultError> {
        let event = self.access.renounce_role(caller, role, confirmation)?;
        self.record_role(event);
        Ok(())
    }

    /// Changes which role administers `role`.
    pub fn set_role_admin(
        &mut self,
        caller: Address,
        role: RoleId,
        admin_role: RoleId,
    ) -> Result<(), VaultError> {
        let event = self.access.set_role_admin(caller, role, admin_role)?;
        self.record_role(event);
        Ok(())
    }

    // -- configuration -------------------------------------------------------

    /// Turns withdrawals on or off.
    pub fn set_withdraw_enable(
        &mut self,
        caller: Address,
        enabled: bool,
    ) -> Result<(), VaultError> {
        self.only_admin(caller)?;
        self.config.withdraw_enabled = enabled;
        info!(vault = %self.address, enabled, "withdraw switch updated");
        self.emit(VaultEvent::WithdrawEnableChanged { enabled });
        Ok(())
    }

    /// Sets the per-call ceiling. Zero is accepted and blocks withdrawals.
    pub fn set_max_withdraw_amount(
        &mut self,
        caller: Address,
        amount: Amount,
    ) -> Result<(), VaultError> {
        self.only_admin(caller)?;
        let previous = self.config.max_withdraw_amount;
        self.config.max_withdraw_amount = amount;
        info!(
            vault = %self.address,
            previous = %previous,
            current = %amount,
            "withdraw ceiling updated"
        );
        self.emit(VaultEvent::MaxWithdrawAmountChanged {
            previous,
            current: amount,
        });
        Ok(())
    }

    /// Binds the custodied token.
    ///
    /// The binding can be replaced later by the administrator. Funds already
    /// pooled on the old ledger stay there and are no longer reachable
    /// through this vault, so a rebind is logged at `warn`.
    pub fn set_token(&mut self, caller: Address, token: Address) -> Result<(), VaultError> {
        self.only_admin(caller)?;
        let previous = self.config.token.replace(token);
        match previous {
            Some(old) if old != token => {
                warn!(
                    vault = %self.address,
                    previous = %old,
                    current = %token,
                    "token binding replaced"
                )
            }
            _ => info!(vault = %self.address, token = %token, "token bound"),
        }
        self.emit(VaultEvent::TokenChanged {
            previous,
            current: token,
        });
        Ok(())
    }

    // -- funds ---------------------------------------------------------------

    /// Pulls `amount` from `caller` into the pool.
    ///
    /// The caller must have approved the vault on the ledger. Any caller may
    /// deposit; no minimum or cap applies beyond the ledger's own rules.
    pub fn deposit<L: Ledger + ?Sized>(
        &mut self,
        caller: Address,
        amount: Amount,
        ledger: &mut L,
    ) -> Result<(), VaultError> {
        self.bound_ledger(&*ledger)?;

        let balance = ledger.balance_of(&caller);
        if balance < amount {
            debug!(%caller, balance = %balance, requested = %amount, "deposit rejected");
            return Err(VaultError::InsufficientAccountBalance {
                balance,
                requested: amount,
            });
        }

        ledger
            .transfer_from(self.address, caller, self.address, amount)
            .map_err(|e| {
                debug!(%caller, error = %e, "deposit rejected by ledger");
                e
            })?;

        info!(vault = %self.address, from = %caller, amount = %amount, "deposit");
        self.emit(VaultEvent::Deposited {
            from: caller,
            amount,
        });
        Ok(())
    }

    /// Sends `amount` of pooled tokens to `to`.
    pub fn withdraw<L: Ledger + ?Sized>(
        &mut self,
        caller: Address,
        amount: Amount,
        to: Address,
        ledger: &mut L,
    ) -> Result<(), VaultError> {
        if let Err(e) = self.check_withdraw(caller, amount) {
            debug!(%caller, requested = %amount, reason = e.reason(), "withdraw rejected");
            return Err(e);
        }
        self.bound_ledger(&*ledger)?;

        ledger.transfer(self.address, to, amount).map_err(|e| {
            debug!(%caller, error = %e, "withdraw rejected by ledger");
            e
        })?;

        info!(vault = %self.address, by = %caller, %to, amount = %amount, "withdraw");
        self.emit(VaultEvent::Withdrawn {
            by: caller,
            to,
            amount,
        });
        Ok(())
    }

    /// The withdrawal guard chain: switch, ceiling, role, in that order.
    pub fn check_withdraw(&self, caller: Address, amount: Amount) -> Result<(), VaultError> {
        if !self.config.withdraw_enabled {
            return Err(VaultError::WithdrawDisabled);
        }
        if amount > self.config.max_withdraw_amount {
            return Err(VaultError::ExceedsMaximum {
                requested: amount,
                maximum: self.config.max_withdraw_amount,
            });
        }
        if !self.access.has_role(&withdrawer_role(), &caller) {
            return Err(VaultError::NotWithdrawer(caller));
        }
        Ok(())
    }

    // -- internals -----------------------------------------------------------

    fn only_admin(&self, caller: Address) -> Result<(), VaultError> {
        self.access.check_role(&DEFAULT_ADMIN_ROLE, &caller).map_err(|e| {
            debug!(%caller, "admin call rejected");
            VaultError::from(e)
        })
    }

    fn bound_ledger<L: Ledger + ?Sized>(&self, ledger: &L) -> Result<(), VaultError> {
        let bound = self.config.token.ok_or(VaultError::TokenNotSet)?;
        let provided = ledger.address();
        if bound != provided {
            return Err(VaultError::TokenMismatch { bound, provided });
        }
        Ok(())
    }

    fn record_role(&mut self, event: Option<RoleEvent>) {
        if let Some(event) = event {
            self.emit(VaultEvent::Role(event));
        }
    }

    fn emit(&mut self, event: VaultEvent) {
        self.events.push(EventRecord {
            event,
            timestamp: Utc::now(),
        });
    }
}
