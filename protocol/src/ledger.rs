//! # Token Ledger
//!
//! The fungible-token collaborator the vault custodies. The vault never
//! touches balances directly; it talks to whatever implements [`Ledger`],
//! which is what lets the contract tests swap in a mock ledger without a
//! real token behind it.
//!
//! [`TokenLedger`] is the in-memory implementation with the familiar rules:
//!
//! - `transfer` moves the caller's own balance.
//! - `approve` overwrites the allowance a spender may consume.
//! - `transfer_from` consumes allowance, then moves the owner's balance.
//!   An allowance of `Amount::MAX` is treated as infinite and never shrinks.
//!
//! Every method validates first and mutates last, so an `Err` always means
//! the ledger is untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::address::Address;
use crate::config::{
    amount_string, Amount, TOKEN_CAP, TOKEN_DECIMALS, TOKEN_NAME, TOKEN_SYMBOL,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The sender's balance does not cover the transfer.
    #[error("ERC20: transfer amount exceeds balance (account {account}, balance {balance}, needed {needed})")]
    InsufficientBalance {
        /// The account being debited.
        account: Address,
        /// Its current balance.
        balance: Amount,
        /// The amount the transfer required.
        needed: Amount,
    },

    /// The spender's allowance does not cover the transfer.
    #[error("ERC20: insufficient allowance (owner {owner}, spender {spender}, allowance {allowance}, needed {needed})")]
    InsufficientAllowance {
        /// The account whose tokens would move.
        owner: Address,
        /// The account trying to move them.
        spender: Address,
        /// Allowance currently granted.
        allowance: Amount,
        /// The amount the transfer required.
        needed: Amount,
    },

    /// Tokens cannot be sent to the zero address.
    #[error("ERC20: transfer to the zero address")]
    InvalidReceiver,

    /// Allowances cannot be granted to the zero address.
    #[error("ERC20: approve to the zero address")]
    InvalidSpender,

    /// Crediting the receiver would overflow. Only reachable with a
    /// hand-built ledger; the supply cap keeps real balances far away.
    #[error("ERC20: balance overflow for {0}")]
    Overflow(Address),
}

impl LedgerError {
    /// Stable revert string, without the diagnostic numbers.
    pub fn reason(&self) -> &'static str {
        match self {
            LedgerError::InsufficientBalance { .. } => "ERC20: transfer amount exceeds balance",
            LedgerError::InsufficientAllowance { .. } => "ERC20: insufficient allowance",
            LedgerError::InvalidReceiver => "ERC20: transfer to the zero address",
            LedgerError::InvalidSpender => "ERC20: approve to the zero address",
            LedgerError::Overflow(_) => "ERC20: balance overflow",
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Log entries emitted by successful ledger calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    /// Balance moved. `from` is the zero address for mints.
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    /// Allowance set.
    Approval {
        owner: Address,
        spender: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
}

// ---------------------------------------------------------------------------
// Ledger trait
// ---------------------------------------------------------------------------

/// Capability interface of a fungible-token ledger.
///
/// Mutating calls take the message sender as `caller`. Implementations must
/// be all-or-nothing: on `Err`, no balance or allowance may have changed.
pub trait Ledger {
    /// The address this ledger is deployed at.
    fn address(&self) -> Address;

    /// Balance of `owner`, zero for unknown accounts.
    fn balance_of(&self, owner: &Address) -> Amount;

    /// Remaining amount `spender` may move out of `owner`'s balance.
    fn allowance(&self, owner: &Address, spender: &Address) -> Amount;

    /// Total tokens in existence.
    fn total_supply(&self) -> Amount;

    /// Moves `amount` from `caller` to `to`.
    fn transfer(&mut self, caller: Address, to: Address, amount: Amount) -> Result<(), LedgerError>;

    /// Sets `spender`'s allowance over `caller`'s balance to `amount`.
    fn approve(
        &mut self,
        caller: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    /// Moves `amount` from `from` to `to`, consuming `caller`'s allowance.
    fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;
}

// ---------------------------------------------------------------------------
// TokenLedger
// ---------------------------------------------------------------------------

/// In-memory fungible token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLedger {
    address: Address,
    name: String,
    symbol: String,
    decimals: u8,
    total_supply: Amount,
    balances: BTreeMap<Address, Amount>,
    /// `owner -> (spender -> allowance)`.
    allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,
    events: Vec<LedgerEvent>,
}

impl TokenLedger {
    /// Deploys the standard token at `address`, minting the full cap to
    /// `owner`.
    pub fn deploy(address: Address, owner: Address) -> Self {
        Self::with_supply(
            address,
            TOKEN_NAME,
            TOKEN_SYMBOL,
            TOKEN_DECIMALS,
            owner,
            TOKEN_CAP,
        )
    }

    /// Deploys a token with custom metadata and initial supply.
    pub fn with_supply(
        address: Address,
        name: &str,
        symbol: &str,
        decimals: u8,
        owner: Address,
        supply: Amount,
    ) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(owner, supply);
        Self {
            address,
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            total_supply: supply,
            balances,
            allowances: BTreeMap::new(),
            events: vec![LedgerEvent::Transfer {
                from: Address::ZERO,
                to: owner,
                amount: supply,
            }],
        }
    }

    /// Token name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Decimal places for display.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Every event emitted so far, oldest first.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// All non-zero balances.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter().filter(|(_, amount)| **amount > 0)
    }

    /// Validates and applies a balance move. Shared by `transfer` and
    /// `transfer_from`; the allowance has already been checked by the caller.
    fn move_balance(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::InvalidReceiver);
        }

        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: from,
                balance: from_balance,
                needed: amount,
            });
        }

        if from != to {
            let to_balance = self.balance_of(&to);
            let new_to = to_balance
                .checked_add(amount)
                .ok_or(LedgerError::Overflow(to))?;
            self.balances.insert(from, from_balance - amount);
            self.balances.insert(to, new_to);
        }

        debug!(%from, %to, amount = %amount, token = %self.symbol, "transfer");
        self.events.push(LedgerEvent::Transfer { from, to, amount });
        Ok(())
    }
}

impl Ledger for TokenLedger {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, owner: &Address) -> Amount {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn total_supply(&self) -> Amount {
        self.total_supply
    }

    fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.move_balance(caller, to, amount)
    }

    fn approve(
        &mut self,
        caller: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if spender.is_zero() {
            return Err(LedgerError::InvalidSpender);
        }
        self.allowances
            .entry(caller)
            .or_default()
            .insert(spender, amount);
        self.events.push(LedgerEvent::Approval {
            owner: caller,
            spender,
            amount,
        });
        Ok(())
    }

    fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let allowance = self.allowance(&from, &caller);
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: from,
                spender: caller,
                allowance,
                needed: amount,
            });
        }

        self.move_balance(from, to, amount)?;

        if allowance != Amount::MAX {
            self.allowances
                .entry(from)
                .or_default()
                .insert(caller, allowance - amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tokens;

    fn setup() -> (TokenLedger, Address, Address, Address) {
        let owner = Address::from_label("owner");
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let ledger = TokenLedger::deploy(Address::from_label("token"), owner);
        (ledger, owner, alice, bob)
    }

    #[test]
    fn deploy_mints_cap_to_owner() {
        let (ledger, owner, alice, _) = setup();
        assert_eq!(ledger.total_supply(), TOKEN_CAP);
        assert_eq!(ledger.balance_of(&owner), TOKEN_CAP);
        assert_eq!(ledger.balance_of(&alice), 0);
        assert_eq!(ledger.symbol(), "FLP");
        assert_eq!(ledger.decimals(), 18);
        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn transfer_moves_balance() {
        let (mut ledger, owner, alice, _) = setup();
        ledger.transfer(owner, alice, tokens(1_000_000)).unwrap();
        assert_eq!(ledger.balance_of(&alice), tokens(1_000_000));
        assert_eq!(ledger.balance_of(&owner), TOKEN_CAP - tokens(1_000_000));
    }

    #[test]
    fn transfer_exceeding_balance_rejected_without_effect() {
        let (mut ledger, _, alice, bob) = setup();
        let err = ledger.transfer(alice, bob, 1).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                account: alice,
                balance: 0,
                needed: 1
            }
        );
        assert_eq!(ledger.balance_of(&bob), 0);
        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn transfer_to_zero_address_rejected() {
        let (mut ledger, owner, _, _) = setup();
        assert_eq!(
            ledger.transfer(owner, Address::ZERO, 1),
            Err(LedgerError::InvalidReceiver)
        );
    }

    #[test]
    fn zero_amount_transfer_succeeds() {
        let (mut ledger, _, alice, bob) = setup();
        ledger.transfer(alice, bob, 0).unwrap();
        assert_eq!(ledger.balance_of(&bob), 0);
    }

    #[test]
    fn transfer_from_consumes_allowance() {
        let (mut ledger, owner, alice, bob) = setup();
        ledger.transfer(owner, alice, tokens(100)).unwrap();
        ledger.approve(alice, bob, tokens(60)).unwrap();

        ledger.transfer_from(bob, alice, bob, tokens(40)).unwrap();
        assert_eq!(ledger.balance_of(&bob), tokens(40));
        assert_eq!(ledger.allowance(&alice, &bob), tokens(20));

        let err = ledger.transfer_from(bob, alice, bob, tokens(30)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { .. }));
        assert_eq!(ledger.balance_of(&alice), tokens(60));
    }

    #[test]
    fn transfer_from_checks_balance_and_keeps_allowance_on_failure() {
        let (mut ledger, owner, alice, bob) = setup();
        ledger.transfer(owner, alice, tokens(10)).unwrap();
        ledger.approve(alice, bob, tokens(50)).unwrap();

        let err = ledger.transfer_from(bob, alice, bob, tokens(20)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.allowance(&alice, &bob), tokens(50));
    }

    #[test]
    fn infinite_allowance_is_not_consumed() {
        let (mut ledger, owner, alice, bob) = setup();
        ledger.transfer(owner, alice, tokens(10)).unwrap();
        ledger.approve(alice, bob, Amount::MAX).unwrap();
        ledger.transfer_from(bob, alice, bob, tokens(5)).unwrap();
        assert_eq!(ledger.allowance(&alice, &bob), Amount::MAX);
    }

    #[test]
    fn approve_overwrites_and_rejects_zero_spender() {
        let (mut ledger, _, alice, bob) = setup();
        ledger.approve(alice, bob, 10).unwrap();
        ledger.approve(alice, bob, 3).unwrap();
        assert_eq!(ledger.allowance(&alice, &bob), 3);
        assert_eq!(
            ledger.approve(alice, Address::ZERO, 1),
            Err(LedgerError::InvalidSpender)
        );
    }

    #[test]
    fn self_transfer_keeps_balance() {
        let (mut ledger, owner, _, _) = setup();
        ledger.transfer(owner, owner, tokens(5)).unwrap();
        assert_eq!(ledger.balance_of(&owner), TOKEN_CAP);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let (mut ledger, owner, alice, bob) = setup();
        ledger.transfer(owner, alice, tokens(300_000)).unwrap();
        ledger.approve(alice, bob, Amount::MAX).unwrap();

        let json = serde_json::to_string(&ledger).unwrap();
        let back: TokenLedger = serde_json::from_str(&json).unwrap();

        assert_eq!(back.total_supply(), TOKEN_CAP);
        assert_eq!(back.balance_of(&alice), tokens(300_000));
        assert_eq!(back.allowance(&alice, &bob), Amount::MAX);
        assert_eq!(back.events(), ledger.events());
    }

    #[test]
    fn event_amounts_are_decimal_strings() {
        let event = LedgerEvent::Transfer {
            from: Address::ZERO,
            to: Address::from_label("owner"),
            amount: TOKEN_CAP,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "Transfer");
        assert_eq!(json["amount"], TOKEN_CAP.to_string());
        let back: LedgerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
