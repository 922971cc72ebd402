// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Custody Vault — Protocol Primitives
//!
//! The building blocks every contract in this workspace stands on. Nothing
//! here knows about roles or withdrawal policy; it only knows who an account
//! is, how much a token unit is worth, and how balances move.
//!
//! ## Architecture
//!
//! - **address** — 20-byte account identifiers with hex encoding.
//! - **crypto** — Keccak-256, the hash role identifiers are derived from.
//! - **config** — token constants and unit conversion helpers.
//! - **ledger** — the fungible-token capability trait and an in-memory
//!   implementation with the usual transfer/approve/transfer-from rules.
//!
//! ## Design Philosophy
//!
//! 1. Amounts are integers in base units. Decimals are for display only.
//! 2. Every check runs before the first mutation. A failed call leaves the
//!    ledger exactly as it found it.
//! 3. Callers are explicit parameters, never ambient state.

pub mod address;
pub mod config;
pub mod crypto;
pub mod ledger;

pub use address::{Address, AddressError};
pub use config::Amount;
pub use ledger::{Ledger, LedgerError, LedgerEvent, TokenLedger};
