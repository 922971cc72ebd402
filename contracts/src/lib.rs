// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Custody Vault Contracts
//!
//! Contract logic for a custodial token vault:
//!
//! - **Access Control** — keccak-named roles with admin-gated grant and
//!   revoke, seeded with the deployer as administrator.
//! - **Vault** — pooled deposits pulled through the token ledger and
//!   withdrawals gated by a kill-switch, a per-call ceiling and the
//!   withdrawer role.
//! - **Runtime** — a serial executor that applies calls to the ledger and
//!   the vault as one atomic unit.
//!
//! ## Design Principles
//!
//! 1. Check everything, then mutate. A rejected call changes nothing.
//! 2. Failures carry stable reason strings so callers can tell them apart.
//! 3. The token is a collaborator behind the `Ledger` trait, never owned
//!    by the vault.
//! 4. Every public type is serializable (serde) for reports and snapshots.

pub mod access_control;
pub mod runtime;
pub mod vault;

pub use access_control::{
    withdrawer_role, AccessControl, AccessError, RoleEvent, RoleId, DEFAULT_ADMIN_ROLE,
};
pub use runtime::{Call, Receipt, Runtime, RuntimeError, SharedRuntime};
pub use vault::{ErrorKind, Vault, VaultConfig, VaultError, VaultEvent};
