//! # Access Control
//!
//! Role-based permissions for the vault. A role is a 32-byte identifier,
//! conventionally the Keccak-256 digest of its name (`WITHDRAWER_ROLE`), and
//! membership is a plain yes/no per account.
//!
//! Every role has an admin role whose holders may grant and revoke it. Unless
//! changed with [`AccessControl::set_role_admin`], that admin is
//! [`DEFAULT_ADMIN_ROLE`] (all zero bytes), which the deployer holds from
//! construction. Nobody can grant a role to themselves without already
//! holding its admin role.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use vault_protocol::config::WITHDRAWER_ROLE_NAME;
use vault_protocol::crypto::keccak256;
use vault_protocol::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during access control operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// `account` lacks `role`.
    #[error("AccessControl: account {account} is missing role {role}")]
    MissingRole {
        /// The account that was checked.
        account: Address,
        /// The role it needed.
        role: RoleId,
    },

    /// `renounce_role` was called with a confirmation that is not the caller.
    #[error("AccessControl: can only renounce roles for self")]
    BadConfirmation,
}

// ---------------------------------------------------------------------------
// RoleId
// ---------------------------------------------------------------------------

/// A 32-byte role identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleId([u8; 32]);

/// The role that administers every other role by default.
pub const DEFAULT_ADMIN_ROLE: RoleId = RoleId([0u8; 32]);

impl RoleId {
    /// Wraps raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derives a role id as `keccak256(name)`.
    pub fn from_name(name: &str) -> Self {
        Self(keccak256(name.as_bytes()))
    }

    /// Returns the raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parses hex with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

/// The role allowed to call `withdraw`.
pub fn withdrawer_role() -> RoleId {
    RoleId::from_name(WITHDRAWER_ROLE_NAME)
}

impl fmt::Debug for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoleId({}...)", &self.to_hex()[..12])
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for RoleId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for RoleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RoleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        RoleId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Emitted when role membership or administration actually changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RoleEvent {
    RoleGranted {
        role: RoleId,
        account: Address,
        sender: Address,
    },
    RoleRevoked {
        role: RoleId,
        account: Address,
        sender: Address,
    },
    RoleAdminChanged {
        role: RoleId,
        previous_admin: RoleId,
        new_admin: RoleId,
    },
}

// ---------------------------------------------------------------------------
// AccessControl
// ---------------------------------------------------------------------------

/// Role registry: `role -> members` plus per-role admin overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessControl {
    members: BTreeMap<RoleId, BTreeSet<Address>>,
    admins: BTreeMap<RoleId, RoleId>,
}

impl AccessControl {
    /// Creates a registry with `admin` holding [`DEFAULT_ADMIN_ROLE`].
    pub fn new(admin: Address) -> Self {
        let mut registry = Self::default();
        registry.insert_member(DEFAULT_ADMIN_ROLE, admin);
        registry
    }

    /// Pure membership test.
    pub fn has_role(&self, role: &RoleId, account: &Address) -> bool {
        self.members
            .get(role)
            .map(|set| set.contains(account))
            .unwrap_or(false)
    }

    /// Fails with [`AccessError::MissingRole`] unless `account` holds `role`.
    pub fn check_role(&self, role: &RoleId, account: &Address) -> Result<(), AccessError> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(AccessError::MissingRole {
                account: *account,
                role: *role,
            })
        }
    }

    /// The role whose holders administer `role`.
    pub fn role_admin(&self, role: &RoleId) -> RoleId {
        self.admins.get(role).copied().unwrap_or(DEFAULT_ADMIN_ROLE)
    }

    /// Members of `role` in address order.
    pub fn members(&self, role: &RoleId) -> Vec<Address> {
        self.members
            .get(role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Grants `role` to `account`. `caller` must hold the role's admin.
    ///
    /// Idempotent: granting a held role succeeds and returns `None`.
    /// Returns the emitted event when membership changed.
    pub fn grant_role(
        &mut self,
        caller: Address,
        role: RoleId,
        account: Address,
    ) -> Result<Option<RoleEvent>, AccessError> {
        self.check_role(&self.role_admin(&role), &caller)?;
        if !self.insert_member(role, account) {
            return Ok(None);
        }
        info!(%role, %account, sender = %caller, "role granted");
        Ok(Some(RoleEvent::RoleGranted {
            role,
            account,
            sender: caller,
        }))
    }

    /// Revokes `role` from `account`. `caller` must hold the role's admin.
    pub fn revoke_role(
        &mut self,
        caller: Address,
        role: RoleId,
        account: Address,
    ) -> Result<Option<RoleEvent>, AccessError> {
        self.check_role(&self.role_admin(&role), &caller)?;
        Ok(self.remove_member(role, account, caller))
    }

    /// Drops `caller`'s own membership in `role`.
    ///
    /// `confirmation` must repeat the caller's address, guarding against
    /// renouncing on behalf of a mistyped account.
    pub fn renounce_role(
        &mut self,
        caller: Address,
        role: RoleId,
        confirmation: Address,
    ) -> Result<Option<RoleEvent>, AccessError> {
        if confirmation != caller {
            return Err(AccessError::BadConfirmation);
        }
        Ok(self.remove_member(role, caller, caller))
    }

    /// Changes which role administers `role`. Requires [`DEFAULT_ADMIN_ROLE`].
    pub fn set_role_admin(
        &mut self,
        caller: Address,
        role: RoleId,
        admin_role: RoleId,
    ) -> Result<Option<RoleEvent>, AccessError> {
        self.check_role(&DEFAULT_ADMIN_ROLE, &caller)?;
        let previous_admin = self.role_admin(&role);
        if previous_admin == admin_role {
            return Ok(None);
        }
        self.admins.insert(role, admin_role);
        info!(%role, %previous_admin, new_admin = %admin_role, "role admin changed");
        Ok(Some(RoleEvent::RoleAdminChanged {
            role,
            previous_admin,
            new_admin: admin_role,
        }))
    }

    fn insert_member(&mut self, role: RoleId, account: Address) -> bool {
        self.members.entry(role).or_default().insert(account)
    }

    fn remove_member(
        &mut self,
        role: RoleId,
        account: Address,
        sender: Address,
    ) -> Option<RoleEvent> {
        let removed = self
            .members
            .get_mut(&role)
            .map(|set| set.remove(&account))
            .unwrap_or(false);
        if !removed {
            return None;
        }
        info!(%role, %account, %sender, "role revoked");
        Some(RoleEvent::RoleRevoked {
            role,
            account,
            sender,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    #[test]
    fn withdrawer_role_matches_keccak_of_name() {
        // keccak256("WITHDRAWER_ROLE"), as computed by ethers.js.
        assert_eq!(
            withdrawer_role().to_hex(),
            "0x10dac8c06a04bec0b551627dad28bc00d6516b0caacd1c7b345fcdb5211334e4"
        );
    }

    #[test]
    fn deployer_holds_default_admin() {
        let acl = AccessControl::new(addr("owner"));
        assert!(acl.has_role(&DEFAULT_ADMIN_ROLE, &addr("owner")));
        assert!(!acl.has_role(&DEFAULT_ADMIN_ROLE, &addr("alice")));
        assert_eq!(acl.role_admin(&withdrawer_role()), DEFAULT_ADMIN_ROLE);
    }

    #[test]
    fn admin_can_grant_and_grant_is_idempotent() {
        let mut acl = AccessControl::new(addr("owner"));
        let first = acl
            .grant_role(addr("owner"), withdrawer_role(), addr("bob"))
            .unwrap();
        assert!(matches!(first, Some(RoleEvent::RoleGranted { .. })));

        let before = acl.members(&withdrawer_role());
        let second = acl
            .grant_role(addr("owner"), withdrawer_role(), addr("bob"))
            .unwrap();
        assert!(second.is_none());
        assert_eq!(acl.members(&withdrawer_role()), before);
        assert!(acl.has_role(&withdrawer_role(), &addr("bob")));
    }

    #[test]
    fn non_admin_cannot_grant() {
        let mut acl = AccessControl::new(addr("owner"));
        let err = acl
            .grant_role(addr("bob"), withdrawer_role(), addr("bob"))
            .unwrap_err();
        assert_eq!(
            err,
            AccessError::MissingRole {
                account: addr("bob"),
                role: DEFAULT_ADMIN_ROLE
            }
        );
        assert!(!acl.has_role(&withdrawer_role(), &addr("bob")));
    }

    #[test]
    fn revoke_and_renounce() {
        let mut acl = AccessControl::new(addr("owner"));
        acl.grant_role(addr("owner"), withdrawer_role(), addr("bob"))
            .unwrap();
        acl.grant_role(addr("owner"), withdrawer_role(), addr("carol"))
            .unwrap();

        assert!(acl
            .revoke_role(addr("owner"), withdrawer_role(), addr("bob"))
            .unwrap()
            .is_some());
        assert!(!acl.has_role(&withdrawer_role(), &addr("bob")));
        assert!(acl
            .revoke_role(addr("owner"), withdrawer_role(), addr("bob"))
            .unwrap()
            .is_none());

        assert_eq!(
            acl.renounce_role(addr("carol"), withdrawer_role(), addr("bob")),
            Err(AccessError::BadConfirmation)
        );
        acl.renounce_role(addr("carol"), withdrawer_role(), addr("carol"))
            .unwrap();
        assert!(acl.members(&withdrawer_role()).is_empty());
    }

    #[test]
    fn custom_role_admin_delegates_granting() {
        let mut acl = AccessControl::new(addr("owner"));
        let manager = RoleId::from_name("MANAGER_ROLE");
        acl.grant_role(addr("owner"), manager, addr("dave")).unwrap();
        acl.set_role_admin(addr("owner"), withdrawer_role(), manager)
            .unwrap();

        acl.grant_role(addr("dave"), withdrawer_role(), addr("erin"))
            .unwrap();
        assert!(acl.has_role(&withdrawer_role(), &addr("erin")));

        // The default admin no longer administers the withdrawer role.
        assert!(acl
            .grant_role(addr("owner"), withdrawer_role(), addr("frank"))
            .is_err());
    }

    #[test]
    fn role_id_hex_roundtrip() {
        let role = withdrawer_role();
        assert_eq!(RoleId::from_hex(&role.to_hex()).unwrap(), role);
        assert_eq!(role.to_hex().parse::<RoleId>().unwrap(), role);
        assert!(RoleId::from_hex("0x1234").is_err());
    }
}
