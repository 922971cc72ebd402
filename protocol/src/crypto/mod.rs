//! # Cryptographic Primitives
//!
//! Only one primitive is needed by the vault: Keccak-256. Role identifiers
//! are the Keccak-256 digest of their human-readable name, which keeps them
//! byte-compatible with EVM tooling that derives the same ids.

pub mod hash;

pub use hash::{keccak256, keccak256_hex};
