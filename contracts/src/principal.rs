//! # Principals and Amounts
//!
//! A [`Principal`] is an opaque 32-byte account identity. Nothing in the
//! contracts looks inside it beyond equality and hashing; it is rendered as
//! lowercase hex on the wire and in snapshots, which also lets it act as a
//! JSON map key.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Token quantity in base units (18 decimals for PPO).
pub type Amount = u128;

/// Errors produced when parsing a hex-encoded principal.
#[derive(Debug, Error, PartialEq)]
pub enum PrincipalParseError {
    /// The input is not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The decoded input is not 32 bytes long.
    #[error("invalid length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// An account identity capable of initiating operations.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal([u8; 32]);

impl Principal {
    /// The null principal. Used as the source of minted value and the sink
    /// of burned value in `Transfer` notifications. Never holds a role or a
    /// balance.
    pub const ZERO: Principal = Principal([0u8; 32]);

    /// Wraps raw identity bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw identity bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Deterministically derives a principal from a human-readable label by
    /// hashing it with BLAKE3. Handy for fixtures and default configs.
    pub fn derive(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    /// Returns `true` for [`Principal::ZERO`].
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Returns the hex-encoded identity.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded identity. A leading `0x` is accepted.
    pub fn from_hex(s: &str) -> Result<Self, PrincipalParseError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| PrincipalParseError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Principal({}..)", &hex[..12])
    }
}

impl FromStr for Principal {
    type Err = PrincipalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
