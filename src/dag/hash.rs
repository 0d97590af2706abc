//! Identity hashing for message authors.
//!
//! This module provides the `IdentityHash` type, a 32-byte SHA3-256 hash of an
//! author's public request key. It is the stable author component of every
//! message URI and message id.

use crate::error::{Result, ThreadTreeError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};
use std::fmt;

/// Length of an identity hash in bytes.
pub const IDENTITY_HASH_LEN: usize = 32;

/// A 32-byte identity hash using SHA3-256.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityHash([u8; IDENTITY_HASH_LEN]);

impl Serialize for IdentityHash {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for IdentityHash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdentityHashVisitor;

        impl<'de> serde::de::Visitor<'de> for IdentityHashVisitor {
            type Value = IdentityHash;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a 64 character hex string")
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                IdentityHash::from_hex(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(IdentityHashVisitor)
    }
}

impl IdentityHash {
    /// Hashes an author's public request key.
    pub fn compute(request_key: &str) -> Self {
        let digest = Sha3_256::digest(request_key.as_bytes());
        let mut arr = [0u8; IDENTITY_HASH_LEN];
        arr.copy_from_slice(&digest);
        Self(arr)
    }

    /// Creates an IdentityHash from raw bytes.
    pub fn from_bytes(bytes: [u8; IDENTITY_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTITY_HASH_LEN] {
        &self.0
    }

    /// Returns hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses an IdentityHash from a lowercase hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != IDENTITY_HASH_LEN * 2 {
            return Err(ThreadTreeError::malformed_reference(
                s,
                "identity hash must be exactly 64 hex characters",
            ));
        }
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(ThreadTreeError::malformed_reference(
                s,
                "identity hash must be lowercase hex",
            ));
        }
        let bytes = hex::decode(s)
            .map_err(|_| ThreadTreeError::malformed_reference(s, "invalid hex string"))?;
        let mut arr = [0u8; IDENTITY_HASH_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Returns a short form of the hash for display (first 6 bytes / 12 hex chars).
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Debug for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityHash({}...)", self.short())
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
