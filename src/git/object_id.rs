use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GitError, Result};

pub const ID_LEN: usize = 20;
pub const HEX_LEN: usize = ID_LEN * 2;

static SHA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9a-f]{4,40}$").expect("sha pattern compiles"));

/// 20-byte object name. Ordered and hashed byte-wise.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectId([u8; ID_LEN]);

impl ObjectId {
    pub const fn zero() -> Self {
        ObjectId([0; ID_LEN])
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; ID_LEN] = bytes
            .try_into()
            .map_err(|_| GitError::InvalidObjectId(hex::encode(bytes)))?;
        Ok(ObjectId(raw))
    }

    /// Exactly 40 hex digits, either case.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != HEX_LEN {
            return Err(GitError::InvalidObjectId(s.to_string()));
        }
        let mut raw = [0u8; ID_LEN];
        hex::decode_to_slice(s, &mut raw).map_err(|_| GitError::InvalidObjectId(s.to_string()))?;
        Ok(ObjectId(raw))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; ID_LEN]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First `len` hex digits.
    pub fn short(&self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len.min(HEX_LEN));
        hex
    }
}

/// Whether `s` could be an abbreviated or full lowercase object name.
pub fn is_valid_sha_pattern(s: &str) -> bool {
    SHA_PATTERN.is_match(s)
}

impl FromStr for ObjectId {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self> {
        ObjectId::from_hex(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl From<git2::Oid> for ObjectId {
    fn from(oid: git2::Oid) -> Self {
        let mut raw = [0u8; ID_LEN];
        raw.copy_from_slice(oid.as_bytes());
        ObjectId(raw)
    }
}

impl From<ObjectId> for git2::Oid {
    fn from(id: ObjectId) -> Self {
        // Only fails on a wrong slice length, which [u8; 20] rules out.
        git2::Oid::from_bytes(&id.0).unwrap_or_else(|_| git2::Oid::zero())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ObjectId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
