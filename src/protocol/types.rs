//! Records exchanged with the server and persisted in snapshots

use serde::{Deserialize, Serialize};

/// A cache entry: a fetched value plus the metadata needed to re-insert it.
///
/// `expiry` is an absolute unix timestamp (0 = never expires). A `get`
/// response does not carry it, so a `KeyValue` built from a fetch alone has
/// `expiry == 0` until it is patched from a keyspace enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyValue {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub flag: u32,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub expiry: u64,
    #[serde(skip_serializing_if = "is_zero_usize")]
    pub length: usize,
}

/// A key found by `stats cachedump`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    /// The raw `ITEM ...` line as received
    pub original: String,
    /// Key name, without surrounding whitespace
    pub name: String,
    /// Absolute unix expiry (0 = never expires)
    pub expiry: u64,
}

/// One `STAT <name> <value>` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub name: String,
    pub value: String,
}

impl Stat {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_u32(n: &u32) -> bool {
    *n == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_u64(n: &u64) -> bool {
    *n == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_usize(n: &usize) -> bool {
    *n == 0
}
