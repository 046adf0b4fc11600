//! On-disk snapshot schema
//!
//! Version 1 is a JSON envelope whose entries carry **absolute** expiry
//! timestamps (0 = never expires):
//!
//! ```text
//! {"version": 1, "created_at": 1539090000,
//!  "entries": [{"name": "age", "value": "3438", "expiry": 1539093795, "length": 4}]}
//! ```
//!
//! Files without the envelope are rejected rather than guessed at; see
//! [`super::legacy`] for converting them.

use crate::SnapshotError;
use crate::protocol::KeyValue;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing::debug;

/// Current on-disk schema version
pub const SNAPSHOT_VERSION: u32 = 1;

/// A point-in-time capture of cache entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Unix time the snapshot was taken
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub entries: Vec<KeyValue>,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

impl Snapshot {
    pub fn new(entries: Vec<KeyValue>, created_at: u64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            created_at,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse snapshot JSON, checking the schema version first
    pub fn from_json(contents: &str) -> Result<Self, SnapshotError> {
        let value: serde_json::Value = serde_json::from_str(contents)?;
        if value.is_array() {
            return Err(SnapshotError::Unversioned);
        }

        let header = VersionHeader::deserialize(&value)?;
        if header.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: header.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, SnapshotError> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Read a snapshot file
    pub async fn load(path: &Path) -> Result<Self, SnapshotError> {
        let contents = read_file(path).await?;
        let snapshot = Self::from_json(&contents)?;
        debug!("Loaded {} entries from {}", snapshot.len(), path.display());
        Ok(snapshot)
    }

    /// Write a snapshot file, replacing any existing one atomically
    pub async fn save(&self, path: &Path, pretty: bool) -> Result<(), SnapshotError> {
        let json = self.to_json(pretty)?;
        let write_err = |source| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, json).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(write_err)?;

        debug!("Wrote {} entries to {}", self.len(), path.display());
        Ok(())
    }
}

pub(crate) async fn read_file(path: &Path) -> Result<String, SnapshotError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => SnapshotError::NotFound(path.to_path_buf()),
            _ => SnapshotError::Read {
                path: path.to_path_buf(),
                source,
            },
        })
}
