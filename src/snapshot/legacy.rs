//! Legacy snapshots: a bare JSON array of records with *relative* expiry
//!
//! Those files carry no timestamp, so the time they were taken must be
//! supplied explicitly to turn each TTL back into an absolute expiry.

use super::file::{Snapshot, read_file};
use crate::SnapshotError;
use crate::protocol::KeyValue;
use std::path::Path;
use tracing::info;

/// Parse a legacy bare-array snapshot
pub fn parse(contents: &str) -> Result<Vec<KeyValue>, SnapshotError> {
    Ok(serde_json::from_str(contents)?)
}

/// Convert legacy records to the current schema. `taken_at` is the unix time
/// the legacy file was written; relative expiries count from it.
pub fn migrate(records: Vec<KeyValue>, taken_at: u64) -> Snapshot {
    let entries = records
        .into_iter()
        .map(|mut record| {
            if record.expiry != 0 {
                record.expiry = taken_at.saturating_add(record.expiry);
            }
            record
        })
        .collect();
    Snapshot::new(entries, taken_at)
}

/// Read and convert a legacy snapshot file
pub async fn load(path: &Path, taken_at: u64) -> Result<Snapshot, SnapshotError> {
    let contents = read_file(path).await?;
    let snapshot = migrate(parse(&contents)?, taken_at);
    info!(
        "Migrated {} legacy entries from {} (taken at {})",
        snapshot.len(),
        path.display(),
        taken_at
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SNAPSHOT_VERSION;

    #[test]
    fn test_migrate() {
        let records = parse(
            r#"[{"name":"username","value":"john doe","expiry":20,"length":8},
                {"name":"forever","value":"x","length":1}]"#,
        )
        .unwrap();

        let snapshot = migrate(records, 1539088355);
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.created_at, 1539088355);
        assert_eq!(snapshot.entries[0].name, "username");
        assert_eq!(snapshot.entries[0].expiry, 1539088375);
        assert_eq!(snapshot.entries[1].expiry, 0);
    }

    #[test]
    fn test_parse_rejects_current_schema() {
        let result = parse(r#"{"version":1,"entries":[]}"#);
        assert!(matches!(result, Err(SnapshotError::Parse(_))));
    }

    #[tokio::test]
    async fn test_load_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = load(&dir.path().join("old.json"), 0).await;
        assert!(matches!(result, Err(SnapshotError::NotFound(_))));
    }
}
