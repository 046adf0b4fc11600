//! Export and restore batch loops
//!
//! Both loops run one command at a time over a single client. Failures
//! that leave the connection usable (grammar mismatches, server refusals)
//! are collected per item; anything else aborts the batch.

use super::file::Snapshot;
use crate::ClientError;
use crate::client::Client;
use crate::executor::CommandExecutor;
use crate::keyspace::ItemError;
use crate::ttl::{Ttl, current_timestamp, exptime_for};
use tracing::{debug, info, warn};

/// A per-key failure that did not abort the batch
#[derive(Debug)]
pub struct Failure {
    pub key: String,
    pub error: ClientError,
}

/// Outcome of an export
#[derive(Debug)]
pub struct ExportReport {
    pub snapshot: Snapshot,
    /// Keys listed by cachedump but gone by the time they were fetched
    pub missing: Vec<String>,
    /// Unparseable `stats items` / cachedump lines
    pub item_errors: Vec<ItemError>,
    /// Keys whose fetch failed
    pub failures: Vec<Failure>,
}

impl ExportReport {
    pub fn has_errors(&self) -> bool {
        !self.item_errors.is_empty() || !self.failures.is_empty()
    }
}

/// Outcome of a restore
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: usize,
    /// Entries not written back because their expiry had passed
    pub skipped_expired: Vec<String>,
    pub failures: Vec<Failure>,
}

impl RestoreReport {
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Capture every live key on the server
pub async fn export<E: CommandExecutor>(client: &mut Client<E>) -> Result<ExportReport, ClientError> {
    export_at(client, current_timestamp()).await
}

/// As [`export`], stamping the snapshot with `now`
pub async fn export_at<E: CommandExecutor>(
    client: &mut Client<E>,
    now: u64,
) -> Result<ExportReport, ClientError> {
    let enumeration = client.list_keys().await?;
    info!("{} keys found on server", enumeration.keys.len());

    let mut entries = Vec::with_capacity(enumeration.keys.len());
    let mut missing = Vec::new();
    let mut failures = Vec::new();

    for key in enumeration.keys {
        match client.get(&key.name).await {
            Ok(Some(mut entry)) => {
                // get never reports expiry; cachedump is the only source
                entry.expiry = key.expiry;
                entries.push(entry);
            }
            Ok(None) => {
                debug!("Key {} vanished before it could be fetched", key.name);
                missing.push(key.name);
            }
            Err(error) if !error.is_fatal() => {
                warn!("Failed to fetch {}: {}", key.name, error);
                failures.push(Failure {
                    key: key.name,
                    error,
                });
            }
            Err(error) => return Err(error),
        }
    }

    client.metrics().keys_exported.inc_by(entries.len() as u64);
    if entries.is_empty() {
        info!("No records to export");
    }

    Ok(ExportReport {
        snapshot: Snapshot::new(entries, now),
        missing,
        item_errors: enumeration.errors,
        failures,
    })
}

/// Write every unexpired snapshot entry back to the server
pub async fn restore<E: CommandExecutor>(
    client: &mut Client<E>,
    snapshot: &Snapshot,
) -> Result<RestoreReport, ClientError> {
    restore_at(client, snapshot, current_timestamp()).await
}

/// As [`restore`], computing remaining lifetimes relative to `now`
pub async fn restore_at<E: CommandExecutor>(
    client: &mut Client<E>,
    snapshot: &Snapshot,
    now: u64,
) -> Result<RestoreReport, ClientError> {
    let mut report = RestoreReport::default();

    for entry in &snapshot.entries {
        let exptime = match exptime_for(entry.expiry, now) {
            Ttl::Expired { overdue } => {
                warn!("Skipping {}: expired {}s ago", entry.name, overdue);
                client.metrics().keys_skipped_expired.inc();
                report.skipped_expired.push(entry.name.clone());
                continue;
            }
            Ttl::Never => 0,
            Ttl::Expires(exptime) => exptime,
        };

        match client
            .set_with_flags(&entry.name, &entry.value, entry.flag, exptime)
            .await
        {
            Ok(()) => {
                client.metrics().keys_restored.inc();
                report.restored += 1;
            }
            Err(error) if !error.is_fatal() => {
                warn!("Failed to restore {}: {}", entry.name, error);
                report.failures.push(Failure {
                    key: entry.name.clone(),
                    error,
                });
            }
            Err(error) => return Err(error),
        }
    }

    info!(
        "Restored {} of {} entries ({} expired, {} failed)",
        report.restored,
        snapshot.len(),
        report.skipped_expired.len(),
        report.failures.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolError;
    use crate::executor::{Reply, ReplyEnd, ScriptedExecutor};
    use crate::protocol::KeyValue;

    const NOW: u64 = 1_539_090_000;

    fn entry(name: &str, value: &str, expiry: u64) -> KeyValue {
        KeyValue {
            name: name.to_string(),
            value: value.to_string(),
            flag: 0,
            expiry,
            length: value.len(),
        }
    }

    #[tokio::test]
    async fn test_export_patches_expiry() {
        let mut exec = ScriptedExecutor::new();
        exec.add_reply("stats items\r\n", ["STAT items:1:number 2"]);
        exec.add_reply(
            "stats cachedump 1 2\n",
            ["ITEM age [4 b; 1539088575 s]", "ITEM gone [1 b; 0 s]"],
        );
        exec.add_reply("get age\r\n", ["VALUE age 0 4", "3438"]);
        let mut client = Client::new(exec);

        let report = export_at(&mut client, NOW).await.unwrap();
        assert_eq!(report.snapshot.created_at, NOW);
        assert_eq!(report.snapshot.entries, vec![entry("age", "3438", 1539088575)]);
        assert_eq!(report.missing, vec!["gone"]);
        assert!(!report.has_errors());
        assert_eq!(client.metrics().keys_exported.get(), 1);
    }

    #[tokio::test]
    async fn test_export_empty_server() {
        let mut client = Client::new(ScriptedExecutor::new());
        let report = export_at(&mut client, NOW).await.unwrap();
        assert!(report.snapshot.is_empty());
        assert!(!report.has_errors());
    }

    #[tokio::test]
    async fn test_export_collects_fetch_failures() {
        let mut exec = ScriptedExecutor::new();
        exec.add_reply("stats items\r\n", ["STAT items:1:number 2"]);
        exec.add_reply(
            "stats cachedump 1 2\n",
            ["ITEM bad [4 b; 1 s]", "ITEM ok [2 b; 0 s]"],
        );
        exec.add_reply("get bad\r\n", ["VALUE bad 0 4", "toolong"]);
        exec.add_reply("get ok\r\n", ["VALUE ok 3 2", "hi"]);
        let mut client = Client::new(exec);

        let report = export_at(&mut client, NOW).await.unwrap();
        assert_eq!(report.snapshot.len(), 1);
        assert_eq!(report.snapshot.entries[0].flag, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "bad");
        assert!(matches!(
            report.failures[0].error,
            ClientError::Protocol(ProtocolError::LengthMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_restore_skips_expired() {
        let snapshot = Snapshot::new(
            vec![
                entry("stale", "old", NOW - 10),
                entry("fresh", "new", NOW + 100),
                entry("forever", "x", 0),
            ],
            NOW - 1000,
        );
        let mut client = Client::new(ScriptedExecutor::new());

        let report = restore_at(&mut client, &snapshot, NOW).await.unwrap();
        assert_eq!(report.restored, 2);
        assert_eq!(report.skipped_expired, vec!["stale"]);
        assert_eq!(
            client.executor().executed(),
            ["set fresh 0 100 3\r\nnew\r\n", "set forever 0 0 1\r\nx\r\n"]
        );
        assert_eq!(client.metrics().keys_skipped_expired.get(), 1);
    }

    #[tokio::test]
    async fn test_restore_preserves_flags_and_long_ttls() {
        let far = NOW + 60 * 86_400;
        let mut flagged = entry("flagged", "v", far);
        flagged.flag = 42;
        let snapshot = Snapshot::new(vec![flagged], NOW);
        let mut client = Client::new(ScriptedExecutor::new());

        restore_at(&mut client, &snapshot, NOW).await.unwrap();
        assert_eq!(
            client.executor().executed(),
            [format!("set flagged 42 {far} 1\r\nv\r\n")]
        );
    }

    #[tokio::test]
    async fn test_restore_collects_rejections() {
        let snapshot = Snapshot::new(
            vec![
                entry("full", "x", 0),
                entry("bad key", "y", 0),
                entry("ok", "z", 0),
            ],
            NOW,
        );
        let mut exec = ScriptedExecutor::new();
        exec.add_full_reply(
            "set full 0 0 1\r\nx\r\n",
            Reply::new(vec![], ReplyEnd::Error("SERVER_ERROR out of memory".to_string())),
        );
        let mut client = Client::new(exec);

        let report = restore_at(&mut client, &snapshot, NOW).await.unwrap();
        assert_eq!(report.restored, 1);
        let failed: Vec<&str> = report.failures.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(failed, vec!["full", "bad key"]);
        assert!(report.has_errors());
    }
}
