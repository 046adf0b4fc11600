//! Keyspace enumeration through per-slab statistics
//!
//! Memcached has no "list keys" command. The keyspace is rebuilt in two
//! phases:
//!
//! 1. `stats items` reports how many items each slab class holds.
//! 2. `stats cachedump <slab> <count>` lists the items of one slab with
//!    their absolute expiry.
//!
//! Slabs are visited in ascending id order, but callers should treat the
//! resulting key list as unordered.

use crate::client::Client;
use crate::executor::{CommandExecutor, END, ReplyEnd};
use crate::protocol::{CommandWriter, Key, parse_cachedump_item, parse_slab_count};
use crate::{ClientError, ProtocolError};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// A response line that did not match its grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub line: String,
    pub error: ProtocolError,
}

/// Result of a full keyspace scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enumeration {
    pub keys: Vec<Key>,
    pub errors: Vec<ItemError>,
    /// Sum of the per-slab item counts reported by `stats items`
    pub expected: u64,
}

impl Enumeration {
    /// True if every reported item was found and parsed
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.keys.len() as u64 == self.expected
    }
}

/// Item counts per slab class, plus any unparseable `number` lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlabCounts {
    pub counts: BTreeMap<u32, u64>,
    pub errors: Vec<ItemError>,
}

impl<E: CommandExecutor> Client<E> {
    /// Phase one: `stats items`
    pub async fn slab_counts(&mut self) -> Result<SlabCounts, ClientError> {
        let command = CommandWriter::stats_items();
        let counter = self.metrics().cmd_stats.clone();
        let reply = self.run(&counter, &command, &[END]).await?;

        if let ReplyEnd::Error(line) = reply.end {
            return Err(ClientError::Server(line));
        }

        let mut slabs = SlabCounts::default();
        for line in reply.lines {
            match parse_slab_count(&line) {
                Ok(Some((slab_id, count))) => {
                    slabs.counts.insert(slab_id, count);
                }
                Ok(None) => {}
                Err(error) => slabs.errors.push(ItemError { line, error }),
            }
        }
        Ok(slabs)
    }

    /// Phase two for one slab: `stats cachedump <slab_id> <count>`
    pub async fn cachedump(
        &mut self,
        slab_id: u32,
        count: u64,
    ) -> Result<(Vec<Key>, Vec<ItemError>), ClientError> {
        let command = CommandWriter::stats_cachedump(slab_id, count);
        let counter = self.metrics().cmd_cachedump.clone();
        let reply = self.run(&counter, &command, &[END]).await?;

        if let ReplyEnd::Error(line) = reply.end {
            return Err(ClientError::Server(line));
        }

        let mut keys = Vec::with_capacity(reply.lines.len());
        let mut errors = Vec::new();
        for line in reply.lines {
            match parse_cachedump_item(&line) {
                Ok(key) => keys.push(key),
                Err(error) => errors.push(ItemError { line, error }),
            }
        }
        Ok((keys, errors))
    }

    /// List every key on the server together with its absolute expiry
    pub async fn list_keys(&mut self) -> Result<Enumeration, ClientError> {
        let SlabCounts { counts, errors } = self.slab_counts().await?;

        let mut enumeration = Enumeration {
            expected: counts.values().sum(),
            errors,
            ..Enumeration::default()
        };

        for (&slab_id, &count) in counts.iter().filter(|(_, count)| **count > 0) {
            let (keys, errors) = self.cachedump(slab_id, count).await?;
            debug!(
                "Slab {}: {} of {} items listed, {} unparseable",
                slab_id,
                keys.len(),
                count,
                errors.len()
            );
            enumeration.keys.extend(keys);
            enumeration.errors.extend(errors);
        }

        for item in &enumeration.errors {
            warn!("Skipping unparseable line {:?}: {}", item.line, item.error);
        }
        self.metrics()
            .item_errors
            .inc_by(enumeration.errors.len() as u64);

        let found = enumeration.keys.len() as u64;
        if found == 0 && enumeration.errors.is_empty() {
            info!("No keys found on server");
        } else if found != enumeration.expected {
            warn!(
                "Slab statistics reported {} items but {} keys were listed",
                enumeration.expected, found
            );
        }

        Ok(enumeration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Reply, ScriptedExecutor};
    use std::collections::HashSet;

    fn names_and_expiries(keys: &[Key]) -> HashSet<(String, u64)> {
        keys.iter().map(|k| (k.name.clone(), k.expiry)).collect()
    }

    fn single_slab_client() -> Client<ScriptedExecutor> {
        let mut exec = ScriptedExecutor::new();
        exec.add_reply("stats items\r\n", ["STAT items:1:number 4"]);
        exec.add_reply(
            "stats cachedump 1 4\n",
            [
                "ITEM location [9 b; 1539093795 s]",
                "ITEM profession [9 b; 1539088675 s]",
                "ITEM age [4 b; 1539088575 s]",
                "ITEM username [8 b; 1539088375 s]",
            ],
        );
        Client::new(exec)
    }

    #[tokio::test]
    async fn test_list_keys() {
        let mut client = single_slab_client();
        let enumeration = client.list_keys().await.unwrap();

        assert_eq!(enumeration.keys.len(), 4);
        assert_eq!(enumeration.expected, 4);
        assert!(enumeration.is_complete());

        let expected: HashSet<(String, u64)> = [
            ("location", 1539093795),
            ("profession", 1539088675),
            ("age", 1539088575),
            ("username", 1539088375),
        ]
        .into_iter()
        .map(|(name, expiry)| (name.to_string(), expiry))
        .collect();
        assert_eq!(names_and_expiries(&enumeration.keys), expected);

        let location = enumeration
            .keys
            .iter()
            .find(|k| k.name == "location")
            .unwrap();
        assert_eq!(location.original, "ITEM location [9 b; 1539093795 s]");

        assert_eq!(
            client.executor().executed(),
            ["stats items\r\n", "stats cachedump 1 4\n"]
        );
    }

    #[tokio::test]
    async fn test_list_keys_multiple_slabs() {
        let mut exec = ScriptedExecutor::new();
        exec.add_reply(
            "stats items\r\n",
            [
                "STAT items:5:number 1",
                "STAT items:5:age 120",
                "STAT items:2:number 2",
                "STAT items:3:number 0",
            ],
        );
        exec.add_reply("stats cachedump 2 2\n", ["ITEM a [1 b; 10 s]", "ITEM b [1 b; 20 s]"]);
        exec.add_reply("stats cachedump 5 1\n", ["ITEM c [500 b; 0 s]"]);
        let mut client = Client::new(exec);

        let enumeration = client.list_keys().await.unwrap();
        assert_eq!(enumeration.expected, 3);

        let expected: HashSet<(String, u64)> =
            [("a".to_string(), 10), ("b".to_string(), 20), ("c".to_string(), 0)].into();
        assert_eq!(names_and_expiries(&enumeration.keys), expected);

        // Empty slabs are never dumped
        assert!(
            !client
                .executor()
                .executed()
                .iter()
                .any(|c| c.starts_with("stats cachedump 3"))
        );
    }

    #[tokio::test]
    async fn test_list_keys_empty() {
        let mut client = Client::new(ScriptedExecutor::new());
        let enumeration = client.list_keys().await.unwrap();

        assert!(enumeration.keys.is_empty());
        assert!(enumeration.is_complete());
        assert_eq!(client.executor().executed(), ["stats items\r\n"]);
    }

    #[tokio::test]
    async fn test_list_keys_reports_malformed_items() {
        let mut exec = ScriptedExecutor::new();
        exec.add_reply("stats items\r\n", ["STAT items:1:number 3"]);
        exec.add_reply(
            "stats cachedump 1 3\n",
            [
                "ITEM good [1 b; 1539093795 s]",
                "ITEM broken [1 b]",
                "ITEM fine [2 b; 0 s]",
            ],
        );
        let mut client = Client::new(exec);

        let enumeration = client.list_keys().await.unwrap();
        assert_eq!(enumeration.keys.len(), 2);
        assert_eq!(
            enumeration.errors,
            vec![ItemError {
                line: "ITEM broken [1 b]".to_string(),
                error: ProtocolError::MalformedItem("ITEM broken [1 b]".to_string()),
            }]
        );
        assert!(!enumeration.is_complete());
        assert_eq!(client.metrics().item_errors.get(), 1);
    }

    #[tokio::test]
    async fn test_list_keys_fewer_items_than_reported() {
        // One item evicted between the two phases
        let mut exec = ScriptedExecutor::new();
        exec.add_reply("stats items\r\n", ["STAT items:1:number 3"]);
        exec.add_reply(
            "stats cachedump 1 3\n",
            ["ITEM kept [1 b; 1539093795 s]", "ITEM also [2 b; 0 s]"],
        );
        let mut client = Client::new(exec);

        let enumeration = client.list_keys().await.unwrap();
        assert_eq!(enumeration.keys.len(), 2);
        assert_eq!(enumeration.expected, 3);
        assert!(enumeration.errors.is_empty());
        assert!(!enumeration.is_complete());
        assert_eq!(client.metrics().item_errors.get(), 0);
    }

    #[tokio::test]
    async fn test_slab_counts_malformed() {
        let mut exec = ScriptedExecutor::new();
        exec.add_reply(
            "stats items\r\n",
            ["STAT items:1:number 4", "STAT items:one:number 2"],
        );
        let mut client = Client::new(exec);

        let slabs = client.slab_counts().await.unwrap();
        assert_eq!(slabs.counts, BTreeMap::from([(1, 4)]));
        assert_eq!(slabs.errors.len(), 1);
        assert_eq!(slabs.errors[0].line, "STAT items:one:number 2");
    }

    #[tokio::test]
    async fn test_cachedump_server_error() {
        let mut exec = ScriptedExecutor::new();
        exec.add_reply("stats items\r\n", ["STAT items:1:number 1"]);
        exec.add_full_reply(
            "stats cachedump 1 1\n",
            Reply::new(vec![], ReplyEnd::Error("CLIENT_ERROR stats cachedump not allowed".to_string())),
        );
        let mut client = Client::new(exec);

        let result = client.list_keys().await;
        assert!(matches!(result, Err(ClientError::Server(_))));
    }
}
