//! In-memory memcached stand-in for end-to-end tests

use mcsnap::ClientError;
use mcsnap::executor::{CommandExecutor, Reply, ReplyEnd};
use mcsnap::ttl::MAX_RELATIVE_TTL;
use std::collections::BTreeMap;

/// Values up to this many bytes live in slab 1, larger ones in slab 2
const SMALL_ITEM: usize = 64;

#[derive(Debug, Clone)]
pub struct Item {
    pub flags: u32,
    /// Absolute expiry, 0 = never
    pub expire_at: u64,
    pub value: String,
}

/// Answers the subset of the text protocol the client speaks, against a
/// clock that only moves when the test says so
#[derive(Debug)]
pub struct FakeMemcached {
    pub now: u64,
    pub items: BTreeMap<String, Item>,
    /// Raw exptime of every `set`, by key
    pub set_exptimes: BTreeMap<String, u64>,
}

impl FakeMemcached {
    pub fn new(now: u64) -> Self {
        Self {
            now,
            items: BTreeMap::new(),
            set_exptimes: BTreeMap::new(),
        }
    }

    fn live(&self) -> impl Iterator<Item = (&String, &Item)> {
        self.items
            .iter()
            .filter(|(_, item)| item.expire_at == 0 || item.expire_at > self.now)
    }

    fn slab_of(item: &Item) -> u32 {
        if item.value.len() <= SMALL_ITEM { 1 } else { 2 }
    }

    fn handle(&mut self, command: &str) -> Vec<String> {
        let (line, data) = command.split_once("\r\n").unwrap_or((command.trim_end(), ""));
        let parts: Vec<&str> = line.split(' ').collect();

        match parts.as_slice() {
            ["get", key] => match self.live().find(|(k, _)| k == key) {
                Some((key, item)) => vec![
                    format!("VALUE {key} {} {}", item.flags, item.value.len()),
                    item.value.clone(),
                ],
                None => vec![],
            },
            ["set", key, flags, exptime, len] => {
                let len: usize = len.parse().unwrap();
                let exptime: u64 = exptime.parse().unwrap();
                let value = &data[..len];
                let expire_at = match exptime {
                    0 => 0,
                    e if e <= MAX_RELATIVE_TTL => self.now + e,
                    e => e,
                };
                self.set_exptimes.insert((*key).to_string(), exptime);
                self.items.insert(
                    (*key).to_string(),
                    Item {
                        flags: flags.parse().unwrap(),
                        expire_at,
                        value: value.to_string(),
                    },
                );
                vec![]
            }
            ["stats", "items"] => {
                let mut counts = BTreeMap::<u32, usize>::new();
                for (_, item) in self.live() {
                    *counts.entry(Self::slab_of(item)).or_default() += 1;
                }
                counts
                    .into_iter()
                    .flat_map(|(slab, n)| {
                        [
                            format!("STAT items:{slab}:number {n}"),
                            format!("STAT items:{slab}:age 0"),
                        ]
                    })
                    .collect()
            }
            ["stats", "cachedump", slab, limit] => {
                let slab: u32 = slab.parse().unwrap();
                let limit: usize = limit.parse().unwrap();
                self.live()
                    .filter(|(_, item)| Self::slab_of(item) == slab)
                    .take(limit)
                    .map(|(key, item)| {
                        format!("ITEM {key} [{} b; {} s]", item.value.len(), item.expire_at)
                    })
                    .collect()
            }
            ["stats"] => vec![
                format!("STAT time {}", self.now),
                format!("STAT curr_items {}", self.live().count()),
            ],
            ["version", ""] => vec!["VERSION 1.6.21".to_string()],
            _ => vec!["ERROR".to_string()],
        }
    }
}

impl CommandExecutor for FakeMemcached {
    async fn execute(&mut self, command: &[u8], delimiters: &[&str]) -> Result<Reply, ClientError> {
        let command = String::from_utf8(command.to_vec()).map_err(|_| ClientError::InvalidUtf8)?;
        let lines = self.handle(&command);

        if lines.first().is_some_and(|l| l == "ERROR") {
            return Ok(Reply::new(vec![], ReplyEnd::Error("ERROR".to_string())));
        }
        let end = match delimiters.first() {
            Some(d) => ReplyEnd::Delimiter((*d).to_string()),
            None => ReplyEnd::SingleLine,
        };
        Ok(Reply::new(lines, end))
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        Ok(())
    }
}
