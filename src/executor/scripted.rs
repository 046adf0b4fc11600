//! In-memory executor answering from canned replies

use super::{CommandExecutor, Reply, ReplyEnd};
use crate::ClientError;
use std::collections::HashMap;

/// Executor that records every command and answers from a script.
///
/// Commands without a scripted answer get an empty reply ending on the
/// first requested delimiter.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    lines: HashMap<Vec<u8>, Vec<String>>,
    replies: HashMap<Vec<u8>, Reply>,
    executed: Vec<String>,
    closed: bool,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` with `lines`, terminated the way the caller asked
    pub fn add_reply<I, L>(&mut self, command: impl AsRef<[u8]>, lines: I)
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        self.lines.insert(
            command.as_ref().to_vec(),
            lines.into_iter().map(Into::into).collect(),
        );
    }

    /// Answer `command` with exactly `reply`
    pub fn add_full_reply(&mut self, command: impl AsRef<[u8]>, reply: Reply) {
        self.replies.insert(command.as_ref().to_vec(), reply);
    }

    /// Commands received so far, in order
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl CommandExecutor for ScriptedExecutor {
    async fn execute(&mut self, command: &[u8], delimiters: &[&str]) -> Result<Reply, ClientError> {
        self.executed
            .push(String::from_utf8_lossy(command).into_owned());

        if let Some(reply) = self.replies.get(command) {
            return Ok(reply.clone());
        }

        let mut lines = self.lines.get(command).cloned().unwrap_or_default();
        let end = match delimiters.first() {
            Some(delimiter) => ReplyEnd::Delimiter((*delimiter).to_string()),
            None => {
                lines.truncate(1);
                ReplyEnd::SingleLine
            }
        };
        Ok(Reply::new(lines, end))
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_reply() {
        let mut exec = ScriptedExecutor::new();
        exec.add_reply("stats\r\n", ["STAT pid 1"]);

        let reply = exec.execute(b"stats\r\n", &["END"]).await.unwrap();
        assert_eq!(reply.lines, vec!["STAT pid 1"]);
        assert!(reply.ended_with("END"));
        assert_eq!(exec.executed(), ["stats\r\n"]);
    }

    #[tokio::test]
    async fn test_unscripted_command() {
        let mut exec = ScriptedExecutor::new();

        let reply = exec.execute(b"get nothing\r\n", &["END"]).await.unwrap();
        assert!(reply.lines.is_empty());

        let reply = exec.execute(b"version \r\n", &[]).await.unwrap();
        assert!(reply.lines.is_empty());
        assert_eq!(reply.end, ReplyEnd::SingleLine);
    }

    #[tokio::test]
    async fn test_full_reply_and_close() {
        let mut exec = ScriptedExecutor::new();
        exec.add_full_reply(
            "set k 0 0 1\r\nx\r\n",
            Reply::new(vec![], ReplyEnd::Error("ERROR".to_string())),
        );

        let reply = exec.execute(b"set k 0 0 1\r\nx\r\n", &["STORED"]).await.unwrap();
        assert_eq!(reply.end, ReplyEnd::Error("ERROR".to_string()));

        exec.close().await.unwrap();
        assert!(exec.is_closed());
    }
}
