//! Command executors: send one command, collect its reply lines
//!
//! [`CommandExecutor`] is the only seam between the protocol client and the
//! byte stream. [`StreamExecutor`] drives any async stream (TCP in
//! production); [`ScriptedExecutor`] answers from canned replies.

mod scripted;
mod stream;

pub use scripted::ScriptedExecutor;
pub use stream::{StreamExecutor, TcpExecutor};

use crate::ClientError;
use std::future::Future;

/// Generic error reply with no message
pub const ERROR: &str = "ERROR";

/// Terminator of retrieval and stats replies
pub const END: &str = "END";

/// How a reply was terminated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEnd {
    /// A line equal to one of the requested delimiters
    Delimiter(String),
    /// An `ERROR`, `CLIENT_ERROR ...` or `SERVER_ERROR ...` line
    Error(String),
    /// No delimiters were requested; exactly one line was read
    SingleLine,
}

/// Lines read in response to one command, terminator excluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub end: ReplyEnd,
}

impl Reply {
    pub fn new(lines: Vec<String>, end: ReplyEnd) -> Self {
        Self { lines, end }
    }

    /// True if the reply ended on the given delimiter
    pub fn ended_with(&self, delimiter: &str) -> bool {
        matches!(&self.end, ReplyEnd::Delimiter(d) if d == delimiter)
    }
}

/// Returns true if a line is one of the protocol's error replies
pub fn is_error_line(line: &str) -> bool {
    line == ERROR || line.starts_with("CLIENT_ERROR") || line.starts_with("SERVER_ERROR")
}

/// Something that can run memcached text commands.
///
/// One command is in flight at a time: both methods take `&mut self`, so a
/// single executor cannot be shared between concurrent callers without
/// external serialization.
pub trait CommandExecutor {
    /// Write `command` verbatim and read lines until one equals a member of
    /// `delimiters` or is an error reply. With no delimiters, exactly one
    /// line is read and returned.
    fn execute(
        &mut self,
        command: &[u8],
        delimiters: &[&str],
    ) -> impl Future<Output = Result<Reply, ClientError>> + Send;

    /// Run a retrieval command (`get`). Each `VALUE` header is followed by
    /// exactly the number of data bytes it announces, so data is never
    /// scanned for `END` or error tokens. Returns header and data as
    /// alternating lines; the reply ends on `END` or an error line.
    fn retrieve(
        &mut self,
        command: &[u8],
    ) -> impl Future<Output = Result<Reply, ClientError>> + Send {
        self.execute(command, &[END])
    }

    /// Release the underlying connection
    fn close(&mut self) -> impl Future<Output = Result<(), ClientError>> + Send;
}
