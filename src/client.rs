//! Memcached text-protocol client
//!
//! The client owns one executor, and therefore one connection. It holds no
//! locks: every method takes `&mut self`, so sharing a client between
//! concurrent tasks requires external serialization (or one client per task).

use crate::config::ClientConfig;
use crate::executor::{CommandExecutor, END, Reply, ReplyEnd, TcpExecutor};
use crate::metrics::Metrics;
use crate::protocol::{CommandWriter, KeyValue, Stat, parse_stat, parse_value_header, validate_key};
use crate::{ClientError, ProtocolError};
use prometheus::IntCounter;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Returned by [`Client::version`] when the server sends nothing
pub const UNKNOWN_VERSION: &str = "UNKNOWN";

const STORED: &str = "STORED";
const NOT_STORED: &str = "NOT_STORED";

/// Protocol client over a [`CommandExecutor`]
pub struct Client<E> {
    executor: E,
    metrics: Arc<Metrics>,
}

impl Client<TcpExecutor> {
    /// Connect to `config.server` over TCP
    pub async fn connect(
        config: &ClientConfig,
        cancel_token: CancellationToken,
    ) -> Result<Self, ClientError> {
        let executor = TcpExecutor::connect(config, cancel_token).await?;
        Ok(Self::new(executor))
    }
}

impl<E: CommandExecutor> Client<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Report into a shared metrics registry
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Run one command, recording latency and failures
    pub(crate) async fn run(
        &mut self,
        counter: &IntCounter,
        command: &[u8],
        delimiters: &[&str],
    ) -> Result<Reply, ClientError> {
        record(&self.metrics, counter, self.executor.execute(command, delimiters)).await
    }

    /// Store `value` under `key` with flags 0, expiring after `exptime`
    /// seconds (0 = never)
    pub async fn set(&mut self, key: &str, value: &str, exptime: u64) -> Result<(), ClientError> {
        self.set_with_flags(key, value, 0, exptime).await
    }

    /// Store `value` under `key` with explicit client flags
    pub async fn set_with_flags(
        &mut self,
        key: &str,
        value: &str,
        flags: u32,
        exptime: u64,
    ) -> Result<(), ClientError> {
        validate_key(key)?;
        let command = CommandWriter::set(key, flags, exptime, value);
        let counter = self.metrics.cmd_set.clone();
        let reply = self.run(&counter, &command, &[STORED, NOT_STORED]).await?;

        match reply.end {
            ReplyEnd::Delimiter(line) if line == STORED => Ok(()),
            ReplyEnd::Delimiter(line) => Err(ClientError::NotStored(line)),
            ReplyEnd::Error(line) => Err(ClientError::Server(line)),
            ReplyEnd::SingleLine => Err(ClientError::NotStored(reply.lines.join(" "))),
        }
    }

    /// Fetch `key`. `Ok(None)` means the server does not have it.
    ///
    /// The data block is read by the length its header announces, so values
    /// that look like protocol lines come back unchanged.
    ///
    /// The returned value has `expiry == 0`: `get` replies never carry it.
    pub async fn get(&mut self, key: &str) -> Result<Option<KeyValue>, ClientError> {
        validate_key(key)?;
        let command = CommandWriter::get(key);
        let counter = self.metrics.cmd_get.clone();
        let reply = record(&self.metrics, &counter, self.executor.retrieve(&command)).await?;

        if let ReplyEnd::Error(line) = reply.end {
            return Err(ClientError::Server(line));
        }

        let mut lines = reply.lines.into_iter();
        let (Some(header), Some(value)) = (lines.next(), lines.next()) else {
            self.metrics.get_misses.inc();
            return Ok(None);
        };

        let header = parse_value_header(&header)?;
        if header.key != key {
            return Err(ProtocolError::KeyMismatch {
                expected: key.to_string(),
                actual: header.key.to_string(),
            }
            .into());
        }
        if value.len() != header.length {
            return Err(ProtocolError::LengthMismatch {
                expected: header.length,
                actual: value.len(),
            }
            .into());
        }

        self.metrics.get_hits.inc();
        Ok(Some(KeyValue {
            name: key.to_string(),
            flag: header.flags,
            length: header.length,
            expiry: 0,
            value,
        }))
    }

    /// All general-purpose server statistics
    pub async fn stats(&mut self) -> Result<Vec<Stat>, ClientError> {
        let command = CommandWriter::stats();
        let counter = self.metrics.cmd_stats.clone();
        let reply = self.run(&counter, &command, &[END]).await?;

        if let ReplyEnd::Error(line) = reply.end {
            return Err(ClientError::Server(line));
        }

        reply
            .lines
            .iter()
            .map(|line| parse_stat(line).map_err(ClientError::from))
            .collect()
    }

    /// A single statistic by name; `Ok(None)` if the server does not report it
    pub async fn stat(&mut self, name: &str) -> Result<Option<Stat>, ClientError> {
        let stats = self.stats().await?;
        Ok(stats.into_iter().find(|stat| stat.name == name))
    }

    /// The raw `VERSION ...` line, or [`UNKNOWN_VERSION`] if nothing came back
    pub async fn version(&mut self) -> Result<String, ClientError> {
        let command = CommandWriter::version();
        let counter = self.metrics.cmd_version.clone();
        let reply = self.run(&counter, &command, &[]).await?;

        Ok(reply
            .lines
            .into_iter()
            .next()
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string()))
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<(), ClientError> {
        debug!("Closing client");
        self.executor.close().await
    }
}

async fn record(
    metrics: &Metrics,
    counter: &IntCounter,
    reply: impl Future<Output = Result<Reply, ClientError>>,
) -> Result<Reply, ClientError> {
    counter.inc();
    let start = Instant::now();
    let result = reply.await;
    metrics.cmd_latency.observe(start.elapsed().as_secs_f64());

    match &result {
        Ok(Reply {
            end: ReplyEnd::Error(_),
            ..
        })
        | Err(_) => metrics.command_errors.inc(),
        Ok(_) => {}
    }
    result
}
