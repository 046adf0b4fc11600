//! Executor over an async byte stream (TCP in production)

use super::{CommandExecutor, END, Reply, ReplyEnd, is_error_line};
use crate::config::ClientConfig;
use crate::protocol::parse_value_header;
use crate::{ClientError, ProtocolError};
use bytes::BytesMut;
use memchr::memchr;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Executor over a TCP connection
pub type TcpExecutor = StreamExecutor<TcpStream>;

/// Line-framed request/response driver over a byte stream
pub struct StreamExecutor<S> {
    stream: S,
    read_buf: BytesMut,
    read_buffer_size: usize,
    max_line_bytes: usize,
    read_timeout: Option<Duration>,
    cancel_token: CancellationToken,
    /// Set while a command is in flight; stays set if it never completed
    out_of_sync: bool,
}

impl TcpExecutor {
    /// Connect to `config.server`
    pub async fn connect(
        config: &ClientConfig,
        cancel_token: CancellationToken,
    ) -> Result<Self, ClientError> {
        let addr = config.server.clone();
        let connect = TcpStream::connect(addr.as_str());

        let result = match config.connect_timeout() {
            Some(timeout) => match tokio::time::timeout(timeout, connect).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no connection within {timeout:?}"),
                )),
            },
            None => connect.await,
        };
        let stream = result.map_err(|source| ClientError::Connect { addr, source })?;

        // Disable Nagle's algorithm; every command is a single small write
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }
        debug!("Connected to {}", config.server);

        Ok(Self::new(stream, config, cancel_token))
    }
}

impl<S> StreamExecutor<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already connected stream
    pub fn new(stream: S, config: &ClientConfig, cancel_token: CancellationToken) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            read_buffer_size: config.read_buffer_size.max(64),
            max_line_bytes: config.max_line_bytes,
            read_timeout: config.read_timeout(),
            cancel_token,
            out_of_sync: false,
        }
    }

    /// Override the per-command read deadline
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    async fn send(&mut self, command: &[u8]) -> Result<(), ClientError> {
        trace!("Sending {:?}", String::from_utf8_lossy(command));
        self.stream.write_all(command).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn exchange(&mut self, command: &[u8], delimiters: &[&str]) -> Result<Reply, ClientError> {
        self.send(command).await?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;

            if delimiters.is_empty() {
                lines.push(line);
                return Ok(Reply::new(lines, ReplyEnd::SingleLine));
            }
            if delimiters.contains(&line.as_str()) {
                return Ok(Reply::new(lines, ReplyEnd::Delimiter(line)));
            }
            if is_error_line(&line) {
                return Ok(Reply::new(lines, ReplyEnd::Error(line)));
            }
            lines.push(line);
        }
    }

    async fn retrieval(&mut self, command: &[u8]) -> Result<Reply, ClientError> {
        self.send(command).await?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;

            if line == END {
                return Ok(Reply::new(lines, ReplyEnd::Delimiter(line)));
            }
            if is_error_line(&line) {
                return Ok(Reply::new(lines, ReplyEnd::Error(line)));
            }
            let length = parse_value_header(&line)?.length;
            let data = self.read_block(length).await?;
            lines.push(line);
            lines.push(data);
        }
    }

    /// Read a `<length>`-byte data block and its trailing `\r\n`
    async fn read_block(&mut self, length: usize) -> Result<String, ClientError> {
        if length > self.max_line_bytes {
            return Err(ClientError::LineTooLong(self.max_line_bytes));
        }

        let framed = length + 2;
        while self.read_buf.len() < framed {
            let missing = framed - self.read_buf.len();
            self.read_buf.reserve(missing.max(self.read_buffer_size));
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(ClientError::ConnectionClosed);
            }
        }

        let mut block = self.read_buf.split_to(framed);
        if &block[length..] != b"\r\n" {
            return Err(ProtocolError::UnterminatedData(length).into());
        }
        block.truncate(length);
        String::from_utf8(block.to_vec()).map_err(|_| ClientError::InvalidUtf8)
    }

    /// Refuse to run on a connection left mid-reply, then mark it busy
    fn begin(&mut self) -> Result<(), ClientError> {
        // A reply left half-read would be taken as the answer to this command
        if self.out_of_sync {
            return Err(ClientError::OutOfSync);
        }
        self.out_of_sync = true;
        Ok(())
    }

    fn finish(&mut self, result: Result<Reply, ClientError>) -> Result<Reply, ClientError> {
        if result.is_ok() {
            self.out_of_sync = false;
        }
        result
    }

    /// Read one line, stripping `\n` and an optional preceding `\r`
    async fn read_line(&mut self) -> Result<String, ClientError> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = memchr(b'\n', &self.read_buf[scanned..]) {
                let end = scanned + pos;
                let mut line = self.read_buf.split_to(end + 1);
                line.truncate(end);
                if line.last() == Some(&b'\r') {
                    line.truncate(end - 1);
                }
                if line.len() > self.max_line_bytes {
                    return Err(ClientError::LineTooLong(self.max_line_bytes));
                }
                return String::from_utf8(line.to_vec()).map_err(|_| ClientError::InvalidUtf8);
            }

            scanned = self.read_buf.len();
            if scanned > self.max_line_bytes {
                return Err(ClientError::LineTooLong(self.max_line_bytes));
            }

            self.read_buf.reserve(self.read_buffer_size);
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(ClientError::ConnectionClosed);
            }
        }
    }
}

impl<S> CommandExecutor for StreamExecutor<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn execute(&mut self, command: &[u8], delimiters: &[&str]) -> Result<Reply, ClientError> {
        self.begin()?;
        let cancel_token = self.cancel_token.clone();
        let read_timeout = self.read_timeout;
        let result = interruptible(
            &cancel_token,
            read_timeout,
            self.exchange(command, delimiters),
        )
        .await;
        self.finish(result)
    }

    async fn retrieve(&mut self, command: &[u8]) -> Result<Reply, ClientError> {
        self.begin()?;
        let cancel_token = self.cancel_token.clone();
        let read_timeout = self.read_timeout;
        let result = interruptible(&cancel_token, read_timeout, self.retrieval(command)).await;
        self.finish(result)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await?;
        debug!("Connection closed");
        Ok(())
    }
}

async fn interruptible<T>(
    cancel_token: &CancellationToken,
    deadline: Option<Duration>,
    fut: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    tokio::select! {
        biased;
        () = cancel_token.cancelled() => Err(ClientError::Cancelled),
        result = with_deadline(deadline, fut) => result,
    }
}

async fn with_deadline<T>(
    deadline: Option<Duration>,
    fut: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    match deadline {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| ClientError::Timeout(d))?,
        None => fut.await,
    }
}
